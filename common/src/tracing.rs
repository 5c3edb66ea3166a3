use tracing_subscriber::fmt::layer;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,tower_http=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing with structured JSON output
pub fn init_tracing() {
    Registry::default()
        .with(env_filter())
        .with(layer().json().with_current_span(true))
        .init();
}

/// Initialize tracing with pretty output for development
pub fn init_tracing_pretty() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
