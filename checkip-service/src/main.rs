use checkip_service::config::{Config, LogFormat};
use checkip_service::lifecycle::{Lifecycle, Server, shutdown_signal};
use checkip_service::{build_state, routes};
use clap::Parser;
use common::tracing::{init_tracing, init_tracing_pretty};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    match config.log_format {
        LogFormat::Pretty => init_tracing_pretty(),
        LogFormat::Json => init_tracing(),
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Fatal error, exiting");
        return Err(e);
    }

    Ok(())
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let lifecycle = Lifecycle::new();
    let state = build_state(&config, lifecycle.clone())?;
    let app = routes::app(state, config.openapi);

    let addr = config.bind_addr()?;
    info!(listen_addr = %config.listen_addr, "Check IP service starting on {}", addr);

    let server = Server::bind(&addr, app, lifecycle).await?;
    server.run(shutdown_signal()).await?;

    info!("Check IP service stopped");
    Ok(())
}
