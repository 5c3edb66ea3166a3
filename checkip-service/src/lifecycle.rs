//! Server lifecycle: `Starting → Serving → Draining → Stopped`.
//!
//! The current phase lives in a single atomic shared by the signal watcher and
//! the `/health` handler. The service reports healthy only while `Serving`.

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::listener::{ClientAddr, TimeoutListener};
use crate::routes::READ_TIMEOUT;

pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Serving,
            2 => Phase::Draining,
            3 => Phase::Stopped,
            _ => Phase::Starting,
        }
    }
}

/// Process-wide health and phase flag.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: Arc<AtomicU8>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicU8::new(Phase::Starting as u8)),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn is_healthy(&self) -> bool {
        self.phase() == Phase::Serving
    }

    pub fn mark_serving(&self) -> bool {
        self.transition(Phase::Starting, Phase::Serving)
    }

    pub fn begin_draining(&self) -> bool {
        self.transition(Phase::Serving, Phase::Draining)
    }

    pub fn mark_stopped(&self) {
        self.phase.store(Phase::Stopped as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: Phase, to: Phase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("could not gracefully shut down the server within {0:?}")]
    DrainTimeout(Duration),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub struct Server {
    listener: TcpListener,
    app: Router,
    lifecycle: Lifecycle,
    drain_timeout: Duration,
}

impl Server {
    pub async fn bind(addr: &str, app: Router, lifecycle: Lifecycle) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            app,
            lifecycle,
            drain_timeout: DRAIN_TIMEOUT,
        })
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    ///
    /// Health flips to unhealthy before the listener stops accepting. Failing
    /// to drain within the drain timeout is an error.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            app,
            lifecycle,
            drain_timeout,
        } = self;

        let addr = listener.local_addr()?;
        lifecycle.mark_serving();
        info!(%addr, "Server is ready to handle requests");

        let stop_accepting = CancellationToken::new();
        let listener = TimeoutListener::new(listener, READ_TIMEOUT, IDLE_TIMEOUT);

        let serve = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<ClientAddr>(),
        )
        .with_graceful_shutdown(stop_accepting.clone().cancelled_owned());
        let mut server = tokio::spawn(async move { serve.await });

        tokio::pin!(shutdown);
        tokio::select! {
            joined = &mut server => {
                lifecycle.mark_stopped();
                joined??;
                warn!("Server stopped without a shutdown signal");
                return Ok(());
            }
            () = &mut shutdown => {}
        }

        lifecycle.begin_draining();
        info!(timeout = ?drain_timeout, "Server is shutting down");
        stop_accepting.cancel();

        match tokio::time::timeout(drain_timeout, &mut server).await {
            Ok(joined) => {
                lifecycle.mark_stopped();
                joined??;
                info!("Server stopped");
                Ok(())
            }
            Err(_) => {
                server.abort();
                lifecycle.mark_stopped();
                error!(timeout = ?drain_timeout, "In-flight requests did not drain in time");
                Err(ServerError::DrainTimeout(drain_timeout))
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_only_move_forward() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Starting);
        assert!(!lifecycle.is_healthy());

        assert!(!lifecycle.begin_draining());
        assert!(lifecycle.mark_serving());
        assert!(lifecycle.is_healthy());
        assert!(!lifecycle.mark_serving());

        assert!(lifecycle.begin_draining());
        assert_eq!(lifecycle.phase(), Phase::Draining);
        assert!(!lifecycle.is_healthy());

        lifecycle.mark_stopped();
        assert_eq!(lifecycle.phase(), Phase::Stopped);
        assert!(!lifecycle.mark_serving());
    }

    #[test]
    fn clones_share_the_flag() {
        let lifecycle = Lifecycle::new();
        let observer = lifecycle.clone();

        lifecycle.mark_serving();
        assert!(observer.is_healthy());
        lifecycle.begin_draining();
        assert!(!observer.is_healthy());
    }
}
