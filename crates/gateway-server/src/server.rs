//! HTTP server bootstrap.
//!
//! After the shutdown signal the server stops accepting and lets in-flight
//! requests finish, but only until the drain deadline; open streams still
//! running then are abandoned so the process can exit.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;

use gateway_config::GatewayConfig;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{routes::create_router, shutdown::shutdown_signal, state::AppState};

/// How long in-flight requests may run after a shutdown signal
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Listen address and shutdown timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Drain deadline after the shutdown signal
    pub graceful_timeout: Duration,
}

impl ServerConfig {
    /// Create a server configuration
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
        }
    }

    /// Set the drain deadline
    #[must_use]
    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

/// The gateway HTTP server
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve until a shutdown signal arrives.
    ///
    /// Draining ends at the graceful timeout or on a second signal,
    /// whichever comes first.
    ///
    /// # Errors
    /// Returns error if the address cannot be bound
    pub async fn run(self) -> std::io::Result<()> {
        let grace = self.config.graceful_timeout;
        let listener = TcpListener::bind(self.config.address()).await?;
        serve_with_deadline(
            listener,
            self.state,
            async {
                shutdown_signal().await;
            },
            async move {
                tokio::select! {
                    () = tokio::time::sleep(grace) => {}
                    signal = shutdown_signal() => warn!(signal, "Second signal, skipping drain"),
                }
            },
        )
        .await
    }

    /// Serve until `shutdown` resolves, draining for at most the graceful
    /// timeout
    ///
    /// # Errors
    /// Returns error if the address cannot be bound
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let grace = self.config.graceful_timeout;
        let listener = TcpListener::bind(self.config.address()).await?;
        serve_with_deadline(listener, self.state, shutdown, async move {
            tokio::time::sleep(grace).await;
        })
        .await
    }
}

/// Serve on an already bound listener with the default drain deadline
///
/// # Errors
/// Returns error if accepting connections fails
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    serve_with_deadline(listener, state, shutdown, async {
        tokio::time::sleep(DEFAULT_GRACEFUL_TIMEOUT).await;
    })
    .await
}

/// Serve on an already bound listener.
///
/// `deadline` is first polled once `shutdown` has resolved; when it
/// completes before in-flight requests have drained, the server returns
/// without waiting for them.
///
/// # Errors
/// Returns error if accepting connections fails
pub async fn serve_with_deadline<F, D>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
    deadline: D,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
    D: Future<Output = ()>,
{
    let addr: SocketAddr = listener.local_addr()?;
    info!(address = %addr, "claude-router listening");

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };
    let server = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .into_future();
    let drain_deadline = async {
        if signalled_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        deadline.await;
    };

    tokio::select! {
        result = server => {
            result?;
            info!("Server stopped");
        }
        () = drain_deadline => {
            warn!("Drain deadline reached, abandoning open connections");
        }
    }
    Ok(())
}
