//! Connection acceptor.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::net::TcpListener;

use crate::api::{AppState, create_router};
use crate::config::ServerConfig;

/// A bound listener ready to serve WebSocket and health traffic.
pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Bind `host:port` from the config. Port 0 picks a free port.
    pub async fn bind(config: &ServerConfig, state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding to {addr}"))?;
        Ok(Self::from_listener(listener, state))
    }

    pub fn from_listener(listener: TcpListener, state: AppState) -> Self {
        Self { listener, state }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("reading local address")
    }

    /// Accept connections until `shutdown` resolves, then cancel every
    /// session and stream.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        let root = self.state.shutdown.clone();
        let app = create_router(self.state);

        info!("Listening on ws://{}", addr);

        let graceful = async move {
            shutdown.await;
            info!("Shutdown signal received, closing connections...");
            root.cancel();
        };

        axum::serve(self.listener, app)
            .with_graceful_shutdown(graceful)
            .await
            .context("running server")?;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
