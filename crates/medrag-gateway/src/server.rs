use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use medrag_core::bootstrap::MedicalQueryHandler;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<MedicalQueryHandler>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(query: Arc<MedicalQueryHandler>) -> Self {
        Self {
            query,
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    query: Arc<MedicalQueryHandler>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        query: Arc<MedicalQueryHandler>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        Self {
            addr,
            max_body_size: 64 * 1024,
            query,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the shutdown channel flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(AppState::new(self.query), self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: self.addr.to_string(),
                source,
            })?;
        tracing::info!("chat server listening on http://{}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("chat server shutting down");
            })
            .await?;

        Ok(())
    }
}
