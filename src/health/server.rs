use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use log::info;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::models::HealthConfig;
use crate::services::Shutdown;

/// Health check server for Kubernetes probes
#[derive(Clone)]
pub struct HealthServer {
    config: HealthConfig,
    is_ready: Arc<AtomicBool>,
}

impl HealthServer {
    /// Create a new health check server
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            is_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the ready state of the application
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Get the ready state of the application
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    fn router(&self) -> Router {
        let is_ready = self.is_ready.clone();

        Router::new()
            .route("/health/live", get(|| async { StatusCode::OK }))
            .route(
                "/health/ready",
                get(move || {
                    let ready = is_ready.load(Ordering::SeqCst);
                    async move {
                        if ready {
                            StatusCode::OK.into_response()
                        } else {
                            StatusCode::SERVICE_UNAVAILABLE.into_response()
                        }
                    }
                }),
            )
    }

    /// Serve the probes until shutdown is requested
    pub async fn start(&self, shutdown: Shutdown) -> anyhow::Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("Health check server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        info!("Health check server stopped");
        Ok(())
    }
}
