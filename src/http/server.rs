//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::http::handlers;
use crate::identification::IdentificationService;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IdentificationService>,
}

/// HTTP server for the identification gateway.
pub struct HttpServer {
    router: Router,
    config: ListenerConfig,
}

impl HttpServer {
    pub fn new(config: ListenerConfig, service: Arc<IdentificationService>) -> Self {
        let router = Self::build_router(&config, AppState { service });
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/v1/identify", post(handlers::identify))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_body_bytes = self.config.max_body_bytes,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }
}
