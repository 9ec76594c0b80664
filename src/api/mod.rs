//! REST + WebSocket API server.
//!
//! Provides HTTP endpoints for:
//! - Session lifecycle (create, list, inspect, finalize)
//! - The live audio stream (WebSocket)
//! - Transcript and summary retrieval
//! - Settings profile management

pub mod error;
pub mod routes;

use crate::config::ServerConfig;
use crate::session::SessionPipeline;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

/// Shared state for all route groups.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<SessionPipeline>,
}

pub struct ApiServer {
    host: String,
    port: u16,
    state: ApiState,
}

impl ApiServer {
    pub fn new(pipeline: Arc<SessionPipeline>, config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state: ApiState { pipeline },
        }
    }

    pub async fn start(self) -> Result<()> {
        let api = Router::new()
            .route("/health", get(health))
            .merge(routes::sessions::router(self.state.clone()))
            .merge(routes::settings::router(self.state));

        let app = Router::new()
            .route("/", get(status))
            .nest("/api", api)
            .layer(ServiceBuilder::new());

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.host, self.port)).await?;

        info!("API server listening on http://{}:{}", self.host, self.port);
        info!("Endpoints:");
        info!("  GET  /api/health                    - Service health");
        info!("  POST /api/sessions                  - Create a session");
        info!("  GET  /api/sessions                  - List sessions");
        info!("  GET  /api/sessions/:id              - Session detail");
        info!("  GET  /api/sessions/:id/stream       - WebSocket audio stream");
        info!("  POST /api/sessions/:id/audio        - Append an audio chunk");
        info!("  POST /api/sessions/:id/finalize     - Transcribe and summarize");
        info!("  GET  /api/sessions/:id/transcript   - Transcript and summary");
        info!("  GET  /api/sessions/:id/summary      - Structured summary");
        info!("  GET  /api/settings                  - Read settings profile");
        info!("  PUT  /api/settings                  - Replace settings profile");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "protokoll",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "bereit" }))
}
