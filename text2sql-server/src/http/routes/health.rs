//! Root, health and status endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub metadata_store: bool,
    pub llm_configured: bool,
}

/// GET /
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Hello World",
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /status - metadata store reachability and language model presence
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let metadata_store = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "metadata store unreachable");
            false
        }
    };

    Json(StatusResponse {
        status: if metadata_store { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        metadata_store,
        llm_configured: state.generator.is_some(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
}
