//! Health Routes
//!
//! Liveness probe for deployments and the dashboard.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

/// Build the health routes (mounted at the root)
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "nimbus",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
