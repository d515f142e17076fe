use crate::{metrics::MetricsSnapshot, server::Server};
use axum::{Json, Router, extract::State, routing::get};
use serde_json::json;

pub fn create_health_routes() -> Router<Server> {
    Router::new()
        .route("/", get(health_check))
        .route("/metrics", get(login_metrics))
}

async fn health_check(State(server): State<Server>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "pending_states": server.login_service.pending_states(),
    }))
}

async fn login_metrics(State(server): State<Server>) -> Json<MetricsSnapshot> {
    Json(server.metrics.snapshot())
}
