use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/db", get(database))
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "CareLink API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
        "timestamp": Utc::now(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "service": "CareLink Backend API",
        "environment": state.environment,
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
}

async fn database(State(state): State<AppState>) -> Response {
    match state.store.count_users().await {
        Ok(count) => Json(json!({
            "status": "OK",
            "database": "Connected",
            "userCount": count,
            "timestamp": Utc::now(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "ERROR",
                    "database": "Connection failed",
                    "error": e.to_string(),
                    "timestamp": Utc::now(),
                })),
            )
                .into_response()
        }
    }
}
