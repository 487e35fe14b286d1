//! HTTP routes: a single JSON-RPC endpoint plus liveness/readiness checks.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::warn;

use crate::methods;
use crate::rpc::{RpcRequest, RpcResponse};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/rpc", post(rpc))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Json<Value> {
    match state.storage.health().await {
        Ok(()) => Json(json!({ "status": "ready" })),
        Err(err) => {
            warn!(error = %err, "readiness check failed");
            Json(json!({ "status": "not_ready", "error": err.to_string() }))
        }
    }
}

async fn rpc(State(state): State<AppState>, Json(request): Json<RpcRequest>) -> Json<RpcResponse> {
    let id = request.id.clone();
    let result = methods::dispatch(&state, &request.method, request.params).await;
    let response = match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::failure(id, err),
    };
    Json(response)
}
