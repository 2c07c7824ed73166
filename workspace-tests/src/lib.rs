//! Shared fixtures for cross-crate tests

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Requests the target server has seen, as `(method path, attack header)`.
#[derive(Clone, Default)]
pub struct TargetLog {
    entries: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl TargetLog {
    fn push(&self, line: String, headers: &HeaderMap) {
        let attack = headers
            .get("x-barrage-attack")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((line, attack));
        }
    }

    pub fn entries(&self) -> Vec<(String, Option<String>)> {
        self.entries.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

async fn create_txn(State(log): State<TargetLog>, headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    log.push("POST /txn".to_string(), &headers);
    (StatusCode::CREATED, Json(json!({ "id": "txn-42" })))
}

async fn get_txn(State(log): State<TargetLog>, Path(id): Path<String>, headers: HeaderMap) -> Json<serde_json::Value> {
    log.push(format!("GET /txn/{}", id), &headers);
    Json(json!({ "id": id, "state": "settled" }))
}

async fn unavailable(State(log): State<TargetLog>, headers: HeaderMap) -> StatusCode {
    log.push("GET /down".to_string(), &headers);
    StatusCode::SERVICE_UNAVAILABLE
}

/// Start a small transaction API on an ephemeral port and return its base URL.
pub async fn spawn_target_server() -> std::io::Result<(String, TargetLog)> {
    let log = TargetLog::default();
    let app = Router::new()
        .route("/txn", post(create_txn))
        .route("/txn/:id", get(get_txn))
        .route("/down", get(unavailable))
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Target server failed: {}", e);
        }
    });
    Ok((format!("http://{}", addr), log))
}
