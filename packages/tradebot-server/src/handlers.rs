//! HTTP handlers for the webhook server

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;
use crate::telegram::Update;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// POST `/webhook` and `/`: one Telegram update per request
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> (StatusCode, Json<Value>) {
    let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !state.webhook_authorized(presented) {
        tracing::warn!(update_id = update.update_id, "Rejected webhook call with bad secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        );
    }

    match state.handle_update(update).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!("Error processing update: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// GET `/health` and `/`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "TradeBot is running",
        "open_tickers": state.open_ticker_count(),
    }))
}
