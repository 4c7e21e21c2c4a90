//! Request handlers for the long-poll chat routes.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::broker::PollReply;
use crate::domain::sanitize_incoming;

use super::state::AppState;

/// Body of `POST /chat/{id}`, exactly as submitted by the client.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub username: String,
    pub message: String,
}

/// `GET /chat`: allocate a new client id.
pub async fn new_client(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let id = state.broker.next_id().await;
    tracing::info!(client_id = id, "allocated new client id");
    Json(serde_json::json!({ "id": id }))
}

/// `GET /chat/{id}`: the long poll.
///
/// The handler parks on the receiving half of a oneshot channel while the
/// broker holds the sending half; the response materializes whenever the
/// slot answers (buffered flush, fresh message or renewal). If the client
/// disconnects first, this future is dropped and the broker's next send
/// on the dead handle fails harmlessly.
pub async fn poll(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Json<PollReply> {
    let (tx, rx) = oneshot::channel();
    state.broker.provide_response(id, tx).await;

    match rx.await {
        Ok(reply) => Json(reply),
        // The sender was dropped without a reply; nothing to report.
        Err(_) => Json(PollReply::empty()),
    }
}

/// `POST /chat/{id}`: submit a message.
///
/// Sanitization runs here, before the broker constructs the immutable
/// message. An unknown `id` is treated like a fresh one; the client never
/// sees an error from the broker.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<IncomingMessage>,
) -> StatusCode {
    let (username, message) = sanitize_incoming(&body.username, &body.message);
    state.broker.add_message(username, message, Some(id)).await;
    StatusCode::OK
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
