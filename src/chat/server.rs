//! HTTP transport in front of the router.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tracing::info;

use super::{ChatRouter, InboundEvent, Reply};

pub fn router(chat: Arc<ChatRouter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(chat)
}

pub async fn serve(bind: &str, chat: Arc<ChatRouter>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(bind, "webhook listening");
    axum::serve(listener, router(chat)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn webhook(State(chat): State<Arc<ChatRouter>>, Json(event): Json<InboundEvent>) -> Json<Reply> {
    Json(chat.handle(&event).await)
}
