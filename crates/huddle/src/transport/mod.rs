// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the chat server.

pub mod auth;
pub mod http;
pub mod ws_chat;
pub mod ws_notify;

use std::sync::Arc;

use axum::extract::ws::Message;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use futures_util::{Sink, SinkExt};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::events::ServerFrame;
use crate::state::ChatState;

/// Build the axum `Router` with all chat routes.
pub fn build_router(state: Arc<ChatState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Chat history and summaries
        .route("/api/v1/chat/recent", get(http::recent_chats))
        .route("/api/v1/chat/{receiver_id}/messages", get(http::message_history))
        .route("/api/v1/chat/{receiver_id}/mark-seen", post(http::mark_seen))
        .route("/api/v1/notify/follow/{user_id}", post(http::follow_notification))
        // Collaborator hooks (service token)
        .route("/api/v1/internal/users/{user_id}", put(http::upsert_user))
        // WebSocket (token in query string)
        .route("/ws/chat/{receiver_id}", get(ws_chat::chat_ws_handler))
        .route("/ws/notifications", get(ws_notify::notifications_ws_handler))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Query parameters accepted on WebSocket upgrades.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Serialize and write one frame. Fails only when the socket is gone.
pub(crate) async fn send_frame<S>(tx: &mut S, frame: &ServerFrame) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match frame.to_json() {
        Some(json) => tx.send(Message::Text(json.into())).await,
        None => Ok(()),
    }
}
