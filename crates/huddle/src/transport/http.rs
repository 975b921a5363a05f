// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for chat history, recent conversations, read receipts, and
//! the hooks collaborators use to feed this service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::bearer_token;
use crate::error::ChatError;
use crate::model::{UserId, UserIdentity};
use crate::relay;
use crate::state::ChatState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub online_users: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub sender_id: UserId,
    pub sender_username: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_seen: bool,
}

#[derive(Debug, Serialize)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct RecentChat {
    pub user_id: UserId,
    pub name: String,
    pub last_message: LastMessage,
    pub unseen_count: i64,
}

#[derive(Debug, Serialize)]
pub struct RecentChatsResponse {
    pub chats: Vec<RecentChat>,
    pub total_unseen_messages: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkSeenResponse {
    pub message: String,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<ChatState>>) -> impl IntoResponse {
    match s.presence.online_count().await {
        Ok(online_users) => Json(HealthResponse { status: "running".to_owned(), online_users }).into_response(),
        Err(e) => internal("presence count failed", e),
    }
}

/// `GET /api/v1/chat/{receiver_id}/messages`
pub async fn message_history(
    State(s): State<Arc<ChatState>>,
    Extension(me): Extension<UserIdentity>,
    Path(receiver_id): Path<UserId>,
) -> impl IntoResponse {
    let receiver = match s.store.get_user(receiver_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return ChatError::UserNotFound.to_http_response("user not found").into_response(),
        Err(e) => return internal("receiver lookup failed", e),
    };
    let Some(pair) = crate::model::RoomPair::new(me.id, receiver.id) else {
        return ChatError::BadRequest.to_http_response("cannot chat with yourself").into_response();
    };

    let room = match s.store.rooms().find(pair).await {
        Ok(Some(room)) => room,
        Ok(None) => return Json(Vec::<HistoryEntry>::new()).into_response(),
        Err(e) => return internal("room lookup failed", e),
    };
    let messages = match s.store.messages().history(&room).await {
        Ok(m) => m,
        Err(e) => return internal("history query failed", e),
    };

    let entries: Vec<HistoryEntry> = messages
        .into_iter()
        .map(|m| HistoryEntry {
            id: m.id,
            sender_id: m.sender_id,
            sender_username: if m.sender_id == me.id { me.username.clone() } else { receiver.username.clone() },
            content: m.content,
            timestamp: m.timestamp,
            is_seen: m.is_seen,
        })
        .collect();
    Json(entries).into_response()
}

/// `GET /api/v1/chat/recent`
pub async fn recent_chats(
    State(s): State<Arc<ChatState>>,
    Extension(me): Extension<UserIdentity>,
) -> impl IntoResponse {
    let rooms = match s.store.rooms().rooms_for(me.id).await {
        Ok(r) => r,
        Err(e) => return internal("room listing failed", e),
    };

    let log = s.store.messages();
    let mut rows = Vec::with_capacity(rooms.len());
    for room in &rooms {
        let other_id = room.other(me.id);
        let other = match s.store.get_user(other_id).await {
            Ok(Some(u)) => u,
            Ok(None) => continue,
            Err(e) => return internal("user lookup failed", e),
        };
        let last = match log.last_message(room).await {
            Ok(m) => m,
            Err(e) => return internal("last message query failed", e),
        };
        let unseen = match log.unseen_count(room, other_id).await {
            Ok(n) => n,
            Err(e) => return internal("unseen count failed", e),
        };
        let sort_key = last.as_ref().map(|m| m.timestamp);
        let last_message = match last {
            Some(m) => LastMessage { content: m.content, timestamp: m.timestamp.to_rfc3339() },
            None => LastMessage { content: String::new(), timestamp: String::new() },
        };
        rows.push((
            sort_key,
            RecentChat { user_id: other.id, name: other.display_name(), last_message, unseen_count: unseen },
        ));
    }

    // Newest first; rooms with no messages sort last (`None` < `Some`).
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    let chats: Vec<RecentChat> = rows.into_iter().map(|(_, c)| c).collect();
    let total_unseen_messages = chats.iter().map(|c| c.unseen_count).sum();
    Json(RecentChatsResponse { chats, total_unseen_messages }).into_response()
}

/// `POST /api/v1/chat/{receiver_id}/mark-seen`
pub async fn mark_seen(
    State(s): State<Arc<ChatState>>,
    Extension(me): Extension<UserIdentity>,
    Path(receiver_id): Path<UserId>,
) -> impl IntoResponse {
    let receiver = match s.store.get_user(receiver_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return ChatError::UserNotFound.to_http_response("user not found").into_response(),
        Err(e) => return internal("receiver lookup failed", e),
    };
    let room = match crate::model::RoomPair::new(me.id, receiver.id) {
        Some(pair) => match s.store.rooms().find(pair).await {
            Ok(room) => room,
            Err(e) => return internal("room lookup failed", e),
        },
        None => None,
    };
    let Some(room) = room else {
        return ChatError::RoomNotFound.to_http_response("chat room not found").into_response();
    };

    match s.store.messages().mark_seen(&room, receiver.id).await {
        Ok(updated) => {
            Json(MarkSeenResponse { message: "Messages marked as seen".to_owned(), updated }).into_response()
        }
        Err(e) => internal("mark seen failed", e),
    }
}

/// `POST /api/v1/notify/follow/{user_id}`: the caller started following
/// `user_id`; tell their notification connections.
pub async fn follow_notification(
    State(s): State<Arc<ChatState>>,
    Extension(me): Extension<UserIdentity>,
    Path(target_id): Path<UserId>,
) -> impl IntoResponse {
    let target = match s.store.get_user(target_id).await {
        Ok(Some(t)) => t,
        Ok(None) => return ChatError::UserNotFound.to_http_response("user not found").into_response(),
        Err(e) => return internal("target lookup failed", e),
    };
    if target.id == me.id {
        return ChatError::BadRequest.to_http_response("cannot follow yourself").into_response();
    }

    match relay::notify_follow(s.bus.as_ref(), &me, target.id).await {
        Ok(()) => Json(AckResponse { message: "Follow notification sent".to_owned() }).into_response(),
        Err(e) => internal("follow notification failed", e),
    }
}

/// `PUT /api/v1/internal/users/{user_id}`: the profile service mirrors a
/// user into this store. Authenticated with the service token.
pub async fn upsert_user(
    State(s): State<Arc<ChatState>>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
    Json(profile): Json<UserProfile>,
) -> impl IntoResponse {
    if !s.is_service(bearer_token(&headers)) {
        return ChatError::Unauthorized.to_http_response("service token required").into_response();
    }
    if profile.username.trim().is_empty() {
        return ChatError::BadRequest.to_http_response("username must not be empty").into_response();
    }

    let user = UserIdentity {
        id: user_id,
        username: profile.username,
        first_name: profile.first_name,
        last_name: profile.last_name,
    };
    match s.store.upsert_user(&user).await {
        Ok(()) => {
            tracing::info!(user_id, "user mirrored");
            Json(user).into_response()
        }
        Err(e) => internal("user upsert failed", e),
    }
}

fn internal(what: &str, err: anyhow::Error) -> axum::response::Response {
    tracing::warn!(err = %err, "{what}");
    ChatError::Internal.to_http_response(what).into_response()
}
