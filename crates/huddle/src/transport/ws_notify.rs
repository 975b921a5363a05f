// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification WebSocket: a user's personal channel.
//!
//! Holding one of these open is what makes a user online. The session
//! forwards new-message and follow notifications plus everyone's presence
//! changes. Inbound frames are ignored.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use super::{auth, send_frame, WsQuery};
use crate::bus::Group;
use crate::events::{BusEvent, ServerFrame};
use crate::model::UserIdentity;
use crate::presence::{ConnectionId, Departure};
use crate::state::ChatState;

/// `GET /ws/notifications`: WebSocket upgrade for the personal channel.
pub async fn notifications_ws_handler(
    State(state): State<Arc<ChatState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(user) = state.authenticate(query.token.as_deref()).await else {
        return auth::unauthorized();
    };
    ws.on_upgrade(move |socket| run(state, user, socket)).into_response()
}

async fn run(state: Arc<ChatState>, user: UserIdentity, socket: WebSocket) {
    let conn: ConnectionId = uuid::Uuid::new_v4();
    let groups = [Group::notifications(user.id), Group::user_status()];
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mailbox, mut events) = state.mailbox();

    for group in &groups {
        state.bus.join(group, conn, mailbox.clone()).await;
    }
    drop(mailbox);

    match state.arrive(user.id, conn).await {
        Ok(arrival) => tracing::debug!(user_id = user.id, ?arrival, "notification session opened"),
        Err(e) => tracing::warn!(user_id = user.id, err = %e, "presence registration failed"),
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(frame) = render(&state, event).await {
                    if send_frame(&mut ws_tx, &frame).await.is_err() {
                        break;
                    }
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // Nothing is accepted from the client on this channel.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    for group in &groups {
        state.bus.leave(group, conn).await;
    }

    match state.depart(user.id, conn).await {
        Ok(Departure::Last) => tracing::debug!(user_id = user.id, "user offline"),
        Ok(Departure::Remaining(n)) => {
            tracing::debug!(user_id = user.id, remaining = n, "notification session closed");
        }
        Ok(Departure::Unknown) => {
            tracing::warn!(user_id = user.id, %conn, "closing connection was not registered");
        }
        Err(e) => tracing::warn!(user_id = user.id, err = %e, "presence removal failed"),
    }
}

/// Notification channels see status changes without a last-seen lookup.
async fn render(state: &ChatState, event: BusEvent) -> Option<ServerFrame> {
    match event {
        BusEvent::NewMessageNotification { sender_id, sender_name, message } => {
            Some(ServerFrame::NewMessage { sender_id, sender_name, message })
        }
        BusEvent::FollowNotification { from_user_id, from_name } => {
            Some(ServerFrame::Follow { from_user_id, from_name })
        }
        BusEvent::StatusUpdate { user_id, status } => {
            let status = state.current_presence(user_id, status).await;
            Some(ServerFrame::Status { user_id, status, last_seen: None })
        }
        BusEvent::ChatMessage { .. } | BusEvent::TypingStatus { .. } => None,
    }
}
