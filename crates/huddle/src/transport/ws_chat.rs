// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat WebSocket: one connection per (user, counterpart) conversation.
//!
//! The session joins its room group and the global status group, tells the
//! client whether the counterpart is online, then relays typing signals and
//! messages. Messages are persisted before anyone else sees them.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::{auth, send_frame, WsQuery};
use crate::bus::{Group, SubscriberId};
use crate::error::ChatError;
use crate::events::{BusEvent, ClientFrame, Presence, ServerFrame};
use crate::model::{ChatRoom, UserId, UserIdentity};
use crate::relay;
use crate::state::ChatState;

/// `GET /ws/chat/{receiver_id}`: WebSocket upgrade for a one-to-one chat.
pub async fn chat_ws_handler(
    State(state): State<Arc<ChatState>>,
    Path(receiver_id): Path<UserId>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(user) = state.authenticate(query.token.as_deref()).await else {
        return auth::unauthorized();
    };

    let receiver = match state.store.get_user(receiver_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            return ChatError::UserNotFound.to_http_response("user not found").into_response();
        }
        Err(e) => {
            tracing::warn!(receiver_id, err = %e, "receiver lookup failed");
            return ChatError::Internal.to_http_response("receiver lookup failed").into_response();
        }
    };
    if receiver.id == user.id {
        return ChatError::BadRequest.to_http_response("cannot chat with yourself").into_response();
    }

    let room = match state.store.rooms().resolve(user.id, receiver.id).await {
        Ok(room) => room,
        Err(e) => {
            tracing::warn!(user_id = user.id, receiver_id, err = %e, "room resolution failed");
            return ChatError::Internal.to_http_response("room unavailable").into_response();
        }
    };

    ws.on_upgrade(move |socket| ChatSession::new(state, user, receiver, room).run(socket))
        .into_response()
}

/// Per-connection chat session.
pub struct ChatSession {
    state: Arc<ChatState>,
    id: SubscriberId,
    user: UserIdentity,
    receiver: UserIdentity,
    room: ChatRoom,
}

impl ChatSession {
    pub fn new(state: Arc<ChatState>, user: UserIdentity, receiver: UserIdentity, room: ChatRoom) -> Self {
        Self { state, id: uuid::Uuid::new_v4(), user, receiver, room }
    }

    fn groups(&self) -> [Group; 2] {
        [self.room.group(), Group::user_status()]
    }

    async fn run(self, socket: WebSocket) {
        let (mut ws_tx, mut ws_rx) = socket.split();
        let (mailbox, mut events) = self.state.mailbox();

        for group in self.groups() {
            self.state.bus.join(&group, self.id, mailbox.clone()).await;
        }
        drop(mailbox);
        tracing::debug!(user_id = self.user.id, room_id = self.room.id, "chat session opened");

        let initial = self.counterpart_status(Presence::Offline).await;
        if send_frame(&mut ws_tx, &initial).await.is_ok() {
            self.event_loop(&mut ws_tx, &mut ws_rx, &mut events).await;
        }

        for group in self.groups() {
            self.state.bus.leave(&group, self.id).await;
        }
        tracing::debug!(user_id = self.user.id, room_id = self.room.id, "chat session closed");
    }

    async fn event_loop(
        &self,
        ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
        ws_rx: &mut futures_util::stream::SplitStream<WebSocket>,
        events: &mut mpsc::Receiver<BusEvent>,
    ) {
        loop {
            tokio::select! {
                _ = self.state.shutdown.cancelled() => break,

                // Forward group events to the client.
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Some(frame) = self.render(event).await {
                        if send_frame(ws_tx, &frame).await.is_err() {
                            break;
                        }
                    }
                }

                // Handle frames from the client.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = self.handle_client_frame(text.as_str()).await {
                                if send_frame(ws_tx, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        _ => {}
                    }
                }
            }
        }
    }

    /// Current presence of the counterpart as a status frame.
    async fn counterpart_status(&self, hint: Presence) -> ServerFrame {
        match self.state.current_presence(self.receiver.id, hint).await {
            Presence::Online => ServerFrame::online(self.receiver.id),
            Presence::Offline => ServerFrame::offline(self.receiver.id, self.receiver_last_seen().await),
        }
    }

    async fn receiver_last_seen(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self.state.store.last_seen(self.receiver.id).await {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(user_id = self.receiver.id, err = %e, "last-seen lookup failed");
                None
            }
        }
    }

    /// Translate a group event into the frame this client should see, if any.
    async fn render(&self, event: BusEvent) -> Option<ServerFrame> {
        match event {
            BusEvent::ChatMessage { message, sender_id, receiver_id, sender } => {
                Some(ServerFrame::Chat { message, sender_id, receiver_id, sender })
            }
            BusEvent::TypingStatus { sender_id, typing } => Some(ServerFrame::Typing { sender_id, typing }),
            BusEvent::StatusUpdate { user_id, status } if user_id == self.receiver.id => {
                Some(self.counterpart_status(status).await)
            }
            _ => None,
        }
    }

    /// Apply one inbound frame. Returns a frame for this client alone when
    /// the message could not be delivered.
    async fn handle_client_frame(&self, text: &str) -> Option<ServerFrame> {
        let Some(frame) = ClientFrame::parse(text) else {
            tracing::trace!(user_id = self.user.id, "ignoring unrecognised chat frame");
            return None;
        };

        match frame {
            ClientFrame::Typing(typing) => {
                let event = BusEvent::TypingStatus { sender_id: self.user.id, typing };
                if let Err(e) = self.state.bus.publish(&self.room.group(), event).await {
                    tracing::debug!(room_id = self.room.id, err = %e, "typing publish failed");
                }
                None
            }
            ClientFrame::Message(message) => self.deliver(message).await,
        }
    }

    async fn deliver(&self, message: String) -> Option<ServerFrame> {
        if let Err(e) = self.state.store.messages().append(&self.room, self.user.id, &message).await {
            tracing::warn!(room_id = self.room.id, user_id = self.user.id, err = %e, "message append failed");
            return Some(ChatError::DeliveryFailed.to_frame("message could not be saved"));
        }

        let event = BusEvent::ChatMessage {
            message: message.clone(),
            sender_id: self.user.id,
            receiver_id: self.receiver.id,
            sender: self.user.display_name(),
        };
        if let Err(e) = self.state.bus.publish(&self.room.group(), event).await {
            tracing::warn!(room_id = self.room.id, err = %e, "chat publish failed");
        }
        if let Err(e) = relay::notify_new_message(self.state.bus.as_ref(), self.receiver.id, &self.user, &message).await {
            tracing::warn!(receiver_id = self.receiver.id, err = %e, "new-message notification failed");
        }
        None
    }
}
