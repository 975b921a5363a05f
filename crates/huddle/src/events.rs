// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types: what travels over the group bus, and the JSON frames each
//! connection kind writes to and reads from its socket.
//!
//! Bus events are an internal representation; sessions translate them into
//! wire frames. Keeping the two apart lets the chat and notification
//! connections render the same status change differently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::UserId;

/// Presence of a user as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Offline,
}

// -- Bus events ---------------------------------------------------------------

/// An event published to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// A message was posted in a room.
    ChatMessage { message: String, sender_id: UserId, receiver_id: UserId, sender: String },
    /// Someone started or stopped typing in a room.
    TypingStatus { sender_id: UserId, typing: bool },
    /// A user came online or went offline.
    StatusUpdate { user_id: UserId, status: Presence },
    /// Alert for a recipient that a message arrived, wherever they are.
    NewMessageNotification { sender_id: UserId, sender_name: String, message: String },
    /// Alert for a user that someone followed them.
    FollowNotification { from_user_id: UserId, from_name: String },
}

// -- Wire frames --------------------------------------------------------------

/// Outbound frame on a chat or notification connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Chat { message: String, sender_id: UserId, receiver_id: UserId, sender: String },
    Typing { sender_id: UserId, typing: bool },
    Status { user_id: UserId, status: Presence, last_seen: Option<DateTime<Utc>> },
    NewMessage { sender_id: UserId, sender_name: String, message: String },
    Follow { from_user_id: UserId, from_name: String },
    /// Reported to the sending client only.
    Error { code: String, message: String },
}

impl ServerFrame {
    pub fn online(user_id: UserId) -> Self {
        Self::Status { user_id, status: Presence::Online, last_seen: None }
    }

    pub fn offline(user_id: UserId, last_seen: Option<DateTime<Utc>>) -> Self {
        Self::Status { user_id, status: Presence::Offline, last_seen }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(err = %e, "failed to encode frame");
                None
            }
        }
    }
}

/// Inbound frame on a chat connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Typing(bool),
    Message(String),
}

impl ClientFrame {
    /// Parse a text frame. Anything malformed, unrecognised, or an empty
    /// message yields `None` and is ignored by the caller.
    ///
    /// A `typing` key takes precedence over `message` when both are present.
    pub fn parse(text: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        let obj = value.as_object()?;

        if let Some(typing) = obj.get("typing") {
            return typing.as_bool().map(Self::Typing);
        }

        match obj.get("message").and_then(|m| m.as_str()) {
            Some(message) if !message.is_empty() => Some(Self::Message(message.to_owned())),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
