// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat data model: identities, rooms, messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RoomId = i64;
pub type MessageId = i64;

/// A user known to the store. Owned externally; the chat core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserIdentity {
    /// "First Last", or the username when both names are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

/// Canonical `(lo, hi)` ordering of two distinct user ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomPair {
    lo: UserId,
    hi: UserId,
}

impl RoomPair {
    /// Order the pair lower id first. `None` when both ids are the same user.
    pub fn new(a: UserId, b: UserId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { lo: a, hi: b }),
            std::cmp::Ordering::Greater => Some(Self { lo: b, hi: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn lo(&self) -> UserId {
        self.lo
    }

    pub fn hi(&self) -> UserId {
        self.hi
    }
}

/// A one-to-one chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub lo_user_id: UserId,
    pub hi_user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl ChatRoom {
    /// The member of this room that is not `user_id`.
    pub fn other(&self, user_id: UserId) -> UserId {
        if self.lo_user_id == user_id {
            self.hi_user_id
        } else {
            self.lo_user_id
        }
    }

    /// Broadcast group for live traffic in this room.
    pub fn group(&self) -> crate::bus::Group {
        crate::bus::Group::room(self.id)
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_seen: bool,
}

/// Convert stored epoch microseconds back to a UTC timestamp.
pub(crate) fn from_micros(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).unwrap_or_default()
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
