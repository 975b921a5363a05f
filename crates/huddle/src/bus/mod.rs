// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group broadcast bus.
//!
//! Subscribers are connection sessions, each identified by a
//! [`SubscriberId`] and reached through a bounded [`Mailbox`]. A session may
//! join several groups with the same mailbox; events from all of them arrive
//! interleaved, in publish order per group.

pub mod local;
pub mod nats;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::BusEvent;
use crate::model::{RoomId, UserId};

pub use local::LocalBus;
pub use nats::NatsBus;

/// Identifies one subscriber (one open connection).
pub type SubscriberId = uuid::Uuid;

/// Delivery end of a subscriber.
pub type Mailbox = mpsc::Sender<BusEvent>;

/// A named broadcast group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Group(String);

impl Group {
    pub const USER_STATUS: &'static str = "user_status";

    /// Live traffic for one chat room.
    pub fn room(room_id: RoomId) -> Self {
        Self(format!("chat_{room_id}"))
    }

    /// Presence changes for every user.
    pub fn user_status() -> Self {
        Self(Self::USER_STATUS.to_owned())
    }

    /// Out-of-room alerts for one user.
    pub fn notifications(user_id: UserId) -> Self {
        Self(format!("notifications_{user_id}"))
    }

    /// Rebuild a group from its name as carried on an external medium.
    pub fn from_name(name: &str) -> Option<Self> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publish/subscribe fabric keyed by group name.
///
/// Delivery is best-effort: a subscriber that has gone away or whose
/// mailbox is full misses the event, and nobody retries.
#[async_trait]
pub trait GroupBus: Send + Sync {
    async fn join(&self, group: &Group, subscriber: SubscriberId, mailbox: Mailbox);

    async fn leave(&self, group: &Group, subscriber: SubscriberId);

    async fn publish(&self, group: &Group, event: BusEvent) -> anyhow::Result<()>;
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
