// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification relay: publishes out-of-room events to a user's personal
//! group and presence changes to the global status group.

use crate::bus::{Group, GroupBus};
use crate::events::{BusEvent, Presence};
use crate::model::{UserId, UserIdentity};

/// Tell `receiver`'s open notification connections that `sender` wrote.
pub async fn notify_new_message(
    bus: &dyn GroupBus,
    receiver: UserId,
    sender: &UserIdentity,
    message: &str,
) -> anyhow::Result<()> {
    bus.publish(
        &Group::notifications(receiver),
        BusEvent::NewMessageNotification {
            sender_id: sender.id,
            sender_name: sender.display_name(),
            message: message.to_owned(),
        },
    )
    .await
}

/// Tell `target` that `follower` started following them.
pub async fn notify_follow(bus: &dyn GroupBus, follower: &UserIdentity, target: UserId) -> anyhow::Result<()> {
    bus.publish(
        &Group::notifications(target),
        BusEvent::FollowNotification { from_user_id: follower.id, from_name: follower.display_name() },
    )
    .await
}

/// Broadcast a presence change to every chat and notification session.
pub async fn announce_status(bus: &dyn GroupBus, user_id: UserId, status: Presence) -> anyhow::Result<()> {
    bus.publish(&Group::user_status(), BusEvent::StatusUpdate { user_id, status }).await
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
