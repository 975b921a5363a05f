// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process bus: group membership and delivery in one process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;

use super::{Group, GroupBus, Mailbox, SubscriberId};
use crate::events::BusEvent;

/// Group membership table with direct mailbox delivery.
#[derive(Default)]
pub struct LocalBus {
    groups: RwLock<HashMap<Group, HashMap<SubscriberId, Mailbox>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `event` to every current member of `group`.
    ///
    /// Returns the number of mailboxes that accepted it.
    pub async fn deliver(&self, group: &Group, event: &BusEvent) -> usize {
        let groups = self.groups.read().await;
        let Some(members) = groups.get(group) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, mailbox) in members {
            match mailbox.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(%group, subscriber = %id, "mailbox full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!(%group, subscriber = %id, "subscriber gone, dropping event");
                }
            }
        }
        delivered
    }

    /// Number of subscribers currently in `group`.
    pub async fn member_count(&self, group: &Group) -> usize {
        self.groups.read().await.get(group).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl GroupBus for LocalBus {
    async fn join(&self, group: &Group, subscriber: SubscriberId, mailbox: Mailbox) {
        self.groups.write().await.entry(group.clone()).or_default().insert(subscriber, mailbox);
    }

    async fn leave(&self, group: &Group, subscriber: SubscriberId) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(&subscriber);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    async fn publish(&self, group: &Group, event: BusEvent) -> anyhow::Result<()> {
        self.deliver(group, &event).await;
        Ok(())
    }
}
