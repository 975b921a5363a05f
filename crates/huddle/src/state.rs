// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::{ServiceToken, TokenVerifier};
use crate::bus::{GroupBus, Mailbox};
use crate::config::ChatConfig;
use crate::events::{BusEvent, Presence};
use crate::model::{UserId, UserIdentity};
use crate::presence::{Arrival, ConnectionId, Departure, PresenceRegistry};
use crate::relay;
use crate::store::Store;

/// Shared server state, one per process.
pub struct ChatState {
    pub config: ChatConfig,
    pub store: Store,
    pub verifier: Arc<dyn TokenVerifier>,
    pub service: Option<ServiceToken>,
    pub bus: Arc<dyn GroupBus>,
    pub presence: PresenceRegistry,
    pub shutdown: CancellationToken,
}

impl ChatState {
    pub fn new(
        config: ChatConfig,
        store: Store,
        verifier: Arc<dyn TokenVerifier>,
        bus: Arc<dyn GroupBus>,
        shutdown: CancellationToken,
    ) -> Self {
        let presence = store.presence(config.node_id.clone());
        let service = config.service_token.as_deref().map(ServiceToken::new);
        Self { config, store, verifier, service, bus, presence, shutdown }
    }

    /// Resolve a presented token to a known user.
    ///
    /// Any failure (missing, forged, or naming a user the store does not
    /// know) is `None`, so callers cannot tell the cases apart.
    pub async fn authenticate(&self, token: Option<&str>) -> Option<UserIdentity> {
        let user_id = self.verifier.verify(token?)?;
        match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(user_id, err = %e, "user lookup failed during authentication");
                None
            }
        }
    }

    /// Whether `token` is the configured collaborator token.
    pub fn is_service(&self, token: Option<&str>) -> bool {
        match (&self.service, token) {
            (Some(service), Some(token)) => service.matches(token),
            _ => false,
        }
    }

    /// Fresh bounded mailbox for a new connection.
    pub fn mailbox(&self) -> (Mailbox, mpsc::Receiver<BusEvent>) {
        mpsc::channel(self.config.mailbox_capacity.max(1))
    }

    /// Register `conn` for `user` and announce them online.
    pub async fn arrive(&self, user: UserId, conn: ConnectionId) -> anyhow::Result<Arrival> {
        let arrival = self.presence.connect(user, conn).await?;
        relay::announce_status(self.bus.as_ref(), user, Presence::Online).await?;
        Ok(arrival)
    }

    /// Remove `conn`. When it was the user's last connection on any node,
    /// stamp last-seen and announce them offline.
    pub async fn depart(&self, user: UserId, conn: ConnectionId) -> anyhow::Result<Departure> {
        let departure = self.presence.disconnect(user, conn).await?;
        if departure == Departure::Last {
            self.settle_offline(user).await?;
        }
        Ok(departure)
    }

    /// Stamp last-seen, then announce `offline` unless a connection for
    /// `user` registered in the meantime. Returns whether it announced.
    pub async fn settle_offline(&self, user: UserId) -> anyhow::Result<bool> {
        self.store.touch_last_seen(user, Utc::now()).await?;
        if self.presence.is_online(user).await? {
            tracing::debug!(user_id = user, "reconnected before offline announcement");
            return Ok(false);
        }
        relay::announce_status(self.bus.as_ref(), user, Presence::Offline).await?;
        Ok(true)
    }

    /// Presence of `user` as the registry sees it now. Status events only
    /// prompt a re-read, so a late event cannot override a newer state.
    /// `fallback` is used when the registry cannot be read.
    pub async fn current_presence(&self, user: UserId, fallback: Presence) -> Presence {
        match self.presence.is_online(user).await {
            Ok(true) => Presence::Online,
            Ok(false) => Presence::Offline,
            Err(e) => {
                tracing::warn!(user_id = user, err = %e, "presence lookup failed");
                fallback
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
