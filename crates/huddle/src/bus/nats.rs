// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS-backed bus for multi-node deployments.
//!
//! Every publish goes to `{prefix}.group.{group}`. Each process subscribes
//! to `{prefix}.group.>` and hands inbound events to its own [`LocalBus`],
//! so a process sees its own publishes through the same path as everyone
//! else's. NATS keeps per-publisher order on a subject, which gives per-group
//! FIFO for each node.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Group, GroupBus, LocalBus, Mailbox, SubscriberId};
use crate::config::NatsConfig;
use crate::events::BusEvent;

pub struct NatsBus {
    client: async_nats::Client,
    prefix: String,
    local: Arc<LocalBus>,
}

impl NatsBus {
    /// Connect to NATS and start relaying group events to local subscribers.
    pub async fn connect(config: &NatsConfig, shutdown: CancellationToken) -> anyhow::Result<Arc<Self>> {
        let mut opts = async_nats::ConnectOptions::new();
        if let Some(ref token) = config.token {
            opts = opts.token(token.clone());
        }
        opts = opts.retry_on_initial_connect();

        info!(url = %config.url, prefix = %config.prefix, "connecting NATS bus");
        let client = opts.connect(&config.url).await?;
        let sub = client.subscribe(format!("{}.group.>", config.prefix)).await?;
        info!("NATS bus connected");

        let bus = Arc::new(Self { client, prefix: config.prefix.clone(), local: Arc::new(LocalBus::new()) });
        tokio::spawn(run_relay(Arc::clone(&bus.local), bus.prefix.clone(), sub, shutdown));
        Ok(bus)
    }

    fn subject(&self, group: &Group) -> String {
        subject_for(&self.prefix, group)
    }
}

#[async_trait]
impl GroupBus for NatsBus {
    async fn join(&self, group: &Group, subscriber: SubscriberId, mailbox: Mailbox) {
        self.local.join(group, subscriber, mailbox).await;
    }

    async fn leave(&self, group: &Group, subscriber: SubscriberId) {
        self.local.leave(group, subscriber).await;
    }

    async fn publish(&self, group: &Group, event: BusEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&event)?;
        self.client.publish(self.subject(group), bytes::Bytes::from(payload)).await?;
        Ok(())
    }
}

pub(crate) fn subject_for(prefix: &str, group: &Group) -> String {
    format!("{prefix}.group.{group}")
}

async fn run_relay(
    local: Arc<LocalBus>,
    prefix: String,
    mut sub: async_nats::Subscriber,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = sub.next() => {
                let Some(msg) = msg else {
                    warn!("NATS group subscription ended");
                    break;
                };
                handle_inbound(&local, &prefix, msg.subject.as_str(), &msg.payload).await;
            }
        }
    }
    debug!("NATS bus relay shutting down");
}

/// Decode one NATS message and deliver it locally. Returns the number of
/// local subscribers reached.
pub(crate) async fn handle_inbound(local: &LocalBus, prefix: &str, subject: &str, payload: &[u8]) -> usize {
    let Some(name) = subject.strip_prefix(prefix).and_then(|s| s.strip_prefix(".group.")) else {
        return 0;
    };
    let Some(group) = Group::from_name(name) else {
        debug!(subject, "NATS bus: invalid group name");
        return 0;
    };
    let event: BusEvent = match serde_json::from_slice(payload) {
        Ok(e) => e,
        Err(e) => {
            debug!(%group, "NATS bus: invalid event payload: {e}");
            return 0;
        }
    };
    local.deliver(&group, &event).await
}
