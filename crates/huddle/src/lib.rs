// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Huddle: real-time one-to-one chat with presence and notifications.

pub mod auth;
pub mod bus;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod log;
pub mod model;
pub mod presence;
pub mod relay;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::{HmacVerifier, TokenVerifier};
use crate::bus::{GroupBus, LocalBus, NatsBus};
use crate::config::ChatConfig;
use crate::state::ChatState;
use crate::store::Store;
use crate::transport::build_router;

/// Run the chat server until Ctrl-C.
pub async fn run(config: ChatConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }
    serve(config, shutdown).await
}

/// Run the chat server until `shutdown` is cancelled.
pub async fn serve(config: ChatConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let store = Store::connect(&config.database_url, config.db_max_connections).await?;

    let bus: Arc<dyn GroupBus> = match config.nats() {
        Some(nats) => NatsBus::connect(&nats, shutdown.clone()).await? as Arc<dyn GroupBus>,
        None => Arc::new(LocalBus::new()) as Arc<dyn GroupBus>,
    };
    let verifier: Arc<dyn TokenVerifier> = Arc::new(HmacVerifier::new(&config.auth_secret));

    let state = Arc::new(ChatState::new(config, store, verifier, bus, shutdown.clone()));
    let stale = state.presence.clear_node().await?;
    if stale > 0 {
        tracing::info!(node_id = state.presence.node_id(), stale, "cleared connections from a previous run");
    }
    let router = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("huddle listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
