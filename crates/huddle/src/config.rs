// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the huddle chat server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "huddle", version, about = "Real-time chat and presence server")]
pub struct ChatConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "HUDDLE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8700, env = "HUDDLE_PORT")]
    pub port: u16,

    /// SQLite database URL. Created if missing.
    #[arg(long, default_value = "sqlite://huddle.db", env = "HUDDLE_DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections.
    #[arg(long, default_value_t = 16, env = "HUDDLE_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Shared secret used to verify client tokens.
    #[arg(long, env = "HUDDLE_AUTH_SECRET", hide_env_values = true)]
    pub auth_secret: String,

    /// Token for collaborator routes (`/api/v1/internal/`). When unset those
    /// routes refuse every request.
    #[arg(long, env = "HUDDLE_SERVICE_TOKEN", hide_env_values = true)]
    pub service_token: Option<String>,

    /// Name of this node in the shared presence table. Nodes sharing a
    /// database must use distinct names.
    #[arg(long, default_value = "local", env = "HUDDLE_NODE_ID")]
    pub node_id: String,

    /// NATS server URL. When unset, group events stay inside this process.
    #[arg(long, env = "HUDDLE_NATS_URL")]
    pub nats_url: Option<String>,

    /// NATS auth token.
    #[arg(long, env = "HUDDLE_NATS_TOKEN", hide_env_values = true)]
    pub nats_token: Option<String>,

    /// Subject prefix for group events on NATS.
    #[arg(long, default_value = "huddle", env = "HUDDLE_NATS_PREFIX")]
    pub nats_prefix: String,

    /// Per-connection queue depth for undelivered group events.
    #[arg(long, default_value_t = 256, env = "HUDDLE_MAILBOX_CAPACITY")]
    pub mailbox_capacity: usize,
}

/// NATS connection settings for the multi-node bus.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub url: String,
    pub token: Option<String>,
    pub prefix: String,
}

impl ChatConfig {
    /// Address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// NATS settings, if a server URL was configured.
    pub fn nats(&self) -> Option<NatsConfig> {
        self.nats_url.as_ref().map(|url| NatsConfig {
            url: url.clone(),
            token: self.nats_token.clone(),
            prefix: self.nats_prefix.clone(),
        })
    }
}
