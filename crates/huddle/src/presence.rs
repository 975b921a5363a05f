// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence registry: which users hold at least one open notification
//! connection on any node sharing the store.
//!
//! Tracked per connection, not per user, so closing one tab does not mark a
//! user offline while another tab is still open, wherever that tab landed.
//! Each change and the count that classifies it run in one transaction.

use sqlx::SqlitePool;

use crate::model::UserId;

/// Identifies one open connection.
pub type ConnectionId = uuid::Uuid;

/// Result of registering a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The user had no other open connection.
    First,
    /// The user was already online elsewhere.
    Additional,
}

/// Result of removing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// That was the user's last connection; they are now offline.
    Last,
    /// Other connections remain open.
    Remaining(usize),
    /// The connection was not registered.
    Unknown,
}

/// Connection table shared by every node, scoped to this node for cleanup.
#[derive(Clone)]
pub struct PresenceRegistry {
    pool: SqlitePool,
    node_id: String,
}

impl PresenceRegistry {
    pub(crate) fn new(pool: SqlitePool, node_id: String) -> Self {
        Self { pool, node_id }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub async fn connect(&self, user: UserId, conn: ConnectionId) -> anyhow::Result<Arrival> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO presence (conn_id,user_id,node_id,connected_at) VALUES (?,?,?,?)")
            .bind(conn.to_string())
            .bind(user)
            .bind(&self.node_id)
            .bind(chrono::Utc::now().timestamp_micros())
            .execute(&mut *tx)
            .await?;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM presence WHERE user_id=?")
            .bind(user)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(if count == 1 { Arrival::First } else { Arrival::Additional })
    }

    pub async fn disconnect(&self, user: UserId, conn: ConnectionId) -> anyhow::Result<Departure> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM presence WHERE conn_id=? AND user_id=?")
            .bind(conn.to_string())
            .bind(user)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            tx.rollback().await?;
            return Ok(Departure::Unknown);
        }
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM presence WHERE user_id=?")
            .bind(user)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(match usize::try_from(count).unwrap_or(0) {
            0 => Departure::Last,
            n => Departure::Remaining(n),
        })
    }

    pub async fn is_online(&self, user: UserId) -> anyhow::Result<bool> {
        let (online,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM presence WHERE user_id=?)")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;
        Ok(online)
    }

    pub async fn connection_count(&self, user: UserId) -> anyhow::Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM presence WHERE user_id=?")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of distinct users online across all nodes.
    pub async fn online_count(&self) -> anyhow::Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT user_id) FROM presence")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Drop connections a previous run of this node left behind.
    pub async fn clear_node(&self) -> anyhow::Result<u64> {
        let done = sqlx::query("DELETE FROM presence WHERE node_id=?").bind(&self.node_id).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
