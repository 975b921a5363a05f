// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed durable store.
//!
//! Owns the connection pool and schema. Room and message queries live in
//! [`crate::directory`] and [`crate::log`], connection tracking in
//! [`crate::presence`]; this module keeps the user mirror and last-seen
//! records.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::directory::RoomDirectory;
use crate::log::MessageLog;
use crate::model::{from_micros, UserId, UserIdentity};
use crate::presence::PresenceRegistry;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS chat_rooms (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    lo_user_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    hi_user_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  INTEGER NOT NULL,
    UNIQUE (lo_user_id, hi_user_id),
    CHECK (lo_user_id < hi_user_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id     INTEGER NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
    sender_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    content     TEXT NOT NULL CHECK (length(content) > 0),
    timestamp   INTEGER NOT NULL,
    is_seen     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS messages_room_timestamp ON messages (room_id, timestamp);

CREATE TABLE IF NOT EXISTS user_activity (
    user_id     INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    last_seen   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS presence (
    conn_id      TEXT PRIMARY KEY,
    user_id      INTEGER NOT NULL,
    node_id      TEXT NOT NULL,
    connected_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS presence_user ON presence (user_id);
"#;

/// Handle to the durable store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database at `url` and apply the schema.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(opts).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database, for tests and throwaway runs.
    ///
    /// Pinned to a single connection that never idles out: every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn rooms(&self) -> RoomDirectory<'_> {
        RoomDirectory::new(&self.pool)
    }

    pub fn messages(&self) -> MessageLog<'_> {
        MessageLog::new(&self.pool)
    }

    /// Connection registry for the node named `node_id`.
    pub fn presence(&self, node_id: impl Into<String>) -> PresenceRegistry {
        PresenceRegistry::new(self.pool.clone(), node_id.into())
    }

    /// Underlying pool, for maintenance queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Mirror an externally owned profile into the local `users` table.
    pub async fn upsert_user(&self, user: &UserIdentity) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (id,username,first_name,last_name) VALUES (?,?,?,?) \
             ON CONFLICT(id) DO UPDATE SET username=excluded.username, \
             first_name=excluded.first_name, last_name=excluded.last_name",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user(&self, id: UserId) -> anyhow::Result<Option<UserIdentity>> {
        let row: Option<(i64, String, String, String)> =
            sqlx::query_as("SELECT id,username,first_name,last_name FROM users WHERE id=?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, username, first_name, last_name)| UserIdentity {
            id,
            username,
            first_name,
            last_name,
        }))
    }

    /// When `user` last closed their final connection, if ever.
    pub async fn last_seen(&self, user: UserId) -> anyhow::Result<Option<DateTime<Utc>>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT last_seen FROM user_activity WHERE user_id=?")
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(us,)| from_micros(us)))
    }

    /// Stamp `user`'s last-seen time, creating the record on first use.
    pub async fn touch_last_seen(&self, user: UserId, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_activity (user_id,last_seen) VALUES (?,?) \
             ON CONFLICT(user_id) DO UPDATE SET last_seen=excluded.last_seen",
        )
        .bind(user)
        .bind(at.timestamp_micros())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
