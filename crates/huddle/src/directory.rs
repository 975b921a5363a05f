// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat room directory: one room per unordered pair of users.

use anyhow::anyhow;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::model::{from_micros, ChatRoom, RoomPair, UserId};

/// Attempts before giving up on a get-or-create that keeps losing races.
const CREATE_ATTEMPTS: usize = 3;

type RoomRow = (i64, i64, i64, i64);

fn room_from_row((id, lo_user_id, hi_user_id, created_at): RoomRow) -> ChatRoom {
    ChatRoom { id, lo_user_id, hi_user_id, created_at: from_micros(created_at) }
}

pub struct RoomDirectory<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomDirectory<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve the room shared by `a` and `b`, creating it on first contact.
    ///
    /// Direction-independent: `resolve(a, b)` and `resolve(b, a)` return the
    /// same room.
    pub async fn resolve(&self, a: UserId, b: UserId) -> anyhow::Result<ChatRoom> {
        let pair = RoomPair::new(a, b).ok_or_else(|| anyhow!("user {a} cannot chat with themselves"))?;

        for attempt in 0..CREATE_ATTEMPTS {
            if let Some(room) = self.find(pair).await? {
                return Ok(room);
            }

            let created_at = Utc::now();
            let inserted = sqlx::query(
                "INSERT INTO chat_rooms (lo_user_id,hi_user_id,created_at) VALUES (?,?,?)",
            )
            .bind(pair.lo())
            .bind(pair.hi())
            .bind(created_at.timestamp_micros())
            .execute(self.pool)
            .await;

            match inserted {
                Ok(done) => {
                    let room = ChatRoom {
                        id: done.last_insert_rowid(),
                        lo_user_id: pair.lo(),
                        hi_user_id: pair.hi(),
                        created_at: from_micros(created_at.timestamp_micros()),
                    };
                    tracing::info!(room_id = room.id, lo = pair.lo(), hi = pair.hi(), "chat room created");
                    return Ok(room);
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(attempt, lo = pair.lo(), hi = pair.hi(), "room created concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(anyhow!("could not resolve room for ({}, {})", pair.lo(), pair.hi()))
    }

    /// Look up an existing room without creating one.
    pub async fn find(&self, pair: RoomPair) -> anyhow::Result<Option<ChatRoom>> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT id,lo_user_id,hi_user_id,created_at FROM chat_rooms WHERE lo_user_id=? AND hi_user_id=?",
        )
        .bind(pair.lo())
        .bind(pair.hi())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(room_from_row))
    }

    /// Every room `user` is a member of.
    pub async fn rooms_for(&self, user: UserId) -> anyhow::Result<Vec<ChatRoom>> {
        let rows: Vec<RoomRow> = sqlx::query_as(
            "SELECT id,lo_user_id,hi_user_id,created_at FROM chat_rooms \
             WHERE lo_user_id=? OR hi_user_id=? ORDER BY id",
        )
        .bind(user)
        .bind(user)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(room_from_row).collect())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| db.is_unique_violation())
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
