// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-room message log with seen tracking.

use anyhow::ensure;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::model::{from_micros, ChatRoom, Message, UserId};

type MessageRow = (i64, i64, i64, String, i64, bool);

fn message_from_row((id, room_id, sender_id, content, timestamp, is_seen): MessageRow) -> Message {
    Message { id, room_id, sender_id, content, timestamp: from_micros(timestamp), is_seen }
}

pub struct MessageLog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageLog<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message. The timestamp is assigned here and never goes
    /// backwards within a room, even if the wall clock does.
    pub async fn append(&self, room: &ChatRoom, sender: UserId, content: &str) -> anyhow::Result<Message> {
        ensure!(!content.is_empty(), "message content must not be empty");

        let now = Utc::now().timestamp_micros();
        let (id, timestamp): (i64, i64) = sqlx::query_as(
            "INSERT INTO messages (room_id,sender_id,content,timestamp) \
             SELECT ?1, ?2, ?3, MAX(?4, COALESCE((SELECT MAX(timestamp) FROM messages WHERE room_id=?1), ?4)) \
             RETURNING id, timestamp",
        )
        .bind(room.id)
        .bind(sender)
        .bind(content)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(Message {
            id,
            room_id: room.id,
            sender_id: sender,
            content: content.to_owned(),
            timestamp: from_micros(timestamp),
            is_seen: false,
        })
    }

    /// Mark every unseen message `counterpart` sent in `room` as seen.
    /// Returns how many messages flipped.
    pub async fn mark_seen(&self, room: &ChatRoom, counterpart: UserId) -> anyhow::Result<u64> {
        let done = sqlx::query("UPDATE messages SET is_seen=1 WHERE room_id=? AND sender_id=? AND is_seen=0")
            .bind(room.id)
            .bind(counterpart)
            .execute(self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    /// Full room history, oldest first.
    // TODO: paginate once clients can request older pages by message id.
    pub async fn history(&self, room: &ChatRoom) -> anyhow::Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,room_id,sender_id,content,timestamp,is_seen FROM messages \
             WHERE room_id=? ORDER BY timestamp, id",
        )
        .bind(room.id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    pub async fn last_message(&self, room: &ChatRoom) -> anyhow::Result<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id,room_id,sender_id,content,timestamp,is_seen FROM messages \
             WHERE room_id=? ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(room.id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(message_from_row))
    }

    /// Messages from `sender` in `room` the other side has not seen yet.
    pub async fn unseen_count(&self, room: &ChatRoom, sender: UserId) -> anyhow::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE room_id=? AND sender_id=? AND is_seen=0")
                .bind(room.id)
                .bind(sender)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
