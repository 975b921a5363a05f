// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the chat REST API.
//!
//! Uses `axum_test::TestServer` over an in-memory store, no real TCP needed.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use tokio_util::sync::CancellationToken;

use huddle::auth::HmacVerifier;
use huddle::bus::{Group, GroupBus, LocalBus};
use huddle::config::ChatConfig;
use huddle::events::BusEvent;
use huddle::model::UserIdentity;
use huddle::state::ChatState;
use huddle::store::Store;
use huddle::transport::build_router;

const SERVICE_TOKEN: &str = "svc-token";
const SECRET: &str = "test-secret";

fn test_config() -> ChatConfig {
    ChatConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        db_max_connections: 1,
        auth_secret: SECRET.into(),
        service_token: Some(SERVICE_TOKEN.into()),
        node_id: "test".into(),
        nats_url: None,
        nats_token: None,
        nats_prefix: "huddle".into(),
        mailbox_capacity: 16,
    }
}

fn user(id: i64, username: &str, first: &str, last: &str) -> UserIdentity {
    UserIdentity { id, username: username.into(), first_name: first.into(), last_name: last.into() }
}

async fn test_state() -> anyhow::Result<Arc<ChatState>> {
    let store = Store::in_memory().await?;
    store.upsert_user(&user(5, "five", "Five", "Smith")).await?;
    store.upsert_user(&user(9, "nine", "Nine", "Jones")).await?;
    store.upsert_user(&user(11, "eleven", "", "")).await?;
    Ok(Arc::new(ChatState::new(
        test_config(),
        store,
        Arc::new(HmacVerifier::new(SECRET)),
        Arc::new(LocalBus::new()),
        CancellationToken::new(),
    )))
}

fn test_server(state: Arc<ChatState>) -> anyhow::Result<TestServer> {
    TestServer::new(build_router(state)).map_err(|e| anyhow::anyhow!("test server: {e}"))
}

fn token(user: i64) -> String {
    HmacVerifier::new(SECRET).sign(user)
}

#[tokio::test]
async fn health_is_open_and_counts_online_users() -> anyhow::Result<()> {
    let state = test_state().await?;
    state.presence.connect(5, uuid::Uuid::new_v4()).await?;
    state.presence.connect(5, uuid::Uuid::new_v4()).await?;
    state.presence.connect(9, uuid::Uuid::new_v4()).await?;

    let server = test_server(state)?;
    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["online_users"], 2);
    Ok(())
}

#[tokio::test]
async fn api_rejects_missing_and_forged_tokens() -> anyhow::Result<()> {
    let server = test_server(test_state().await?)?;

    let resp = server.get("/api/v1/chat/recent").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let forged = HmacVerifier::new("other-secret").sign(5);
    let resp = server.get("/api/v1/chat/recent").authorization_bearer(forged).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    // Valid signature for a user the store does not know.
    let resp = server.get("/api/v1/chat/recent").authorization_bearer(token(404)).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn history_for_unknown_counterpart_is_404() -> anyhow::Result<()> {
    let server = test_server(test_state().await?)?;
    let resp = server.get("/api/v1/chat/77/messages").authorization_bearer(token(5)).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn history_without_room_is_empty() -> anyhow::Result<()> {
    let state = test_state().await?;
    let server = test_server(Arc::clone(&state))?;

    let resp = server.get("/api/v1/chat/9/messages").authorization_bearer(token(5)).await;
    resp.assert_status_ok();
    let list: Vec<serde_json::Value> = resp.json();
    assert!(list.is_empty());

    // Reading history never creates a room.
    let pair = huddle::model::RoomPair::new(5, 9).ok_or_else(|| anyhow::anyhow!("pair"))?;
    assert!(state.store.rooms().find(pair).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn history_lists_messages_oldest_first() -> anyhow::Result<()> {
    let state = test_state().await?;
    let room = state.store.rooms().resolve(5, 9).await?;
    state.store.messages().append(&room, 5, "hi").await?;
    state.store.messages().append(&room, 9, "hello").await?;

    let server = test_server(state)?;
    let resp = server.get("/api/v1/chat/5/messages").authorization_bearer(token(9)).await;
    resp.assert_status_ok();

    let list: Vec<serde_json::Value> = resp.json();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["content"], "hi");
    assert_eq!(list[0]["sender_id"], 5);
    assert_eq!(list[0]["sender_username"], "five");
    assert_eq!(list[0]["is_seen"], false);
    assert_eq!(list[1]["content"], "hello");
    assert_eq!(list[1]["sender_username"], "nine");
    Ok(())
}

#[tokio::test]
async fn recent_chats_sorted_newest_first_with_unseen_counts() -> anyhow::Result<()> {
    let state = test_state().await?;
    let log = state.store.messages();

    let with_nine = state.store.rooms().resolve(5, 9).await?;
    log.append(&with_nine, 9, "first").await?;
    log.append(&with_nine, 9, "second").await?;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let with_eleven = state.store.rooms().resolve(11, 5).await?;
    log.append(&with_eleven, 5, "latest").await?;

    let server = test_server(state)?;
    let resp = server.get("/api/v1/chat/recent").authorization_bearer(token(5)).await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    let chats = body["chats"].as_array().ok_or_else(|| anyhow::anyhow!("chats not an array"))?;
    assert_eq!(chats.len(), 2);

    assert_eq!(chats[0]["user_id"], 11);
    assert_eq!(chats[0]["name"], "eleven");
    assert_eq!(chats[0]["last_message"]["content"], "latest");
    // Own messages never count as unseen.
    assert_eq!(chats[0]["unseen_count"], 0);

    assert_eq!(chats[1]["user_id"], 9);
    assert_eq!(chats[1]["name"], "Nine Jones");
    assert_eq!(chats[1]["last_message"]["content"], "second");
    assert_eq!(chats[1]["unseen_count"], 2);

    assert_eq!(body["total_unseen_messages"], 2);
    Ok(())
}

#[tokio::test]
async fn recent_chats_room_without_messages_has_empty_last_message() -> anyhow::Result<()> {
    let state = test_state().await?;
    state.store.rooms().resolve(5, 9).await?;

    let server = test_server(state)?;
    let resp = server.get("/api/v1/chat/recent").authorization_bearer(token(9)).await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["chats"][0]["user_id"], 5);
    assert_eq!(body["chats"][0]["last_message"]["content"], "");
    assert_eq!(body["chats"][0]["last_message"]["timestamp"], "");
    assert_eq!(body["total_unseen_messages"], 0);
    Ok(())
}

#[tokio::test]
async fn mark_seen_flips_counterpart_messages_once() -> anyhow::Result<()> {
    let state = test_state().await?;
    let room = state.store.rooms().resolve(5, 9).await?;
    state.store.messages().append(&room, 5, "a").await?;
    state.store.messages().append(&room, 5, "b").await?;
    state.store.messages().append(&room, 9, "mine").await?;

    let server = test_server(Arc::clone(&state))?;
    let resp = server.post("/api/v1/chat/5/mark-seen").authorization_bearer(token(9)).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Messages marked as seen");
    assert_eq!(body["updated"], 2);

    let again = server.post("/api/v1/chat/5/mark-seen").authorization_bearer(token(9)).await;
    again.assert_status_ok();
    let body: serde_json::Value = again.json();
    assert_eq!(body["updated"], 0);

    // Nine's own message stays unseen for five.
    assert_eq!(state.store.messages().unseen_count(&room, 9).await?, 1);
    Ok(())
}

#[tokio::test]
async fn mark_seen_without_room_is_404() -> anyhow::Result<()> {
    let server = test_server(test_state().await?)?;

    let resp = server.post("/api/v1/chat/9/mark-seen").authorization_bearer(token(5)).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "ROOM_NOT_FOUND");

    let resp = server.post("/api/v1/chat/404/mark-seen").authorization_bearer(token(5)).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn internal_user_upsert_requires_the_service_token() -> anyhow::Result<()> {
    let state = test_state().await?;
    let server = test_server(Arc::clone(&state))?;
    let profile = serde_json::json!({"username": "fortytwo", "first_name": "Forty", "last_name": "Two"});

    let resp = server.put("/api/v1/internal/users/42").json(&profile).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let resp = server.put("/api/v1/internal/users/42").authorization_bearer("svc-tok").json(&profile).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    // A user token is not a service token.
    let resp = server.put("/api/v1/internal/users/42").authorization_bearer(token(5)).json(&profile).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert!(state.store.get_user(42).await?.is_none());

    let resp = server.put("/api/v1/internal/users/42").authorization_bearer(SERVICE_TOKEN).json(&profile).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["id"], 42);
    assert_eq!(body["username"], "fortytwo");

    // The mirrored user can now authenticate.
    let resp = server.get("/api/v1/chat/recent").authorization_bearer(token(42)).await;
    resp.assert_status_ok();

    let rename = serde_json::json!({"username": "answer"});
    let resp = server.put("/api/v1/internal/users/42").authorization_bearer(SERVICE_TOKEN).json(&rename).await;
    resp.assert_status_ok();
    let stored = state.store.get_user(42).await?.ok_or_else(|| anyhow::anyhow!("user 42 missing"))?;
    assert_eq!(stored.username, "answer");
    assert_eq!(stored.display_name(), "answer");
    Ok(())
}

#[tokio::test]
async fn internal_user_upsert_rejects_empty_username() -> anyhow::Result<()> {
    let server = test_server(test_state().await?)?;
    let resp = server
        .put("/api/v1/internal/users/42")
        .authorization_bearer(SERVICE_TOKEN)
        .json(&serde_json::json!({"username": "  "}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn internal_routes_are_closed_without_a_configured_token() -> anyhow::Result<()> {
    let mut config = test_config();
    config.service_token = None;
    let state = Arc::new(ChatState::new(
        config,
        Store::in_memory().await?,
        Arc::new(HmacVerifier::new(SECRET)),
        Arc::new(LocalBus::new()),
        CancellationToken::new(),
    ));
    let server = test_server(state)?;
    let resp = server
        .put("/api/v1/internal/users/42")
        .authorization_bearer(SERVICE_TOKEN)
        .json(&serde_json::json!({"username": "fortytwo"}))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn follow_hook_notifies_the_followed_user() -> anyhow::Result<()> {
    let state = test_state().await?;
    let (tx, mut rx) = state.mailbox();
    state.bus.join(&Group::notifications(9), uuid::Uuid::new_v4(), tx).await;

    let server = test_server(Arc::clone(&state))?;
    let resp = server.post("/api/v1/notify/follow/9").authorization_bearer(token(5)).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Follow notification sent");

    assert_eq!(
        rx.try_recv()?,
        BusEvent::FollowNotification { from_user_id: 5, from_name: "Five Smith".into() }
    );
    Ok(())
}

#[tokio::test]
async fn follow_hook_rejects_unknown_and_self_targets() -> anyhow::Result<()> {
    let server = test_server(test_state().await?)?;

    let resp = server.post("/api/v1/notify/follow/404").authorization_bearer(token(5)).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");

    let resp = server.post("/api/v1/notify/follow/5").authorization_bearer(token(5)).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server.post("/api/v1/notify/follow/9").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}
