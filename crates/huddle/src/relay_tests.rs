// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::mpsc;

use super::{announce_status, notify_follow, notify_new_message};
use crate::bus::{Group, GroupBus, LocalBus};
use crate::events::{BusEvent, Presence};
use crate::model::UserIdentity;

fn five() -> UserIdentity {
    UserIdentity { id: 5, username: "five".to_owned(), first_name: "Five".to_owned(), last_name: "Smith".to_owned() }
}

#[tokio::test]
async fn new_message_goes_to_receiver_group_only() -> anyhow::Result<()> {
    let bus = LocalBus::new();
    let (nine_tx, mut nine_rx) = mpsc::channel(8);
    let (five_tx, mut five_rx) = mpsc::channel(8);
    bus.join(&Group::notifications(9), uuid::Uuid::new_v4(), nine_tx).await;
    bus.join(&Group::notifications(5), uuid::Uuid::new_v4(), five_tx).await;

    notify_new_message(&bus, 9, &five(), "hi").await?;

    assert_eq!(
        nine_rx.try_recv()?,
        BusEvent::NewMessageNotification { sender_id: 5, sender_name: "Five Smith".to_owned(), message: "hi".to_owned() }
    );
    assert!(five_rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn follow_goes_to_target_group() -> anyhow::Result<()> {
    let bus = LocalBus::new();
    let (tx, mut rx) = mpsc::channel(8);
    bus.join(&Group::notifications(9), uuid::Uuid::new_v4(), tx).await;

    notify_follow(&bus, &five(), 9).await?;

    assert_eq!(rx.try_recv()?, BusEvent::FollowNotification { from_user_id: 5, from_name: "Five Smith".to_owned() });
    Ok(())
}

#[tokio::test]
async fn status_goes_to_global_group() -> anyhow::Result<()> {
    let bus = LocalBus::new();
    let (tx, mut rx) = mpsc::channel(8);
    bus.join(&Group::user_status(), uuid::Uuid::new_v4(), tx).await;

    announce_status(&bus, 9, Presence::Offline).await?;

    assert_eq!(rx.try_recv()?, BusEvent::StatusUpdate { user_id: 9, status: Presence::Offline });
    Ok(())
}
