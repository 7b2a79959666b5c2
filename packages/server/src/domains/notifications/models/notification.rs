use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::pickups::models::TimeSlot;

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A factory requested a pickup from one of the company's branches.
    NewPickupRequest,
    /// A branch approved the proposed slot; sent to the factory.
    /// Rejections are silent; the factory sees the cancelled line.
    FactoryPickupScheduled,
    /// The factory recorded a completion; sent to the factory itself.
    FactoryPickupCompleted,
    /// The factory recorded a completion; sent to the branch's company.
    PickupCompleted,
}

/// Bilingual notification copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub ar: String,
    pub en: String,
}

/// Notification body. Older feed entries carry plain strings, newer ones
/// an `{ar, en}` pair, so both shapes must round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Localized(LocalizedText),
    Text(String),
}

/// A branch mentioned inside a notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedBranch {
    pub branch_id: Uuid,
    pub branch_name: String,
    pub material_type: String,
}

/// One entry in a user's notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: Message,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<NotifiedBranch>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub clicked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

/// The per-user feed document.
pub struct NotificationFeed;

impl NotificationFeed {
    /// Append one item to the user's feed, creating the feed row on first
    /// use. The append is a single atomic statement.
    pub async fn append(pool: &PgPool, user_id: Uuid, item: &NotificationItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO notification_feeds (user_id, items, updated_at)
             VALUES ($1, jsonb_build_array($2::jsonb), now())
             ON CONFLICT (user_id) DO UPDATE
             SET items = notification_feeds.items || $2::jsonb,
                 updated_at = now()",
        )
        .bind(user_id)
        .bind(serde_json::to_value(item)?)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// The user's feed, newest first. Missing feed rows read as empty.
    pub async fn find(pool: &PgPool, user_id: Uuid) -> Result<Vec<NotificationItem>> {
        let items: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT items FROM notification_feeds WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let mut items: Vec<NotificationItem> = match items {
            Some(value) => serde_json::from_value(value).context("invalid notification feed")?,
            None => Vec::new(),
        };
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Mark a batch of items read.
    pub async fn mark_read(pool: &PgPool, user_id: Uuid, item_ids: &[Uuid]) -> Result<()> {
        Self::update_items(pool, user_id, item_ids, |item| item.read = true).await
    }

    /// Mark one item clicked (and read).
    pub async fn mark_clicked(pool: &PgPool, user_id: Uuid, item_id: Uuid) -> Result<()> {
        Self::update_items(pool, user_id, &[item_id], |item| {
            item.read = true;
            item.clicked = true;
        })
        .await
    }

    async fn update_items<F>(
        pool: &PgPool,
        user_id: Uuid,
        item_ids: &[Uuid],
        mut apply: F,
    ) -> Result<()>
    where
        F: FnMut(&mut NotificationItem),
    {
        let items: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT items FROM notification_feeds WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let Some(value) = items else {
            return Ok(());
        };
        let mut items: Vec<NotificationItem> =
            serde_json::from_value(value).context("invalid notification feed")?;

        let mut changed = false;
        for item in &mut items {
            if item_ids.contains(&item.id) {
                apply(item);
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }

        sqlx::query(
            "UPDATE notification_feeds SET items = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(serde_json::to_value(&items)?)
        .execute(pool)
        .await?;

        Ok(())
    }
}
