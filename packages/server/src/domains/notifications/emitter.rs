//! Single exit point for user-facing notifications.
//!
//! Every lifecycle event funnels through [`Notifier::emit`]: append to the
//! recipient's in-app feed, then push to their device when they opted in.
//! Delivery failures are logged and swallowed so a flaky gateway can never
//! roll back a pickup transition.

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::common::PushClient;
use crate::domains::notifications::models::{
    Message, NotificationFeed, NotificationItem, NotificationType, NotifiedBranch,
};
use crate::domains::pickups::models::TimeSlot;

/// A notification about to be emitted, before feed bookkeeping fields are
/// stamped on.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub notification_type: NotificationType,
    pub title: Message,
    pub message: Message,
    pub pickup_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub branch_name: Option<String>,
    pub time_slot: Option<TimeSlot>,
    pub branches: Vec<NotifiedBranch>,
}

impl NewNotification {
    pub fn new(notification_type: NotificationType, title: Message, message: Message) -> Self {
        Self {
            notification_type,
            title,
            message,
            pickup_id: None,
            branch_id: None,
            branch_name: None,
            time_slot: None,
            branches: Vec::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct Recipient {
    notification_token: Option<String>,
    notifications_enabled: bool,
}

/// Feed writer plus optional push fan-out.
pub struct Notifier {
    push: Option<PushClient>,
}

impl Notifier {
    pub fn new(push: Option<PushClient>) -> Self {
        Self { push }
    }

    /// Emit one notification to one user.
    ///
    /// Unknown recipients are skipped with a warning rather than treated as
    /// an error: branch users register lazily, and a pickup must not fail
    /// because its counterparty has never signed in.
    pub async fn emit(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        notification: NewNotification,
    ) -> Result<()> {
        let recipient = sqlx::query_as::<_, Recipient>(
            "SELECT notification_token, notifications_enabled FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let Some(recipient) = recipient else {
            warn!(%user_id, "Skipping notification for unknown user");
            return Ok(());
        };

        let action_url = notification
            .pickup_id
            .map(|pickup_id| format!("/dashboard/{pickup_id}"));

        let item = NotificationItem {
            id: Uuid::new_v4(),
            notification_type: notification.notification_type,
            title: notification.title,
            message: notification.message,
            pickup_id: notification.pickup_id,
            branch_id: notification.branch_id,
            branch_name: notification.branch_name,
            time_slot: notification.time_slot,
            branches: notification.branches,
            created_at: Utc::now(),
            read: false,
            clicked: false,
            action_url,
        };

        NotificationFeed::append(pool, user_id, &item).await?;
        info!(%user_id, notification_type = ?item.notification_type, "Notification added to feed");

        if !recipient.notifications_enabled {
            return Ok(());
        }
        let (Some(push), Some(token)) = (&self.push, &recipient.notification_token) else {
            return Ok(());
        };

        let title = plain_text(&item.title);
        let body = plain_text(&item.message);
        let data = serde_json::json!({
            "url": item.action_url,
            "pickupId": item.pickup_id,
        });
        if let Err(err) = push.send(token, &title, &body, data).await {
            warn!(%user_id, "Push delivery failed: {err:#}");
        }

        Ok(())
    }
}

/// English rendering for push payloads; the feed keeps both languages.
fn plain_text(message: &Message) -> String {
    match message {
        Message::Text(text) => text.clone(),
        Message::Localized(localized) => localized.en.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::notifications::models::LocalizedText;

    #[test]
    fn test_push_body_uses_english_rendering() {
        let localized = Message::Localized(LocalizedText {
            ar: "طلب جمع جديد".to_string(),
            en: "New pickup request".to_string(),
        });
        assert_eq!(plain_text(&localized), "New pickup request");
        assert_eq!(plain_text(&Message::Text("hi".to_string())), "hi");
    }

    #[test]
    fn test_action_url_derives_from_pickup_id() {
        let pickup_id = Uuid::new_v4();
        let mut n = NewNotification::new(
            NotificationType::NewPickupRequest,
            Message::Text("t".to_string()),
            Message::Text("m".to_string()),
        );
        n.pickup_id = Some(pickup_id);

        let url = n.pickup_id.map(|id| format!("/dashboard/{id}"));
        assert_eq!(url, Some(format!("/dashboard/{pickup_id}")));
    }
}
