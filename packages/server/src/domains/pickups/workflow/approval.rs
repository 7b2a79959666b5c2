use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domains::catalog::models::{Branch, MaterialPickupStatus};
use crate::domains::notifications::models::{LocalizedText, Message, NotificationType};
use crate::domains::notifications::{NewNotification, Notifier};
use crate::domains::pickups::error::PickupError;
use crate::domains::pickups::models::{BranchLine, Pickup, PickupStatus, TimeSlot};
use crate::domains::pickups::workflow::with_pickup;

/// Propose the collection window for a freshly created pickup.
///
/// Every branch-line moves to `pending_branch_approval` and the affected
/// branch materials are flagged as offered with the matching lifecycle
/// marker. The branches find the proposal in their dashboard; no
/// notification is sent at this step.
pub async fn set_initial_pickup_time(
    pool: &PgPool,
    pickup_id: Uuid,
    slot: TimeSlot,
) -> Result<Pickup, PickupError> {
    slot.validate()?;

    let (pickup, ()) =
        with_pickup(pool, pickup_id, |pickup| pickup.apply_time_slot(slot.clone())).await?;

    for line in &pickup.branches {
        Branch::set_material_offered(pool, line.branch_id, &line.material_type, true).await?;
        Branch::set_material_pickup_status(
            pool,
            line.branch_id,
            &line.material_type,
            Some(MaterialPickupStatus::PendingBranchApproval),
        )
        .await?;
    }

    info!(%pickup_id, date = %slot.date, "Pickup time slot proposed");
    Ok(pickup)
}

/// Record a branch's decision on the proposed slot and tell the factory.
pub async fn update_pickup_approval(
    pool: &PgPool,
    notifier: &Notifier,
    pickup_id: Uuid,
    branch_id: Uuid,
    approved: bool,
) -> Result<Pickup, PickupError> {
    let (pickup, line) =
        with_pickup(pool, pickup_id, |pickup| pickup.apply_approval(branch_id, approved)).await?;

    let material_status = if approved {
        MaterialPickupStatus::Scheduled
    } else {
        MaterialPickupStatus::Cancelled
    };
    Branch::set_material_pickup_status(pool, branch_id, &line.material_type, Some(material_status))
        .await?;

    if let Some(notification) = approval_notification(&pickup, &line) {
        if let Err(err) = notifier.emit(pool, pickup.factory_id, notification).await {
            warn!(%pickup_id, "Approval notification failed: {err:#}");
        }
    }

    info!(%pickup_id, %branch_id, approved, "Branch approval recorded");
    Ok(pickup)
}

/// Factory-facing notification for a branch's decision.
///
/// Only an approval produces one; a rejection cancels the line silently
/// and the factory sees it in its dashboard.
fn approval_notification(pickup: &Pickup, line: &BranchLine) -> Option<NewNotification> {
    if line.status != PickupStatus::Scheduled {
        return None;
    }

    let slot_text = pickup
        .time_slot
        .as_ref()
        .map(|slot| format!("{} {}-{}", slot.date, slot.start_time, slot.end_time))
        .unwrap_or_default();

    let mut notification = NewNotification::new(
        NotificationType::FactoryPickupScheduled,
        Message::Localized(LocalizedText {
            ar: "تمت جدولة عملية الجمع".to_string(),
            en: "Pickup scheduled".to_string(),
        }),
        Message::Localized(LocalizedText {
            ar: format!("وافق فرع {} على موعد الجمع {slot_text}", line.name),
            en: format!("{} approved the pickup for {slot_text}", line.name),
        }),
    );
    notification.pickup_id = Some(pickup.id);
    notification.branch_id = Some(line.branch_id);
    notification.branch_name = Some(line.name.clone());
    notification.time_slot = pickup.time_slot.clone();
    Some(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::pickups::models::{ApprovalStatus, BranchApproval, PickupType};
    use chrono::{NaiveDate, Utc};

    fn pickup_with_line(branch_id: Uuid) -> Pickup {
        let line = BranchLine {
            branch_id,
            company_id: Uuid::new_v4(),
            material_type: "plastic".to_string(),
            estimated_quantity: 10.0,
            frequency: crate::domains::catalog::models::Frequency::OneTime,
            status: PickupStatus::PendingBranchApproval,
            actual_weight: None,
            approval_status: BranchApproval::default(),
            name: "Olaya Branch".to_string(),
            company_name: String::new(),
        };
        Pickup {
            id: Uuid::new_v4(),
            factory_id: Uuid::new_v4(),
            pickup_type: PickupType::OneTime,
            status: PickupStatus::PendingBranchApproval,
            time_slot: Some(TimeSlot {
                date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                start_time: "09:00".to_string(),
                end_time: "11:00".to_string(),
            }),
            proposed_date: NaiveDate::from_ymd_opt(2024, 4, 2),
            branches: vec![line],
            approval_status: ApprovalStatus::default(),
            recurring_details: None,
            pickup_history: Vec::new(),
            total_actual_weight: None,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_approval_notifies_factory_with_branch_and_slot() {
        let branch_id = Uuid::new_v4();
        let mut pickup = pickup_with_line(branch_id);
        let line = pickup.apply_approval(branch_id, true).unwrap();

        let notification = approval_notification(&pickup, &line).unwrap();
        assert_eq!(
            notification.notification_type,
            NotificationType::FactoryPickupScheduled
        );
        assert_eq!(notification.branch_name.as_deref(), Some("Olaya Branch"));
        match &notification.message {
            Message::Localized(text) => {
                assert!(text.en.contains("Olaya Branch"));
                assert!(text.en.contains("2024-04-02 09:00-11:00"));
            }
            Message::Text(_) => panic!("expected localized message"),
        }
    }

    #[test]
    fn test_rejection_is_silent() {
        let branch_id = Uuid::new_v4();
        let mut pickup = pickup_with_line(branch_id);
        let line = pickup.apply_approval(branch_id, false).unwrap();

        assert_eq!(line.status, PickupStatus::Cancelled);
        assert!(approval_notification(&pickup, &line).is_none());
    }
}
