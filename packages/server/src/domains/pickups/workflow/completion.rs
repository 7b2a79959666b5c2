use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domains::catalog::models::{Branch, MaterialPickupStatus};
use crate::domains::notifications::models::{LocalizedText, Message, NotificationType};
use crate::domains::notifications::{NewNotification, Notifier};
use crate::domains::pickups::error::PickupError;
use crate::domains::pickups::models::{
    Pickup, PickupStatus, RecurringStatus, WeightMode,
};
use crate::domains::pickups::workflow::with_pickup;

/// Record a completed collection for a subset of the pickup's branches.
///
/// The aggregate transition and the branch stock decrements are separate
/// writes: the pickup document is the source of truth, and the decrements
/// run in one transaction afterwards.
pub async fn complete_pickup(
    pool: &PgPool,
    notifier: &Notifier,
    mode: WeightMode,
    pickup_id: Uuid,
    branch_ids: &[Uuid],
    total_weight: f64,
) -> Result<Pickup, PickupError> {
    let now = Utc::now();
    let (pickup, outcome) = with_pickup(pool, pickup_id, |pickup| {
        pickup.apply_completion(branch_ids, total_weight, mode, now)
    })
    .await?;

    let mut tx = pool.begin().await?;
    for decrement in &outcome.decrements {
        Branch::adjust_material_quantity(
            &mut *tx,
            decrement.branch_id,
            &decrement.material_type,
            -decrement.amount,
        )
        .await?;
        Branch::set_material_pickup_status(
            &mut *tx,
            decrement.branch_id,
            &decrement.material_type,
            Some(MaterialPickupStatus::PickedUp),
        )
        .await?;
    }
    tx.commit().await?;

    let mut factory_note = NewNotification::new(
        NotificationType::FactoryPickupCompleted,
        Message::Localized(LocalizedText {
            ar: "اكتملت عملية الجمع".to_string(),
            en: "Pickup completed".to_string(),
        }),
        Message::Localized(LocalizedText {
            ar: format!("تم تسجيل جمع {total_weight} كجم"),
            en: format!("Recorded a collection of {total_weight} kg"),
        }),
    );
    factory_note.pickup_id = Some(pickup.id);
    if let Err(err) = notifier.emit(pool, pickup.factory_id, factory_note).await {
        warn!(%pickup_id, "Factory completion notification failed: {err:#}");
    }

    for &company_id in &outcome.company_ids {
        let mut company_note = NewNotification::new(
            NotificationType::PickupCompleted,
            Message::Localized(LocalizedText {
                ar: "اكتملت عملية الجمع".to_string(),
                en: "Pickup completed".to_string(),
            }),
            Message::Localized(LocalizedText {
                ar: "قام المصنع بجمع المواد من فروعكم".to_string(),
                en: "The factory collected materials from your branches".to_string(),
            }),
        );
        company_note.pickup_id = Some(pickup.id);
        if let Err(err) = notifier.emit(pool, company_id, company_note).await {
            warn!(%pickup_id, %company_id, "Company completion notification failed: {err:#}");
        }
    }

    info!(
        %pickup_id,
        total_weight,
        branches = outcome.decrements.len(),
        all_completed = outcome.all_completed,
        "Pickup completion recorded"
    );
    Ok(pickup)
}

/// Clone a completed pickup into a fresh one-time booking.
pub async fn rebook_pickup(pool: &PgPool, pickup_id: Uuid) -> Result<Pickup, PickupError> {
    let original = Pickup::find_by_id(pool, pickup_id)
        .await?
        .ok_or(PickupError::PickupNotFound)?;
    if original.status != PickupStatus::Completed {
        return Err(PickupError::NotCompleted);
    }

    let rebooked = original.rebook();
    rebooked.insert(pool).await?;

    let mut tx = pool.begin().await?;
    for line in &rebooked.branches {
        Branch::attach_pickup(
            &mut *tx,
            line.branch_id,
            &line.material_type,
            line.estimated_quantity,
            rebooked.id,
            None,
        )
        .await?;
        Branch::set_material_pickup_status(
            &mut *tx,
            line.branch_id,
            &line.material_type,
            Some(MaterialPickupStatus::PendingInitialPickup),
        )
        .await?;
    }
    tx.commit().await?;

    info!(original = %pickup_id, rebooked = %rebooked.id, "Pickup rebooked");
    Ok(rebooked)
}

/// Pause or resume a recurring pickup. Resuming re-offers the branch
/// materials so they show up for scheduling again.
pub async fn update_recurring_status(
    pool: &PgPool,
    pickup_id: Uuid,
    status: RecurringStatus,
) -> Result<Pickup, PickupError> {
    let (pickup, ()) =
        with_pickup(pool, pickup_id, |pickup| pickup.apply_recurring_status(status)).await?;

    if status == RecurringStatus::Active {
        for line in &pickup.branches {
            Branch::set_material_offered(pool, line.branch_id, &line.material_type, true).await?;
        }
    }

    info!(%pickup_id, status = ?status, "Recurring status updated");
    Ok(pickup)
}
