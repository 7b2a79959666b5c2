use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domains::catalog::models::{Branch, Frequency, MaterialPickupStatus};
use crate::domains::notifications::models::{
    LocalizedText, Message, NotificationType, NotifiedBranch,
};
use crate::domains::notifications::{NewNotification, Notifier};
use crate::domains::pickups::error::PickupError;
use crate::domains::pickups::models::{
    ApprovalStatus, BranchApproval, BranchLine, Pickup, PickupStatus, PickupType, RecurringDetails,
    RecurringStatus, TimeSlot,
};
use crate::domains::pickups::scheduling::calculate_next_pickup_date;

/// One branch material the factory selected for collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedMaterial {
    pub branch_id: Uuid,
    pub material_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePickupRequest {
    pub factory_id: Uuid,
    pub pickup_type: PickupType,
    pub materials: Vec<SelectedMaterial>,
    /// Required for recurring pickups; ignored for one-time.
    #[serde(default)]
    pub frequency: Option<Frequency>,
    /// First collection date for recurring pickups.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Optional proposed window. When present the pickup skips straight to
    /// `pending_branch_approval`.
    #[serde(default)]
    pub time_slot: Option<TimeSlot>,
}

/// Whether the factory already completed a pickup with any branch of the
/// company. Recurring pickups are gated on this.
pub async fn has_successful_pickup(
    pool: &PgPool,
    factory_id: Uuid,
    company_id: Uuid,
) -> Result<bool, PickupError> {
    Pickup::has_completed_pickup(pool, factory_id, company_id).await
}

/// The recurring gate: every company in the selection must already have a
/// completed pickup with the factory. One unproven company rejects the
/// whole request. One-time pickups pass unconditionally.
fn check_recurring_precondition(
    pickup_type: PickupType,
    company_ids: &[Uuid],
    proven_companies: &HashSet<Uuid>,
) -> Result<(), PickupError> {
    if pickup_type != PickupType::Recurring {
        return Ok(());
    }
    if company_ids.iter().all(|id| proven_companies.contains(id)) {
        Ok(())
    } else {
        Err(PickupError::FirstPickupRequired)
    }
}

/// Create a pickup from the factory's selection.
///
/// All preconditions are checked before the first write, so a rejected
/// request leaves no trace. The recurring gate is evaluated per company:
/// one unproven company in the selection rejects the whole request.
pub async fn create_pickup(
    pool: &PgPool,
    notifier: &Notifier,
    request: CreatePickupRequest,
) -> Result<Pickup, PickupError> {
    if request.materials.is_empty() {
        return Err(PickupError::NoMaterialsSelected);
    }

    let mut lines = Vec::with_capacity(request.materials.len());
    for selected in &request.materials {
        let branch = Branch::find_by_id(pool, selected.branch_id)
            .await?
            .ok_or(PickupError::BranchNotFound)?;
        let material = branch
            .materials
            .get(&selected.material_type)
            .ok_or(PickupError::BranchNotFound)?;

        lines.push(BranchLine {
            branch_id: branch.id,
            company_id: branch.company_id,
            material_type: material.material_type.clone(),
            estimated_quantity: material.quantity,
            frequency: request.frequency.unwrap_or(material.frequency),
            status: PickupStatus::PendingInitialPickup,
            actual_weight: None,
            approval_status: BranchApproval::default(),
            name: branch.name.clone(),
            company_name: String::new(),
        });
    }

    let mut company_ids: Vec<Uuid> = Vec::new();
    for line in &lines {
        if !company_ids.contains(&line.company_id) {
            company_ids.push(line.company_id);
        }
    }

    let mut proven_companies = HashSet::new();
    if request.pickup_type == PickupType::Recurring {
        for &company_id in &company_ids {
            if has_successful_pickup(pool, request.factory_id, company_id).await? {
                proven_companies.insert(company_id);
            }
        }
    }
    check_recurring_precondition(request.pickup_type, &company_ids, &proven_companies)?;

    let recurring_details = if request.pickup_type == PickupType::Recurring {
        let frequency = request.frequency.unwrap_or(Frequency::Weekly);
        let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
        Some(RecurringDetails {
            start_date: Some(start_date),
            frequency,
            day_of_week: Some(start_date.weekday().num_days_from_sunday()),
            status: RecurringStatus::Active,
            last_pickup: None,
            next_pickup: Some(calculate_next_pickup_date(start_date, frequency, None, &[])),
            skip_dates: Vec::new(),
        })
    } else {
        None
    };

    let mut pickup = Pickup {
        id: Uuid::new_v4(),
        factory_id: request.factory_id,
        pickup_type: request.pickup_type,
        status: PickupStatus::PendingInitialPickup,
        time_slot: None,
        proposed_date: request.start_date,
        branches: lines,
        approval_status: ApprovalStatus::default(),
        recurring_details,
        pickup_history: Vec::new(),
        total_actual_weight: Some(0.0),
        version: 0,
        created_at: Utc::now(),
        completed_at: None,
    };

    if let Some(slot) = request.time_slot.clone() {
        pickup.apply_time_slot(slot)?;
    }

    pickup.insert(pool).await?;

    // Mark every selected branch material as on a pickup. The pickup row is
    // already committed; a failure here is logged for reconciliation rather
    // than unwinding the pickup.
    if let Err(err) = attach_lines(pool, &pickup, request.start_date).await {
        warn!(pickup_id = %pickup.id, "Branch material update failed after pickup insert: {err:#}");
    }

    notify_companies(pool, notifier, &pickup, &company_ids).await;

    info!(
        pickup_id = %pickup.id,
        factory_id = %pickup.factory_id,
        pickup_type = pickup.pickup_type.as_str(),
        lines = pickup.branches.len(),
        "Pickup created"
    );
    Ok(pickup)
}

async fn attach_lines(
    pool: &PgPool,
    pickup: &Pickup,
    day: Option<NaiveDate>,
) -> Result<(), PickupError> {
    // Material lifecycle markers mirror the line status, which depends on
    // whether a slot was proposed at creation.
    let slotted = pickup.status == PickupStatus::PendingBranchApproval;
    let material_status = if slotted {
        MaterialPickupStatus::PendingBranchApproval
    } else {
        MaterialPickupStatus::PendingInitialPickup
    };

    let mut tx = pool.begin().await?;
    for line in &pickup.branches {
        Branch::attach_pickup(
            &mut *tx,
            line.branch_id,
            &line.material_type,
            line.estimated_quantity,
            pickup.id,
            day,
        )
        .await?;
        Branch::set_material_pickup_status(
            &mut *tx,
            line.branch_id,
            &line.material_type,
            Some(material_status),
        )
        .await?;
        if slotted {
            Branch::set_material_offered(&mut *tx, line.branch_id, &line.material_type, true)
                .await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

/// One new-request notification per company, listing its affected branches.
async fn notify_companies(pool: &PgPool, notifier: &Notifier, pickup: &Pickup, companies: &[Uuid]) {
    let mut by_company: BTreeMap<Uuid, Vec<NotifiedBranch>> = BTreeMap::new();
    for line in &pickup.branches {
        by_company
            .entry(line.company_id)
            .or_default()
            .push(NotifiedBranch {
                branch_id: line.branch_id,
                branch_name: line.name.clone(),
                material_type: line.material_type.clone(),
            });
    }

    for &company_id in companies {
        let branches = by_company.remove(&company_id).unwrap_or_default();
        let branch_names: Vec<&str> = branches.iter().map(|b| b.branch_name.as_str()).collect();
        let mut notification = NewNotification::new(
            NotificationType::NewPickupRequest,
            Message::Localized(LocalizedText {
                ar: "طلب جمع جديد".to_string(),
                en: "New pickup request".to_string(),
            }),
            Message::Localized(LocalizedText {
                ar: format!("طلب مصنع جمع المواد من: {}", branch_names.join("، ")),
                en: format!(
                    "A factory requested a pickup from: {}",
                    branch_names.join(", ")
                ),
            }),
        );
        notification.pickup_id = Some(pickup.id);
        notification.branches = branches;

        if let Err(err) = notifier.emit(pool, company_id, notification).await {
            warn!(%company_id, "New pickup notification failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_camel_case_payload() {
        let payload = serde_json::json!({
            "factoryId": "7a9f36cc-3d53-4f93-a8a9-1b9e6c0f25b4",
            "pickupType": "recurring",
            "frequency": "weekly",
            "startDate": "2024-04-01",
            "materials": [
                {"branchId": "53a50fd1-41e3-4b51-bb9b-93e2cbb9b2f3", "materialType": "plastic"}
            ]
        });

        let request: CreatePickupRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(request.pickup_type, PickupType::Recurring);
        assert_eq!(request.frequency, Some(Frequency::Weekly));
        assert_eq!(request.materials.len(), 1);
        assert_eq!(request.materials[0].material_type, "plastic");
    }

    #[test]
    fn test_recurring_requires_a_completed_pickup_per_company() {
        let proven = Uuid::new_v4();
        let unproven = Uuid::new_v4();
        let history: HashSet<Uuid> = [proven].into_iter().collect();

        // The gate runs before any insert, so a rejected request writes
        // nothing.
        let result =
            check_recurring_precondition(PickupType::Recurring, &[proven, unproven], &history);
        assert!(matches!(result, Err(PickupError::FirstPickupRequired)));

        assert!(
            check_recurring_precondition(PickupType::Recurring, &[proven], &history).is_ok()
        );
    }

    #[test]
    fn test_one_time_pickups_skip_the_recurring_gate() {
        let company = Uuid::new_v4();
        let result =
            check_recurring_precondition(PickupType::OneTime, &[company], &HashSet::new());
        assert!(result.is_ok());
    }

    #[test]
    fn test_day_of_week_counts_from_sunday() {
        // 2024-04-01 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert_eq!(monday.weekday().num_days_from_sunday(), 1);
    }
}
