use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::domains::catalog::models::Frequency;
use crate::domains::pickups::error::PickupError;
use crate::domains::pickups::scheduling::calculate_next_pickup_date;

/// Branch-line lifecycle. Each line inside a pickup owns its status
/// independently of its siblings; the pickup-level status is a convenience
/// summary, never the source of truth for line progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    PendingInitialPickup,
    PendingBranchApproval,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::PendingInitialPickup => "pending_initial_pickup",
            PickupStatus::PendingBranchApproval => "pending_branch_approval",
            PickupStatus::Scheduled => "scheduled",
            PickupStatus::InProgress => "in_progress",
            PickupStatus::Completed => "completed",
            PickupStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states are retained for history and rebooking; everything
    /// else counts as active for the matchmaking exclusion set.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PickupStatus::Completed | PickupStatus::Cancelled)
    }
}

impl FromStr for PickupStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_initial_pickup" => Ok(PickupStatus::PendingInitialPickup),
            "pending_branch_approval" => Ok(PickupStatus::PendingBranchApproval),
            "scheduled" => Ok(PickupStatus::Scheduled),
            "in_progress" => Ok(PickupStatus::InProgress),
            "completed" => Ok(PickupStatus::Completed),
            "cancelled" => Ok(PickupStatus::Cancelled),
            other => anyhow::bail!("unknown pickup status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupType {
    OneTime,
    Recurring,
}

impl PickupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupType::OneTime => "one_time",
            PickupType::Recurring => "recurring",
        }
    }
}

impl FromStr for PickupType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(PickupType::OneTime),
            "recurring" => Ok(PickupType::Recurring),
            other => anyhow::bail!("unknown pickup type: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringStatus {
    Active,
    Paused,
}

/// How the single aggregate completion weight is turned into per-branch
/// stock decrements.
///
/// `Undivided` replays the legacy behavior: every selected branch is
/// decremented by the full weight, which does not conserve mass across a
/// bundle. `Prorated` divides the weight across selected lines pro-rata
/// by estimated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    Undivided,
    Prorated,
}

impl FromStr for WeightMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undivided" => Ok(WeightMode::Undivided),
            "prorated" => Ok(WeightMode::Prorated),
            other => anyhow::bail!("unknown completion weight mode: {other}"),
        }
    }
}

/// The proposed collection window. Times are zero-padded 24-hour "HH:MM"
/// strings on the Riyadh wall clock, matching the stored document shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

impl TimeSlot {
    pub fn validate(&self) -> Result<(), PickupError> {
        for time in [&self.start_time, &self.end_time] {
            if NaiveTime::parse_from_str(time, "%H:%M").is_err() || time.len() != 5 {
                return Err(PickupError::InvalidTimeSlot);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchApproval {
    pub branch_approved: bool,
}

/// Pickup-level approval flags. The factory side is always approved at
/// creation because pickups are factory-initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatus {
    pub factory_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_approved: Option<bool>,
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        Self {
            factory_approved: true,
            branch_approved: None,
        }
    }
}

/// One (branch, material) entry inside a pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchLine {
    pub branch_id: Uuid,
    pub company_id: Uuid,
    pub material_type: String,
    #[serde(default)]
    pub estimated_quantity: f64,
    pub frequency: Frequency,
    pub status: PickupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_weight: Option<f64>,
    #[serde(default)]
    pub approval_status: BranchApproval,
    /// Denormalized for notifications and rebooking.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    pub status: RecurringStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pickup: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pickup: Option<NaiveDate>,
    #[serde(default)]
    pub skip_dates: Vec<NaiveDate>,
}

/// One completion event appended to the pickup history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub date: DateTime<Utc>,
    pub total_weight: f64,
    pub completed_branches: Vec<Uuid>,
}

/// Stock decrement owed to one branch material after completion.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityDecrement {
    pub branch_id: Uuid,
    pub material_type: String,
    pub amount: f64,
}

/// Result of applying a completion to the aggregate: the branch stock
/// decrements to persist and who to notify.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub decrements: Vec<QuantityDecrement>,
    pub all_completed: bool,
    pub company_ids: Vec<Uuid>,
}

/// The root scheduling aggregate: one or more branch-lines under one time
/// slot, plus recurring details when the factory asked for repetition.
///
/// Never hard-deleted; completed and cancelled pickups stay around for
/// history and rebooking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pickup {
    pub id: Uuid,
    pub factory_id: Uuid,
    pub pickup_type: PickupType,
    pub status: PickupStatus,
    pub time_slot: Option<TimeSlot>,
    pub proposed_date: Option<NaiveDate>,
    pub branches: Vec<BranchLine>,
    pub approval_status: ApprovalStatus,
    pub recurring_details: Option<RecurringDetails>,
    #[serde(default)]
    pub pickup_history: Vec<CompletionRecord>,
    pub total_actual_weight: Option<f64>,
    /// Optimistic-concurrency counter; bumped on every successful write.
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ===========================================================================
// Pure state transitions
//
// These never touch IO. Callers read the row, apply a transition and write
// it back through the optimistic-concurrency loop, so every function here
// must be safe to re-apply after a conflicting write.
// ===========================================================================

impl Pickup {
    /// Set the proposed time slot and move every branch-line to
    /// `pending_branch_approval`. Used both at creation time and for the
    /// later "set initial time" action on a pending pickup.
    pub fn apply_time_slot(&mut self, slot: TimeSlot) -> Result<(), PickupError> {
        slot.validate()?;

        self.proposed_date = Some(slot.date);
        self.time_slot = Some(slot);
        self.status = PickupStatus::PendingBranchApproval;
        self.approval_status = ApprovalStatus {
            factory_approved: true,
            branch_approved: Some(false),
        };
        for line in &mut self.branches {
            line.status = PickupStatus::PendingBranchApproval;
        }
        Ok(())
    }

    /// Record the branch's decision on its own line: approval schedules the
    /// line, rejection cancels it. Returns a copy of the updated line.
    pub fn apply_approval(
        &mut self,
        branch_id: Uuid,
        approved: bool,
    ) -> Result<BranchLine, PickupError> {
        let line = self
            .branches
            .iter_mut()
            .find(|line| line.branch_id == branch_id)
            .ok_or(PickupError::BranchNotFound)?;

        line.status = if approved {
            PickupStatus::Scheduled
        } else {
            PickupStatus::Cancelled
        };
        line.approval_status.branch_approved = approved;

        Ok(line.clone())
    }

    /// Flip `scheduled` lines to `in_progress` when the Riyadh clock enters
    /// the slot. Only lines still `scheduled` move, which makes re-running
    /// the sweep for the same minute a no-op. Returns the number of lines
    /// that changed.
    pub fn sweep_due_lines(&mut self, today: NaiveDate, minute: &str) -> usize {
        let due = match &self.time_slot {
            Some(slot) => slot.date == today && slot.start_time == minute,
            None => false,
        };
        if !due {
            return 0;
        }

        let mut changed = 0;
        for line in &mut self.branches {
            if line.status == PickupStatus::Scheduled {
                line.status = PickupStatus::InProgress;
                changed += 1;
            }
        }
        changed
    }

    /// Complete the selected subset of branch-lines.
    ///
    /// Unselected lines keep their prior status; the pickup only becomes
    /// `completed` once every line is. One aggregate weight is recorded and
    /// converted to per-branch decrements according to `mode`.
    pub fn apply_completion(
        &mut self,
        selected_branch_ids: &[Uuid],
        total_weight: f64,
        mode: WeightMode,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, PickupError> {
        if !(total_weight > 0.0) {
            return Err(PickupError::InvalidWeight);
        }
        if selected_branch_ids.is_empty() {
            return Err(PickupError::NoBranchesSelected);
        }

        let selected: HashSet<Uuid> = selected_branch_ids.iter().copied().collect();
        let matched: Vec<usize> = self
            .branches
            .iter()
            .enumerate()
            .filter(|(_, line)| selected.contains(&line.branch_id))
            .map(|(idx, _)| idx)
            .collect();
        if matched.is_empty() {
            return Err(PickupError::BranchNotFound);
        }

        let shares = completion_shares(total_weight, mode, &matched, &self.branches);

        let mut decrements = Vec::with_capacity(matched.len());
        let mut completed_ids = Vec::with_capacity(matched.len());
        let mut company_ids = Vec::new();
        for (&idx, &share) in matched.iter().zip(shares.iter()) {
            let line = &mut self.branches[idx];
            line.status = PickupStatus::Completed;
            if mode == WeightMode::Prorated {
                line.actual_weight = Some(share);
            }
            decrements.push(QuantityDecrement {
                branch_id: line.branch_id,
                material_type: line.material_type.clone(),
                amount: share,
            });
            completed_ids.push(line.branch_id);
            if !company_ids.contains(&line.company_id) {
                company_ids.push(line.company_id);
            }
        }

        let all_completed = self
            .branches
            .iter()
            .all(|line| line.status == PickupStatus::Completed);
        self.status = if all_completed {
            PickupStatus::Completed
        } else {
            PickupStatus::InProgress
        };
        self.completed_at = Some(now);
        self.total_actual_weight = Some(total_weight);
        self.pickup_history.push(CompletionRecord {
            date: now,
            total_weight,
            completed_branches: completed_ids,
        });

        if self.pickup_type == PickupType::Recurring {
            if let Some(details) = &mut self.recurring_details {
                let next = calculate_next_pickup_date(
                    now.date_naive(),
                    details.frequency,
                    details.day_of_week,
                    &details.skip_dates,
                );
                details.last_pickup = Some(now);
                details.next_pickup = Some(next);
            }
        }

        Ok(CompletionOutcome {
            decrements,
            all_completed,
            company_ids,
        })
    }

    /// Pause or resume a recurring pickup.
    pub fn apply_recurring_status(&mut self, status: RecurringStatus) -> Result<(), PickupError> {
        let details = self
            .recurring_details
            .as_mut()
            .ok_or(PickupError::PickupNotFound)?;
        details.status = status;
        Ok(())
    }

    /// Clone a completed pickup into a fresh one-time booking: same branch
    /// and material identity, lifecycle reset to the very beginning, and
    /// quantities re-seeded from the original estimates rather than the
    /// decremented stock.
    pub fn rebook(&self) -> Pickup {
        let branches = self
            .branches
            .iter()
            .map(|line| BranchLine {
                branch_id: line.branch_id,
                company_id: line.company_id,
                material_type: line.material_type.clone(),
                estimated_quantity: line.estimated_quantity,
                frequency: Frequency::OneTime,
                status: PickupStatus::PendingInitialPickup,
                actual_weight: None,
                approval_status: BranchApproval::default(),
                name: line.name.clone(),
                company_name: line.company_name.clone(),
            })
            .collect();

        Pickup {
            id: Uuid::new_v4(),
            factory_id: self.factory_id,
            pickup_type: PickupType::OneTime,
            status: PickupStatus::PendingInitialPickup,
            time_slot: None,
            proposed_date: None,
            branches,
            approval_status: ApprovalStatus::default(),
            recurring_details: None,
            pickup_history: Vec::new(),
            total_actual_weight: Some(0.0),
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Per-line weight shares for a completion.
fn completion_shares(
    total_weight: f64,
    mode: WeightMode,
    matched: &[usize],
    lines: &[BranchLine],
) -> Vec<f64> {
    match mode {
        WeightMode::Undivided => vec![total_weight; matched.len()],
        WeightMode::Prorated => {
            let estimates: Vec<f64> = matched
                .iter()
                .map(|&idx| lines[idx].estimated_quantity.max(0.0))
                .collect();
            let sum: f64 = estimates.iter().sum();
            if sum > 0.0 {
                estimates.iter().map(|e| total_weight * e / sum).collect()
            } else {
                // No usable estimates: split evenly.
                vec![total_weight / matched.len() as f64; matched.len()]
            }
        }
    }
}

// ===========================================================================
// Persistence
// ===========================================================================

#[derive(sqlx::FromRow)]
struct PickupRow {
    id: Uuid,
    factory_id: Uuid,
    pickup_type: String,
    status: String,
    time_slot: Option<serde_json::Value>,
    proposed_date: Option<NaiveDate>,
    branches: serde_json::Value,
    approval_status: serde_json::Value,
    recurring_details: Option<serde_json::Value>,
    pickup_history: serde_json::Value,
    total_actual_weight: Option<f64>,
    version: i64,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PickupRow> for Pickup {
    type Error = anyhow::Error;

    fn try_from(row: PickupRow) -> anyhow::Result<Self> {
        Ok(Pickup {
            id: row.id,
            factory_id: row.factory_id,
            pickup_type: row.pickup_type.parse()?,
            status: row.status.parse()?,
            time_slot: row
                .time_slot
                .map(serde_json::from_value)
                .transpose()
                .context("invalid time slot")?,
            proposed_date: row.proposed_date,
            branches: serde_json::from_value(row.branches).context("invalid branch lines")?,
            approval_status: serde_json::from_value(row.approval_status)
                .context("invalid approval status")?,
            recurring_details: row
                .recurring_details
                .map(serde_json::from_value)
                .transpose()
                .context("invalid recurring details")?,
            pickup_history: serde_json::from_value(row.pickup_history)
                .context("invalid pickup history")?,
            total_actual_weight: row.total_actual_weight,
            version: row.version,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

impl Pickup {
    pub async fn insert(&self, pool: &PgPool) -> Result<(), PickupError> {
        sqlx::query(
            "INSERT INTO pickups (id, factory_id, pickup_type, status, time_slot, proposed_date,
                                  branches, approval_status, recurring_details, pickup_history,
                                  total_actual_weight, version, created_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(self.id)
        .bind(self.factory_id)
        .bind(self.pickup_type.as_str())
        .bind(self.status.as_str())
        .bind(
            self.time_slot
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(anyhow::Error::from)?,
        )
        .bind(self.proposed_date)
        .bind(serde_json::to_value(&self.branches).map_err(anyhow::Error::from)?)
        .bind(serde_json::to_value(&self.approval_status).map_err(anyhow::Error::from)?)
        .bind(
            self.recurring_details
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(anyhow::Error::from)?,
        )
        .bind(serde_json::to_value(&self.pickup_history).map_err(anyhow::Error::from)?)
        .bind(self.total_actual_weight)
        .bind(self.version)
        .bind(self.created_at)
        .bind(self.completed_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pickup>, PickupError> {
        let row = sqlx::query_as::<_, PickupRow>("SELECT * FROM pickups WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Pickup::try_from).transpose()?)
    }

    pub async fn find_by_factory(
        pool: &PgPool,
        factory_id: Uuid,
    ) -> Result<Vec<Pickup>, PickupError> {
        let rows = sqlx::query_as::<_, PickupRow>(
            "SELECT * FROM pickups WHERE factory_id = $1 ORDER BY created_at DESC",
        )
        .bind(factory_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(Pickup::try_from)
            .collect::<anyhow::Result<_>>()?)
    }

    /// Branch ids referenced by any pickup whose status marks it as holding
    /// material: the matchmaking exclusion set.
    pub async fn active_branch_ids(pool: &PgPool) -> Result<HashSet<Uuid>, PickupError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT (line ->> 'branchId')::uuid
             FROM pickups, jsonb_array_elements(branches) AS line
             WHERE status IN ('pending_initial_pickup', 'scheduled')",
        )
        .fetch_all(pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// Pickups whose slot falls on the given local date, for the sweep.
    pub async fn find_by_slot_date(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<Vec<Pickup>, PickupError> {
        let rows = sqlx::query_as::<_, PickupRow>(
            "SELECT * FROM pickups WHERE time_slot ->> 'date' = $1",
        )
        .bind(date.to_string())
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(Pickup::try_from)
            .collect::<anyhow::Result<_>>()?)
    }

    /// Whether the factory has at least one completed pickup involving any
    /// branch of the given company. Backs the recurring precondition.
    pub async fn has_completed_pickup(
        pool: &PgPool,
        factory_id: Uuid,
        company_id: Uuid,
    ) -> Result<bool, PickupError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1
                 FROM pickups, jsonb_array_elements(branches) AS line
                 WHERE factory_id = $1
                   AND status = 'completed'
                   AND (line ->> 'companyId')::uuid = $2
             )",
        )
        .bind(factory_id)
        .bind(company_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Compare-and-swap write of the whole document. Returns false when
    /// another writer got there first and the caller must re-read.
    pub async fn update_with_version(&self, pool: &PgPool) -> Result<bool, PickupError> {
        let updated = sqlx::query(
            "UPDATE pickups
             SET status = $2, time_slot = $3, proposed_date = $4, branches = $5,
                 approval_status = $6, recurring_details = $7, pickup_history = $8,
                 total_actual_weight = $9, completed_at = $10, version = version + 1
             WHERE id = $1 AND version = $11",
        )
        .bind(self.id)
        .bind(self.status.as_str())
        .bind(
            self.time_slot
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(anyhow::Error::from)?,
        )
        .bind(self.proposed_date)
        .bind(serde_json::to_value(&self.branches).map_err(anyhow::Error::from)?)
        .bind(serde_json::to_value(&self.approval_status).map_err(anyhow::Error::from)?)
        .bind(
            self.recurring_details
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(anyhow::Error::from)?,
        )
        .bind(serde_json::to_value(&self.pickup_history).map_err(anyhow::Error::from)?)
        .bind(self.total_actual_weight)
        .bind(self.completed_at)
        .bind(self.version)
        .execute(pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(branch_id: Uuid, company_id: Uuid, quantity: f64) -> BranchLine {
        BranchLine {
            branch_id,
            company_id,
            material_type: "plastic".to_string(),
            estimated_quantity: quantity,
            frequency: Frequency::OneTime,
            status: PickupStatus::PendingInitialPickup,
            actual_weight: None,
            approval_status: BranchApproval::default(),
            name: "Branch".to_string(),
            company_name: "Company".to_string(),
        }
    }

    fn pickup_with_lines(lines: Vec<BranchLine>) -> Pickup {
        Pickup {
            id: Uuid::new_v4(),
            factory_id: Uuid::new_v4(),
            pickup_type: PickupType::OneTime,
            status: PickupStatus::PendingInitialPickup,
            time_slot: None,
            proposed_date: None,
            branches: lines,
            approval_status: ApprovalStatus::default(),
            recurring_details: None,
            pickup_history: Vec::new(),
            total_actual_weight: None,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn slot(date: (i32, u32, u32), start: &str, end: &str) -> TimeSlot {
        TimeSlot {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn test_time_slot_moves_all_lines_to_pending_branch_approval() {
        let mut pickup = pickup_with_lines(vec![
            line(Uuid::new_v4(), Uuid::new_v4(), 10.0),
            line(Uuid::new_v4(), Uuid::new_v4(), 20.0),
        ]);

        pickup
            .apply_time_slot(slot((2024, 4, 2), "09:00", "11:00"))
            .unwrap();

        assert_eq!(pickup.status, PickupStatus::PendingBranchApproval);
        assert!(pickup
            .branches
            .iter()
            .all(|l| l.status == PickupStatus::PendingBranchApproval));
        assert_eq!(
            pickup.proposed_date,
            NaiveDate::from_ymd_opt(2024, 4, 2)
        );
    }

    #[test]
    fn test_malformed_time_slot_is_rejected() {
        let mut pickup = pickup_with_lines(vec![line(Uuid::new_v4(), Uuid::new_v4(), 10.0)]);
        let result = pickup.apply_time_slot(slot((2024, 4, 2), "9am", "11:00"));
        assert!(matches!(result, Err(PickupError::InvalidTimeSlot)));
        assert!(pickup.time_slot.is_none());
    }

    #[test]
    fn test_approval_schedules_only_the_approving_branch() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut pickup =
            pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0), line(b, Uuid::new_v4(), 5.0)]);
        pickup
            .apply_time_slot(slot((2024, 4, 2), "09:00", "11:00"))
            .unwrap();

        let updated = pickup.apply_approval(a, true).unwrap();

        assert_eq!(updated.status, PickupStatus::Scheduled);
        assert!(updated.approval_status.branch_approved);
        assert_eq!(
            pickup.branches[1].status,
            PickupStatus::PendingBranchApproval
        );
    }

    #[test]
    fn test_rejection_cancels_the_line() {
        let a = Uuid::new_v4();
        let mut pickup = pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0)]);

        let updated = pickup.apply_approval(a, false).unwrap();

        assert_eq!(updated.status, PickupStatus::Cancelled);
        assert!(!updated.approval_status.branch_approved);
    }

    #[test]
    fn test_approval_for_unknown_branch_fails() {
        let mut pickup = pickup_with_lines(vec![line(Uuid::new_v4(), Uuid::new_v4(), 10.0)]);
        let result = pickup.apply_approval(Uuid::new_v4(), true);
        assert!(matches!(result, Err(PickupError::BranchNotFound)));
    }

    #[test]
    fn test_sweep_flips_scheduled_lines_in_the_matching_minute() {
        let mut pickup = pickup_with_lines(vec![
            line(Uuid::new_v4(), Uuid::new_v4(), 10.0),
            line(Uuid::new_v4(), Uuid::new_v4(), 5.0),
        ]);
        pickup
            .apply_time_slot(slot((2024, 4, 2), "09:00", "11:00"))
            .unwrap();
        pickup.branches[0].status = PickupStatus::Scheduled;

        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let changed = pickup.sweep_due_lines(today, "09:00");

        assert_eq!(changed, 1);
        assert_eq!(pickup.branches[0].status, PickupStatus::InProgress);
        // The unapproved line is untouched.
        assert_eq!(
            pickup.branches[1].status,
            PickupStatus::PendingBranchApproval
        );
    }

    #[test]
    fn test_sweep_is_idempotent_within_the_same_minute() {
        let mut pickup = pickup_with_lines(vec![line(Uuid::new_v4(), Uuid::new_v4(), 10.0)]);
        pickup
            .apply_time_slot(slot((2024, 4, 2), "09:00", "11:00"))
            .unwrap();
        pickup.branches[0].status = PickupStatus::Scheduled;

        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        assert_eq!(pickup.sweep_due_lines(today, "09:00"), 1);
        let snapshot = pickup.branches.clone();

        // Second invocation in the same minute changes nothing.
        assert_eq!(pickup.sweep_due_lines(today, "09:00"), 0);
        assert_eq!(pickup.branches, snapshot);
    }

    #[test]
    fn test_sweep_reapplied_after_concurrent_approval_loses_nothing() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut stale = pickup_with_lines(vec![
            line(a, Uuid::new_v4(), 10.0),
            line(b, Uuid::new_v4(), 5.0),
        ]);
        stale
            .apply_time_slot(slot((2024, 4, 2), "09:00", "11:00"))
            .unwrap();
        stale.apply_approval(a, true).unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        assert_eq!(stale.sweep_due_lines(today, "09:00"), 1);

        // A second branch approves between the sweep's read and its write,
        // so the sweep's version check fails and it re-reads. Re-applying
        // the transition on the fresh state moves both due lines.
        let mut fresh = stale.clone();
        fresh.branches[0].status = PickupStatus::Scheduled;
        fresh.apply_approval(b, true).unwrap();

        assert_eq!(fresh.sweep_due_lines(today, "09:00"), 2);
        assert!(fresh
            .branches
            .iter()
            .all(|l| l.status == PickupStatus::InProgress));
    }

    #[test]
    fn test_sweep_ignores_other_dates_and_minutes() {
        let mut pickup = pickup_with_lines(vec![line(Uuid::new_v4(), Uuid::new_v4(), 10.0)]);
        pickup
            .apply_time_slot(slot((2024, 4, 2), "09:00", "11:00"))
            .unwrap();
        pickup.branches[0].status = PickupStatus::Scheduled;

        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 4, 3).unwrap();
        assert_eq!(pickup.sweep_due_lines(today, "09:01"), 0);
        assert_eq!(pickup.sweep_due_lines(tomorrow, "09:00"), 0);
        assert_eq!(pickup.branches[0].status, PickupStatus::Scheduled);
    }

    #[test]
    fn test_partial_completion_keeps_pickup_in_progress() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let company = Uuid::new_v4();
        let mut pickup = pickup_with_lines(vec![
            line(a, company, 10.0),
            line(b, company, 20.0),
            line(c, company, 30.0),
        ]);
        for l in &mut pickup.branches {
            l.status = PickupStatus::InProgress;
        }

        let outcome = pickup
            .apply_completion(&[a, b], 40.0, WeightMode::Undivided, Utc::now())
            .unwrap();

        assert!(!outcome.all_completed);
        assert_eq!(pickup.status, PickupStatus::InProgress);
        assert_eq!(pickup.branches[0].status, PickupStatus::Completed);
        assert_eq!(pickup.branches[1].status, PickupStatus::Completed);
        // The excluded line keeps its prior status.
        assert_eq!(pickup.branches[2].status, PickupStatus::InProgress);
    }

    #[test]
    fn test_full_completion_completes_the_pickup() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut pickup =
            pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0), line(b, Uuid::new_v4(), 20.0)]);

        let outcome = pickup
            .apply_completion(&[a, b], 25.0, WeightMode::Undivided, Utc::now())
            .unwrap();

        assert!(outcome.all_completed);
        assert_eq!(pickup.status, PickupStatus::Completed);
        assert_eq!(pickup.total_actual_weight, Some(25.0));
        assert_eq!(pickup.pickup_history.len(), 1);
        assert_eq!(pickup.pickup_history[0].completed_branches, vec![a, b]);
    }

    #[test]
    fn test_undivided_mode_applies_full_weight_to_every_branch() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut pickup =
            pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0), line(b, Uuid::new_v4(), 30.0)]);

        let outcome = pickup
            .apply_completion(&[a, b], 40.0, WeightMode::Undivided, Utc::now())
            .unwrap();

        assert!(outcome.decrements.iter().all(|d| d.amount == 40.0));
    }

    #[test]
    fn test_prorated_mode_divides_weight_by_estimate() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut pickup =
            pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0), line(b, Uuid::new_v4(), 30.0)]);

        let outcome = pickup
            .apply_completion(&[a, b], 40.0, WeightMode::Prorated, Utc::now())
            .unwrap();

        assert_eq!(outcome.decrements[0].amount, 10.0);
        assert_eq!(outcome.decrements[1].amount, 30.0);
        let total: f64 = outcome.decrements.iter().map(|d| d.amount).sum();
        assert_eq!(total, 40.0);
    }

    #[test]
    fn test_prorated_mode_splits_evenly_without_estimates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut pickup =
            pickup_with_lines(vec![line(a, Uuid::new_v4(), 0.0), line(b, Uuid::new_v4(), 0.0)]);

        let outcome = pickup
            .apply_completion(&[a, b], 10.0, WeightMode::Prorated, Utc::now())
            .unwrap();

        assert_eq!(outcome.decrements[0].amount, 5.0);
        assert_eq!(outcome.decrements[1].amount, 5.0);
    }

    #[test]
    fn test_completion_rejects_bad_input() {
        let a = Uuid::new_v4();
        let mut pickup = pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0)]);

        assert!(matches!(
            pickup.apply_completion(&[a], 0.0, WeightMode::Undivided, Utc::now()),
            Err(PickupError::InvalidWeight)
        ));
        assert!(matches!(
            pickup.apply_completion(&[], 5.0, WeightMode::Undivided, Utc::now()),
            Err(PickupError::NoBranchesSelected)
        ));
        assert!(matches!(
            pickup.apply_completion(&[Uuid::new_v4()], 5.0, WeightMode::Undivided, Utc::now()),
            Err(PickupError::BranchNotFound)
        ));
    }

    #[test]
    fn test_completion_rolls_recurring_details_forward() {
        let a = Uuid::new_v4();
        let mut pickup = pickup_with_lines(vec![line(a, Uuid::new_v4(), 10.0)]);
        pickup.pickup_type = PickupType::Recurring;
        pickup.recurring_details = Some(RecurringDetails {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            frequency: Frequency::Weekly,
            day_of_week: Some(1),
            status: RecurringStatus::Active,
            last_pickup: None,
            next_pickup: None,
            skip_dates: Vec::new(),
        });

        let now = DateTime::parse_from_rfc3339("2024-01-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        pickup
            .apply_completion(&[a], 12.0, WeightMode::Undivided, now)
            .unwrap();

        let details = pickup.recurring_details.as_ref().unwrap();
        assert_eq!(details.last_pickup, Some(now));
        assert_eq!(details.next_pickup, NaiveDate::from_ymd_opt(2024, 1, 8));
    }

    #[test]
    fn test_rebook_clones_identity_and_resets_lifecycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let company = Uuid::new_v4();
        let mut original = pickup_with_lines(vec![line(a, company, 10.0), line(b, company, 20.0)]);
        original
            .apply_completion(&[a, b], 30.0, WeightMode::Undivided, Utc::now())
            .unwrap();

        let rebooked = original.rebook();

        assert_ne!(rebooked.id, original.id);
        assert_eq!(rebooked.status, PickupStatus::PendingInitialPickup);
        assert_eq!(rebooked.pickup_type, PickupType::OneTime);
        assert!(rebooked.time_slot.is_none());
        assert_eq!(rebooked.branches.len(), original.branches.len());
        for (fresh, old) in rebooked.branches.iter().zip(original.branches.iter()) {
            assert_eq!(fresh.branch_id, old.branch_id);
            assert_eq!(fresh.company_id, old.company_id);
            assert_eq!(fresh.material_type, old.material_type);
            assert_eq!(fresh.estimated_quantity, old.estimated_quantity);
            assert_eq!(fresh.status, PickupStatus::PendingInitialPickup);
            assert!(fresh.actual_weight.is_none());
        }
    }

    #[test]
    fn test_branch_line_document_shape_is_camel_case() {
        let l = line(Uuid::new_v4(), Uuid::new_v4(), 10.0);
        let value = serde_json::to_value(&l).unwrap();
        assert_eq!(value["status"], "pending_initial_pickup");
        assert_eq!(value["estimatedQuantity"], 10.0);
        assert_eq!(value["approvalStatus"]["branchApproved"], false);
        assert_eq!(value["frequency"], "one_time");
    }
}
