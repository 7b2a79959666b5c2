use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::common::GeoPoint;

/// How often a branch expects its declared material to need collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OneTime,
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OneTime => "one_time",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::BiWeekly => "bi_weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

/// Whether material is physically present at the branch right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

impl Default for Availability {
    fn default() -> Self {
        Availability::Available
    }
}

/// Lifecycle marker a material carries while it moves through a pickup.
///
/// The legacy platform overloaded one `status` key with both a boolean
/// "is offered" flag and these lifecycle strings; here the flag lives in
/// [`Material::offered`] and the lifecycle in [`Material::pickup_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialPickupStatus {
    PendingInitialPickup,
    PendingBranchApproval,
    Scheduled,
    Cancelled,
    PickedUp,
    Pending,
}

impl MaterialPickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialPickupStatus::PendingInitialPickup => "pending_initial_pickup",
            MaterialPickupStatus::PendingBranchApproval => "pending_branch_approval",
            MaterialPickupStatus::Scheduled => "scheduled",
            MaterialPickupStatus::Cancelled => "cancelled",
            MaterialPickupStatus::PickedUp => "picked_up",
            MaterialPickupStatus::Pending => "pending",
        }
    }
}

/// Pickup hints attached to a declared material: the collection day the
/// branch asked for and, once a route exists, the pickup it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<NaiveDate>,
}

impl PickupDetails {
    /// Initial hints for a freshly declared material. One-time materials
    /// carry the concrete date the branch asked for.
    pub fn for_frequency(frequency: Frequency, date: Option<NaiveDate>) -> Self {
        Self {
            frequency: Some(frequency),
            date: if frequency == Frequency::OneTime {
                date
            } else {
                None
            },
            pickup_id: None,
            day: None,
        }
    }
}

/// One declared material on a branch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(rename = "type")]
    pub material_type: String,
    pub frequency: Frequency,
    /// Remaining stock estimate in kg. Completion decrements can push this
    /// negative transiently; the daily reset and branch edits restore it.
    #[serde(default)]
    pub quantity: f64,
    /// The legacy boolean "is offered" sense: candidates for matchmaking.
    #[serde(default)]
    pub offered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_status: Option<MaterialPickupStatus>,
    #[serde(default)]
    pub material_availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_factory_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pickup_details: PickupDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pickup: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pickup: Option<DateTime<Utc>>,
}

impl Material {
    /// Daily reset applied to exhausted recurring materials.
    ///
    /// A material marked `picked_up` returns to circulation: if its
    /// `next_pickup` has elapsed it becomes `pending` and the timestamp is
    /// consumed; without a `next_pickup` it simply becomes available again.
    /// Returns whether the material changed.
    pub fn reset_after_pickup(&mut self, now: DateTime<Utc>) -> bool {
        if self.pickup_status != Some(MaterialPickupStatus::PickedUp) {
            return false;
        }

        match self.next_pickup {
            Some(next) if next <= now => {
                self.pickup_status = Some(MaterialPickupStatus::Pending);
                self.last_pickup = Some(next);
                self.next_pickup = None;
                true
            }
            Some(_) => false,
            None => {
                self.pickup_status = None;
                self.last_pickup = Some(now);
                true
            }
        }
    }
}

/// A company branch with its declared materials.
///
/// The core consumes these documents; branch registration is owned by the
/// platform UI but kept here so the catalog can be populated end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub location_address: String,
    #[serde(default)]
    pub materials: BTreeMap<String, Material>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct BranchRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    phone_number: String,
    location: serde_json::Value,
    location_address: String,
    materials: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<BranchRow> for Branch {
    type Error = anyhow::Error;

    fn try_from(row: BranchRow) -> Result<Self> {
        Ok(Branch {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            phone_number: row.phone_number,
            location: serde_json::from_value(row.location).context("invalid branch location")?,
            location_address: row.location_address,
            materials: serde_json::from_value(row.materials)
                .context("invalid branch materials")?,
            created_at: row.created_at,
        })
    }
}

impl Branch {
    /// Register a new branch with one declared material.
    pub async fn register(
        pool: &PgPool,
        company_id: Uuid,
        name: &str,
        phone_number: &str,
        location: GeoPoint,
        location_address: &str,
        material: Material,
    ) -> Result<Uuid> {
        let mut materials = BTreeMap::new();
        materials.insert(material.material_type.clone(), material);

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO branches (company_id, name, phone_number, location, location_address, materials)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(company_id)
        .bind(name)
        .bind(phone_number)
        .bind(serde_json::to_value(location)?)
        .bind(location_address)
        .bind(serde_json::to_value(&materials)?)
        .fetch_one(pool)
        .await?;

        Ok(id)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>("SELECT * FROM branches WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(Branch::try_from).transpose()
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>("SELECT * FROM branches ORDER BY created_at")
            .fetch_all(pool)
            .await?;

        rows.into_iter().map(Branch::try_from).collect()
    }

    pub async fn find_by_company(pool: &PgPool, company_id: Uuid) -> Result<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>(
            "SELECT * FROM branches WHERE company_id = $1 ORDER BY created_at",
        )
        .bind(company_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Branch::try_from).collect()
    }

    /// Add or replace a declared material. The material re-enters the
    /// catalog as offered and available.
    pub async fn declare_material(pool: &PgPool, branch_id: Uuid, material: Material) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2], $3)
             WHERE id = $1",
        )
        .bind(branch_id)
        .bind(&material.material_type)
        .bind(serde_json::to_value(&material)?)
        .execute(pool)
        .await?;

        anyhow::ensure!(updated.rows_affected() == 1, "Branch not found");
        Ok(())
    }

    /// Replace the whole materials map. Used by the daily reset, which
    /// mutates materials in memory and writes the document back wholesale.
    pub async fn update_materials(
        pool: &PgPool,
        branch_id: Uuid,
        materials: &BTreeMap<String, Material>,
    ) -> Result<()> {
        sqlx::query("UPDATE branches SET materials = $2 WHERE id = $1")
            .bind(branch_id)
            .bind(serde_json::to_value(materials)?)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn update_material_quantity(
        pool: &PgPool,
        branch_id: Uuid,
        material_type: &str,
        quantity: f64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 (materials -> $2) || jsonb_build_object('quantity', $3::double precision))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(quantity)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Decrement (or restore) remaining stock by a signed delta.
    pub async fn adjust_material_quantity<'e, E>(
        executor: E,
        branch_id: Uuid,
        material_type: &str,
        delta: f64,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 (materials -> $2) || jsonb_build_object('quantity',
                     COALESCE((materials -> $2 ->> 'quantity')::double precision, 0) + $3))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(delta)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn update_material_availability(
        pool: &PgPool,
        branch_id: Uuid,
        material_type: &str,
        available: bool,
    ) -> Result<()> {
        let availability = if available { "available" } else { "unavailable" };
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 (materials -> $2) || jsonb_build_object('materialAvailability', $3::text))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(availability)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Set or clear the lifecycle marker on one material.
    pub async fn set_material_pickup_status<'e, E>(
        executor: E,
        branch_id: Uuid,
        material_type: &str,
        status: Option<MaterialPickupStatus>,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 CASE WHEN $3::text IS NULL
                      THEN (materials -> $2) - 'pickupStatus'
                      ELSE (materials -> $2) || jsonb_build_object('pickupStatus', $3::text)
                 END)
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(status.map(|s| s.as_str()))
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Update the collection day the branch asked for.
    pub async fn set_material_pickup_day(
        pool: &PgPool,
        branch_id: Uuid,
        material_type: &str,
        day: Option<NaiveDate>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 (materials -> $2) || jsonb_build_object('pickupDetails',
                     COALESCE(materials -> $2 -> 'pickupDetails', '{}'::jsonb)
                     || jsonb_build_object('day', $3::text)))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(day.map(|d| d.to_string()))
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record a factory's tentative claim on a material before a route
    /// exists, so competing factories can see it is spoken for.
    pub async fn set_material_pending_claim(
        pool: &PgPool,
        branch_id: Uuid,
        material_type: &str,
        factory_id: Uuid,
        claimed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 (materials -> $2) || jsonb_build_object(
                     'pickupStatus', 'pending_initial_pickup',
                     'pendingFactoryId', $3::text,
                     'pendingTimestamp', $4::text))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(factory_id.to_string())
        .bind(claimed_at.to_rfc3339())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Mark the material offered again and set the "is offered" flag;
    /// pickup screens key off this when a route goes back to approval.
    pub async fn set_material_offered<'e, E>(
        executor: E,
        branch_id: Uuid,
        material_type: &str,
        offered: bool,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 (materials -> $2) || jsonb_build_object('offered', $3::boolean))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(offered)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Attach a created pickup to the branch material: clears any tentative
    /// claim, re-seeds the quantity estimate and records the pickup hints.
    pub async fn attach_pickup<'e, E>(
        executor: E,
        branch_id: Uuid,
        material_type: &str,
        quantity: f64,
        pickup_id: Uuid,
        day: Option<NaiveDate>,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE branches
             SET materials = jsonb_set(materials, ARRAY[$2],
                 ((materials -> $2) - 'pendingFactoryId' - 'pendingTimestamp')
                 || jsonb_build_object(
                     'quantity', $3::double precision,
                     'pickupDetails',
                         COALESCE(materials -> $2 -> 'pickupDetails', '{}'::jsonb)
                         || jsonb_build_object('pickupId', $4::text, 'day', $5::text)))
             WHERE id = $1 AND materials ? $2",
        )
        .bind(branch_id)
        .bind(material_type)
        .bind(quantity)
        .bind(pickup_id.to_string())
        .bind(day.map(|d| d.to_string()))
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn material(status: Option<MaterialPickupStatus>, next_pickup: Option<DateTime<Utc>>) -> Material {
        Material {
            material_type: "plastic".to_string(),
            frequency: Frequency::Weekly,
            quantity: 120.0,
            offered: true,
            pickup_status: status,
            material_availability: Availability::Available,
            pending_factory_id: None,
            pending_timestamp: None,
            pickup_details: PickupDetails::default(),
            last_pickup: None,
            next_pickup,
        }
    }

    #[test]
    fn test_reset_ignores_materials_not_picked_up() {
        let now = Utc::now();
        let mut m = material(Some(MaterialPickupStatus::Scheduled), None);
        assert!(!m.reset_after_pickup(now));
        assert_eq!(m.pickup_status, Some(MaterialPickupStatus::Scheduled));
    }

    #[test]
    fn test_reset_with_elapsed_next_pickup_becomes_pending() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        let mut m = material(Some(MaterialPickupStatus::PickedUp), Some(due));

        assert!(m.reset_after_pickup(now));
        assert_eq!(m.pickup_status, Some(MaterialPickupStatus::Pending));
        assert_eq!(m.last_pickup, Some(due));
        assert_eq!(m.next_pickup, None);
    }

    #[test]
    fn test_reset_with_future_next_pickup_is_a_no_op() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2024, 3, 12, 8, 0, 0).unwrap();
        let mut m = material(Some(MaterialPickupStatus::PickedUp), Some(due));

        assert!(!m.reset_after_pickup(now));
        assert_eq!(m.pickup_status, Some(MaterialPickupStatus::PickedUp));
        assert_eq!(m.next_pickup, Some(due));
    }

    #[test]
    fn test_reset_without_next_pickup_returns_to_available() {
        let now = Utc::now();
        let mut m = material(Some(MaterialPickupStatus::PickedUp), None);

        assert!(m.reset_after_pickup(now));
        assert_eq!(m.pickup_status, None);
        assert_eq!(m.last_pickup, Some(now));
    }

    #[test]
    fn test_material_document_shape_is_camel_case() {
        let m = material(Some(MaterialPickupStatus::PendingInitialPickup), None);
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["type"], "plastic");
        assert_eq!(value["pickupStatus"], "pending_initial_pickup");
        assert_eq!(value["materialAvailability"], "available");
        assert_eq!(value["frequency"], "weekly");
    }

    #[test]
    fn test_pickup_details_one_time_carries_date() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let details = PickupDetails::for_frequency(Frequency::OneTime, Some(date));
        assert_eq!(details.date, Some(date));

        let recurring = PickupDetails::for_frequency(Frequency::Weekly, Some(date));
        assert_eq!(recurring.date, None);
    }
}
