//! Matchmaking: which declared branch materials a factory may claim.

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::common::GeoPoint;
use crate::domains::catalog::models::{Availability, Branch, Frequency, PickupDetails};
use crate::domains::pickups::error::PickupError;
use crate::domains::pickups::models::Pickup;

/// One offered branch material, flattened for the factory-facing catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialCandidate {
    /// Stable composite id, `<branchId>_<materialType>`.
    pub id: String,
    pub branch_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub location_address: String,
    pub phone_number: String,
    pub material_type: String,
    pub frequency: Frequency,
    pub pickup_details: PickupDetails,
    pub quantity: f64,
}

/// Whether an offered material satisfies a factory's requested type.
///
/// Matching is case-insensitive, and a factory collecting the combined
/// `paperAndCardboard` stream accepts either constituent.
pub fn material_type_matches(offered: &str, requested: &str) -> bool {
    let offered = offered.to_lowercase();
    let requested = requested.to_lowercase();

    if offered == requested {
        return true;
    }
    requested == "paperandcardboard" && (offered == "paper" || offered == "cardboard")
}

/// Filter branch documents down to claimable candidates.
///
/// A material qualifies when it is offered, physically available, matches
/// the requested type, and its branch is not in the exclusion set of
/// branches already on an active pickup.
pub fn collect_candidates(
    branches: &[Branch],
    excluded_branch_ids: &HashSet<Uuid>,
    material_type: &str,
) -> Vec<MaterialCandidate> {
    let mut candidates = Vec::new();

    for branch in branches {
        if excluded_branch_ids.contains(&branch.id) {
            continue;
        }
        for material in branch.materials.values() {
            if !material.offered
                || material.material_availability != Availability::Available
                || !material_type_matches(&material.material_type, material_type)
            {
                continue;
            }
            candidates.push(MaterialCandidate {
                id: format!("{}_{}", branch.id, material.material_type),
                branch_id: branch.id,
                company_id: branch.company_id,
                name: branch.name.clone(),
                location: branch.location,
                location_address: branch.location_address.clone(),
                phone_number: branch.phone_number.clone(),
                material_type: material.material_type.clone(),
                frequency: material.frequency,
                pickup_details: material.pickup_details.clone(),
                quantity: material.quantity,
            });
        }
    }

    candidates
}

/// Materials a factory can claim right now for the given type.
pub async fn find_available_materials(
    pool: &PgPool,
    material_type: &str,
) -> Result<Vec<MaterialCandidate>, PickupError> {
    let branches = Branch::find_all(pool).await?;
    let excluded = Pickup::active_branch_ids(pool).await?;

    Ok(collect_candidates(&branches, &excluded, material_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::catalog::models::Material;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn branch_with_material(material_type: &str, offered: bool) -> Branch {
        let material = Material {
            material_type: material_type.to_string(),
            frequency: Frequency::Weekly,
            quantity: 50.0,
            offered,
            pickup_status: None,
            material_availability: Availability::Available,
            pending_factory_id: None,
            pending_timestamp: None,
            pickup_details: PickupDetails::default(),
            last_pickup: None,
            next_pickup: None,
        };
        let mut materials = BTreeMap::new();
        materials.insert(material_type.to_string(), material);

        Branch {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Olaya Branch".to_string(),
            phone_number: "+966500000000".to_string(),
            location: GeoPoint {
                latitude: 24.7136,
                longitude: 46.6753,
            },
            location_address: "Olaya St, Riyadh".to_string(),
            materials,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_type_matching_is_case_insensitive() {
        assert!(material_type_matches("Plastic", "plastic"));
        assert!(!material_type_matches("plastic", "metal"));
    }

    #[test]
    fn test_paper_and_cardboard_accepts_both_constituents() {
        assert!(material_type_matches("paper", "paperAndCardboard"));
        assert!(material_type_matches("cardboard", "paperandcardboard"));
        assert!(!material_type_matches("plastic", "paperAndCardboard"));
    }

    #[test]
    fn test_branches_on_active_pickups_are_excluded() {
        let open = branch_with_material("plastic", true);
        let claimed = branch_with_material("plastic", true);
        let excluded: HashSet<Uuid> = [claimed.id].into_iter().collect();

        let candidates =
            collect_candidates(&[open.clone(), claimed], &excluded, "plastic");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].branch_id, open.id);
        assert_eq!(candidates[0].id, format!("{}_plastic", open.id));
    }

    #[test]
    fn test_unoffered_and_unavailable_materials_are_skipped() {
        let unoffered = branch_with_material("plastic", false);
        let mut unavailable = branch_with_material("plastic", true);
        for m in unavailable.materials.values_mut() {
            m.material_availability = Availability::Unavailable;
        }

        let candidates =
            collect_candidates(&[unoffered, unavailable], &HashSet::new(), "plastic");

        assert!(candidates.is_empty());
    }

    #[test]
    fn test_candidate_carries_branch_contact_details() {
        let branch = branch_with_material("cardboard", true);
        let candidates = collect_candidates(
            std::slice::from_ref(&branch),
            &HashSet::new(),
            "paperAndCardboard",
        );

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Olaya Branch");
        assert_eq!(candidates[0].phone_number, "+966500000000");
        assert_eq!(candidates[0].quantity, 50.0);
    }
}
