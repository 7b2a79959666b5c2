//! Bundling suggestions: sibling branches a factory can fold into one trip.

use serde::Serialize;

use crate::common::geo::distance_km;
use crate::domains::pickups::matching::MaterialCandidate;

/// A candidate that can share a pickup with the selected branch, with its
/// road-free distance from it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleCandidate {
    #[serde(flatten)]
    pub candidate: MaterialCandidate,
    pub distance_km: f64,
}

/// Candidates bundleable with the selected one: same company, same material
/// type, within `max_km` great-circle distance. The selected branch itself
/// is never suggested.
pub fn find_bundle_branches(
    selected: &MaterialCandidate,
    candidates: &[MaterialCandidate],
    max_km: f64,
) -> Vec<BundleCandidate> {
    candidates
        .iter()
        .filter(|c| c.branch_id != selected.branch_id)
        .filter(|c| c.company_id == selected.company_id)
        .filter(|c| c.material_type.eq_ignore_ascii_case(&selected.material_type))
        .filter_map(|c| {
            let distance = distance_km(&selected.location, &c.location);
            (distance <= max_km).then(|| BundleCandidate {
                candidate: c.clone(),
                distance_km: distance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GeoPoint;
    use crate::domains::catalog::models::{Frequency, PickupDetails};
    use uuid::Uuid;

    fn candidate(company_id: Uuid, material_type: &str, lat: f64, lon: f64) -> MaterialCandidate {
        let branch_id = Uuid::new_v4();
        MaterialCandidate {
            id: format!("{branch_id}_{material_type}"),
            branch_id,
            company_id,
            name: "Branch".to_string(),
            location: GeoPoint {
                latitude: lat,
                longitude: lon,
            },
            location_address: String::new(),
            phone_number: String::new(),
            material_type: material_type.to_string(),
            frequency: Frequency::Weekly,
            pickup_details: PickupDetails::default(),
            quantity: 10.0,
        }
    }

    #[test]
    fn test_bundles_nearby_same_company_same_material() {
        let company = Uuid::new_v4();
        let selected = candidate(company, "plastic", 24.7136, 46.6753);
        // A nearby Riyadh district, roughly 13 km away.
        let nearby = candidate(company, "plastic", 24.6, 46.7);

        let bundles = find_bundle_branches(&selected, &[nearby.clone()], 50.0);

        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].candidate.branch_id, nearby.branch_id);
        assert!(bundles[0].distance_km > 10.0 && bundles[0].distance_km < 16.0);
    }

    #[test]
    fn test_other_companies_are_never_bundled() {
        let selected = candidate(Uuid::new_v4(), "plastic", 24.7136, 46.6753);
        let other_company = candidate(Uuid::new_v4(), "plastic", 24.72, 46.68);

        assert!(find_bundle_branches(&selected, &[other_company], 50.0).is_empty());
    }

    #[test]
    fn test_other_materials_are_never_bundled() {
        let company = Uuid::new_v4();
        let selected = candidate(company, "plastic", 24.7136, 46.6753);
        let other_material = candidate(company, "metal", 24.72, 46.68);

        assert!(find_bundle_branches(&selected, &[other_material], 50.0).is_empty());
    }

    #[test]
    fn test_distance_cutoff_excludes_far_branches() {
        let company = Uuid::new_v4();
        let selected = candidate(company, "plastic", 24.7136, 46.6753);
        // Jeddah, roughly 850 km away.
        let far = candidate(company, "plastic", 21.4858, 39.1925);

        assert!(find_bundle_branches(&selected, &[far.clone()], 50.0).is_empty());
        assert_eq!(find_bundle_branches(&selected, &[far], 1000.0).len(), 1);
    }

    #[test]
    fn test_selected_branch_is_not_its_own_bundle() {
        let selected = candidate(Uuid::new_v4(), "plastic", 24.7136, 46.6753);
        assert!(find_bundle_branches(&selected, &[selected.clone()], 50.0).is_empty());
    }
}
