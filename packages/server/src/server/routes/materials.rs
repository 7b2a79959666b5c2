use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domains::catalog::models::Branch;
use crate::domains::pickups::bundling::{find_bundle_branches, BundleCandidate};
use crate::domains::pickups::matching::{find_available_materials, MaterialCandidate};
use crate::domains::pickups::PickupError;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableMaterialsQuery {
    pub material_type: String,
}

/// Branch materials a factory can claim for the given type.
pub async fn available_materials_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<AvailableMaterialsQuery>,
) -> Result<Json<Vec<MaterialCandidate>>, ApiError> {
    let candidates = find_available_materials(&state.db_pool, &query.material_type).await?;
    Ok(Json(candidates))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleQuery {
    pub branch_id: Uuid,
    pub material_type: String,
}

/// Sibling branches that can share a pickup route with the selected one.
pub async fn bundle_branches_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<Vec<BundleCandidate>>, ApiError> {
    let branch = Branch::find_by_id(&state.db_pool, query.branch_id)
        .await
        .map_err(PickupError::Other)?
        .ok_or(PickupError::BranchNotFound)?;
    let material = branch
        .materials
        .get(&query.material_type)
        .ok_or(PickupError::BranchNotFound)?;

    let selected = MaterialCandidate {
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
    };

    let candidates = find_available_materials(&state.db_pool, &query.material_type).await?;
    let bundles = find_bundle_branches(&selected, &candidates, state.max_bundle_distance_km);
    Ok(Json(bundles))
}
