use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::common::GeoPoint;
use crate::domains::catalog::models::{
    Availability, Branch, Frequency, Material, PickupDetails,
};
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// A material as declared by the branch. Internal lifecycle fields are not
/// accepted from clients; a declared material always enters the catalog
/// offered and available.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDeclaration {
    #[serde(rename = "type")]
    pub material_type: String,
    pub frequency: Frequency,
    pub quantity: f64,
    /// Requested collection date, honored for one-time materials.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl MaterialDeclaration {
    fn into_material(self) -> Material {
        Material {
            pickup_details: PickupDetails::for_frequency(self.frequency, self.date),
            material_type: self.material_type,
            frequency: self.frequency,
            quantity: self.quantity,
            offered: true,
            pickup_status: None,
            material_availability: Availability::Available,
            pending_factory_id: None,
            pending_timestamp: None,
            last_pickup: None,
            next_pickup: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBranchRequest {
    pub company_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub location_address: String,
    pub material: MaterialDeclaration,
}

pub async fn register_branch_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<RegisterBranchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = Branch::register(
        &state.db_pool,
        request.company_id,
        &request.name,
        &request.phone_number,
        request.location,
        &request.location_address,
        request.material.into_material(),
    )
    .await?;
    Ok(Json(json!({"id": id})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBranchesQuery {
    pub company_id: Uuid,
}

pub async fn list_branches_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListBranchesQuery>,
) -> Result<Json<Vec<Branch>>, ApiError> {
    let branches = Branch::find_by_company(&state.db_pool, query.company_id).await?;
    Ok(Json(branches))
}

/// Add or replace one declared material on a branch.
pub async fn declare_material_handler(
    Extension(state): Extension<AppState>,
    Path(branch_id): Path<Uuid>,
    Json(declaration): Json<MaterialDeclaration>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Branch::declare_material(&state.db_pool, branch_id, declaration.into_material()).await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityRequest {
    pub quantity: f64,
}

pub async fn material_quantity_handler(
    Extension(state): Extension<AppState>,
    Path((branch_id, material_type)): Path<(Uuid, String)>,
    Json(request): Json<QuantityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Branch::update_material_quantity(&state.db_pool, branch_id, &material_type, request.quantity)
        .await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub available: bool,
}

pub async fn material_availability_handler(
    Extension(state): Extension<AppState>,
    Path((branch_id, material_type)): Path<(Uuid, String)>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Branch::update_material_availability(
        &state.db_pool,
        branch_id,
        &material_type,
        request.available,
    )
    .await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupDayRequest {
    #[serde(default)]
    pub day: Option<NaiveDate>,
}

pub async fn material_pickup_day_handler(
    Extension(state): Extension<AppState>,
    Path((branch_id, material_type)): Path<(Uuid, String)>,
    Json(request): Json<PickupDayRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Branch::set_material_pickup_day(&state.db_pool, branch_id, &material_type, request.day)
        .await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub factory_id: Uuid,
}

/// Tentative claim on a material before the pickup exists; competing
/// factories see it is spoken for.
pub async fn material_claim_handler(
    Extension(state): Extension<AppState>,
    Path((branch_id, material_type)): Path<(Uuid, String)>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Branch::set_material_pending_claim(
        &state.db_pool,
        branch_id,
        &material_type,
        request.factory_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(json!({"ok": true})))
}
