use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domains::pickups::models::{Pickup, RecurringStatus, TimeSlot};
use crate::domains::pickups::workflow::{
    complete_pickup, create_pickup, rebook_pickup, set_initial_pickup_time,
    update_pickup_approval, update_recurring_status, CreatePickupRequest,
};
use crate::domains::pickups::PickupError;
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// Create a pickup from the factory's material selection.
pub async fn create_pickup_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<CreatePickupRequest>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = create_pickup(&state.db_pool, &state.notifier, request).await?;
    Ok(Json(pickup))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPickupsQuery {
    pub factory_id: Uuid,
}

pub async fn list_pickups_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListPickupsQuery>,
) -> Result<Json<Vec<Pickup>>, ApiError> {
    let pickups = Pickup::find_by_factory(&state.db_pool, query.factory_id).await?;
    Ok(Json(pickups))
}

pub async fn get_pickup_handler(
    Extension(state): Extension<AppState>,
    Path(pickup_id): Path<Uuid>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = Pickup::find_by_id(&state.db_pool, pickup_id)
        .await?
        .ok_or(PickupError::PickupNotFound)?;
    Ok(Json(pickup))
}

/// Propose the collection window for a pending pickup.
pub async fn set_pickup_time_handler(
    Extension(state): Extension<AppState>,
    Path(pickup_id): Path<Uuid>,
    Json(slot): Json<TimeSlot>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = set_initial_pickup_time(&state.db_pool, pickup_id, slot).await?;
    Ok(Json(pickup))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub branch_id: Uuid,
    pub approved: bool,
}

/// Record one branch's decision on the proposed slot.
pub async fn pickup_approval_handler(
    Extension(state): Extension<AppState>,
    Path(pickup_id): Path<Uuid>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = update_pickup_approval(
        &state.db_pool,
        &state.notifier,
        pickup_id,
        request.branch_id,
        request.approved,
    )
    .await?;
    Ok(Json(pickup))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub branch_ids: Vec<Uuid>,
    pub total_weight: f64,
}

/// Record a completed collection for a subset of branches.
pub async fn complete_pickup_handler(
    Extension(state): Extension<AppState>,
    Path(pickup_id): Path<Uuid>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = complete_pickup(
        &state.db_pool,
        &state.notifier,
        state.completion_weight_mode,
        pickup_id,
        &request.branch_ids,
        request.total_weight,
    )
    .await?;
    Ok(Json(pickup))
}

/// Clone a completed pickup into a fresh one-time booking.
pub async fn rebook_pickup_handler(
    Extension(state): Extension<AppState>,
    Path(pickup_id): Path<Uuid>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = rebook_pickup(&state.db_pool, pickup_id).await?;
    Ok(Json(pickup))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringStatusRequest {
    pub status: RecurringStatus,
}

/// Pause or resume a recurring pickup.
pub async fn recurring_status_handler(
    Extension(state): Extension<AppState>,
    Path(pickup_id): Path<Uuid>,
    Json(request): Json<RecurringStatusRequest>,
) -> Result<Json<Pickup>, ApiError> {
    let pickup = update_recurring_status(&state.db_pool, pickup_id, request.status).await?;
    Ok(Json(pickup))
}
