use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domains::notifications::models::{NotificationFeed, NotificationItem};
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// The user's notification feed, newest first.
pub async fn notification_feed_handler(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<NotificationItem>>, ApiError> {
    let items = NotificationFeed::find(&state.db_pool, user_id).await?;
    Ok(Json(items))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub item_ids: Vec<Uuid>,
}

pub async fn mark_read_handler(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    NotificationFeed::mark_read(&state.db_pool, user_id, &request.item_ids).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkClickedRequest {
    pub item_id: Uuid,
}

pub async fn mark_clicked_handler(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<MarkClickedRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    NotificationFeed::mark_clicked(&state.db_pool, user_id, request.item_id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}
