//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domains::pickups::PickupError;

/// API-facing error wrapper. Converts domain errors into a stable JSON
/// shape with a machine code and bilingual user copy:
/// `{"error": <code>, "message": {"ar": ..., "en": ...}}`.
pub struct ApiError(pub PickupError);

impl From<PickupError> for ApiError {
    fn from(err: PickupError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(PickupError::Other(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, ar, en) = match &self.0 {
            PickupError::FirstPickupRequired => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "first_pickup_required",
                "يجب إتمام عملية جمع واحدة على الأقل قبل طلب الجمع الدوري",
                "Complete at least one pickup before requesting recurring pickups",
            ),
            PickupError::PickupNotFound => (
                StatusCode::NOT_FOUND,
                "pickup_not_found",
                "لم يتم العثور على عملية الجمع",
                "Pickup not found",
            ),
            PickupError::BranchNotFound => (
                StatusCode::NOT_FOUND,
                "branch_not_found",
                "لم يتم العثور على الفرع",
                "Branch not found",
            ),
            PickupError::InvalidTimeSlot => (
                StatusCode::BAD_REQUEST,
                "invalid_time_slot",
                "يرجى إدخال موعد صحيح",
                "Time slot must have a date and HH:MM start and end times",
            ),
            PickupError::InvalidWeight => (
                StatusCode::BAD_REQUEST,
                "invalid_weight",
                "يرجى إدخال وزن صحيح",
                "Actual weight must be a positive number",
            ),
            PickupError::NoBranchesSelected => (
                StatusCode::BAD_REQUEST,
                "no_branches_selected",
                "يرجى اختيار فرع واحد على الأقل",
                "At least one branch must be selected",
            ),
            PickupError::NoMaterialsSelected => (
                StatusCode::BAD_REQUEST,
                "no_materials_selected",
                "يرجى اختيار مادة واحدة على الأقل",
                "At least one material must be selected",
            ),
            PickupError::NotCompleted => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "pickup_not_completed",
                "يمكن إعادة الحجز بعد اكتمال عملية الجمع فقط",
                "Only completed pickups can be rebooked",
            ),
            PickupError::Conflict(_) => (
                StatusCode::CONFLICT,
                "concurrent_modification",
                "تم تعديل عملية الجمع من جهة أخرى، يرجى المحاولة مرة أخرى",
                "The pickup was modified concurrently, please retry",
            ),
            PickupError::Database(err) => {
                error!("Database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "حدث خطأ غير متوقع",
                    "An unexpected error occurred",
                )
            }
            PickupError::Other(err) => {
                error!("Internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "حدث خطأ غير متوقع",
                    "An unexpected error occurred",
                )
            }
        };

        let body = json!({
            "error": code,
            "message": { "ar": ar, "en": en },
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_errors_map_to_client_status_codes() {
        let response = ApiError(PickupError::FirstPickupRequired).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = ApiError(PickupError::InvalidWeight).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError(PickupError::Conflict(3)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
