//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::common::PushClient;
use crate::domains::notifications::Notifier;
use crate::domains::pickups::workflow::WeightMode;
use crate::server::routes::{
    available_materials_handler, bundle_branches_handler, complete_pickup_handler,
    create_pickup_handler, declare_material_handler, get_pickup_handler, health_handler,
    list_branches_handler, list_pickups_handler, mark_clicked_handler, mark_read_handler,
    material_availability_handler, material_claim_handler, material_pickup_day_handler,
    material_quantity_handler, notification_feed_handler, pickup_approval_handler,
    rebook_pickup_handler, recurring_status_handler, register_branch_handler,
    set_pickup_time_handler,
};
use crate::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub notifier: Arc<Notifier>,
    pub max_bundle_distance_km: f64,
    pub completion_weight_mode: WeightMode,
}

/// Build the Axum application router
pub fn build_app(pool: PgPool, config: &Config) -> Router {
    let push = config
        .push_gateway_url
        .clone()
        .map(PushClient::new);

    let app_state = AppState {
        db_pool: pool,
        notifier: Arc::new(Notifier::new(push)),
        max_bundle_distance_km: config.max_bundle_distance_km,
        completion_weight_mode: config.completion_weight_mode,
    };

    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route(
            "/branches",
            post(register_branch_handler).get(list_branches_handler),
        )
        .route("/branches/:id/materials", post(declare_material_handler))
        .route(
            "/branches/:id/materials/:material_type/quantity",
            post(material_quantity_handler),
        )
        .route(
            "/branches/:id/materials/:material_type/availability",
            post(material_availability_handler),
        )
        .route(
            "/branches/:id/materials/:material_type/pickup-day",
            post(material_pickup_day_handler),
        )
        .route(
            "/branches/:id/materials/:material_type/claim",
            post(material_claim_handler),
        )
        .route("/materials/available", get(available_materials_handler))
        .route("/materials/bundles", get(bundle_branches_handler))
        .route(
            "/pickups",
            post(create_pickup_handler).get(list_pickups_handler),
        )
        .route("/pickups/:id", get(get_pickup_handler))
        .route("/pickups/:id/time-slot", post(set_pickup_time_handler))
        .route("/pickups/:id/approval", post(pickup_approval_handler))
        .route("/pickups/:id/complete", post(complete_pickup_handler))
        .route("/pickups/:id/rebook", post(rebook_pickup_handler))
        .route(
            "/pickups/:id/recurring-status",
            post(recurring_status_handler),
        )
        .route("/notifications/:user_id", get(notification_feed_handler))
        .route("/notifications/:user_id/read", post(mark_read_handler))
        .route("/notifications/:user_id/clicked", post(mark_clicked_handler))
        .route("/health", get(health_handler))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
