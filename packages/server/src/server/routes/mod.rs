pub mod branches;
pub mod health;
pub mod materials;
pub mod notifications;
pub mod pickups;

pub use branches::{
    declare_material_handler, list_branches_handler, material_availability_handler,
    material_claim_handler, material_pickup_day_handler, material_quantity_handler,
    register_branch_handler,
};
pub use health::health_handler;
pub use materials::{available_materials_handler, bundle_branches_handler};
pub use notifications::{mark_clicked_handler, mark_read_handler, notification_feed_handler};
pub use pickups::{
    complete_pickup_handler, create_pickup_handler, get_pickup_handler, list_pickups_handler,
    pickup_approval_handler, rebook_pickup_handler, recurring_status_handler,
    set_pickup_time_handler,
};
