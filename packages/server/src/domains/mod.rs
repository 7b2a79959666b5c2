pub mod catalog;
pub mod notifications;
pub mod pickups;
