pub mod bundling;
pub mod error;
pub mod matching;
pub mod models;
pub mod scheduling;
pub mod workflow;

pub use error::PickupError;
