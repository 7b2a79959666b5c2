use thiserror::Error;

/// Errors surfaced by pickup lifecycle operations.
///
/// Precondition violations are checked before any write, so a returned
/// error of that class guarantees no partial state was left behind.
#[derive(Debug, Error)]
pub enum PickupError {
    /// A recurring pickup was requested for a (factory, company) pair with
    /// no prior completed pickup.
    #[error("first completed pickup required before requesting recurring pickups")]
    FirstPickupRequired,

    #[error("pickup not found")]
    PickupNotFound,

    #[error("branch not found in pickup")]
    BranchNotFound,

    #[error("time slot must have a date and zero-padded HH:MM start and end times")]
    InvalidTimeSlot,

    #[error("actual weight must be a positive number")]
    InvalidWeight,

    #[error("at least one branch must be selected")]
    NoBranchesSelected,

    #[error("no materials selected for pickup")]
    NoMaterialsSelected,

    /// Only completed pickups can be rebooked.
    #[error("pickup is not completed")]
    NotCompleted,

    /// The optimistic write loop exhausted its attempts because another
    /// writer kept changing the pickup document.
    #[error("pickup was concurrently modified, giving up after {0} attempts")]
    Conflict(u32),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
