//! Pickup lifecycle operations.
//!
//! Each operation follows the same shape: apply a pure transition on the
//! pickup aggregate through the optimistic write loop, then fan out the
//! branch-material side effects and notifications.

pub mod approval;
pub mod completion;
pub mod create;

pub use approval::{set_initial_pickup_time, update_pickup_approval};
pub use completion::{complete_pickup, rebook_pickup, update_recurring_status};
pub use create::{create_pickup, CreatePickupRequest, SelectedMaterial};

pub use crate::domains::pickups::models::WeightMode;

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::domains::pickups::error::PickupError;
use crate::domains::pickups::models::Pickup;

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Read-transition-write loop over one pickup document.
///
/// The transition must be pure; it can run several times if a concurrent
/// writer wins the compare-and-swap. After [`MAX_WRITE_ATTEMPTS`] losses
/// the operation gives up with [`PickupError::Conflict`].
pub(crate) async fn with_pickup<T, F>(
    pool: &PgPool,
    pickup_id: Uuid,
    mut transition: F,
) -> Result<(Pickup, T), PickupError>
where
    F: FnMut(&mut Pickup) -> Result<T, PickupError>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut pickup = Pickup::find_by_id(pool, pickup_id)
            .await?
            .ok_or(PickupError::PickupNotFound)?;

        let outcome = transition(&mut pickup)?;

        if pickup.update_with_version(pool).await? {
            return Ok((pickup, outcome));
        }
        warn!(%pickup_id, attempt, "Concurrent pickup write, retrying");
    }

    Err(PickupError::Conflict(MAX_WRITE_ATTEMPTS))
}
