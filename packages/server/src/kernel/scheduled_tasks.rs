//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Two jobs keep the pickup lifecycle moving without user input:
//! - The minute sweep flips approved pickups to `in_progress` when the
//!   Riyadh wall clock enters their slot.
//! - The daily reset returns exhausted recurring materials to circulation
//!   at local midnight.
//!
//! Both jobs are idempotent, so a crashed or doubled run is harmless.

use anyhow::Result;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::common::time::{minute_of, riyadh_now};
use crate::domains::catalog::models::Branch;
use crate::domains::pickups::models::Pickup;
use crate::domains::pickups::workflow::with_pickup;

/// Attempts per sweep tick before the minute is abandoned to the next one.
const SWEEP_ATTEMPTS: u32 = 3;

/// Start all scheduled tasks
pub async fn start_scheduler(pool: PgPool) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Time sweep - runs every minute
    let sweep_pool = pool.clone();
    let sweep_job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let pool = sweep_pool.clone();
        Box::pin(async move {
            for attempt in 1..=SWEEP_ATTEMPTS {
                match run_pickup_sweep(&pool).await {
                    Ok(()) => return,
                    Err(e) if attempt < SWEEP_ATTEMPTS => {
                        tracing::warn!("Pickup sweep attempt {} failed: {}", attempt, e);
                    }
                    Err(e) => {
                        tracing::error!("Pickup sweep failed after {} attempts: {}", attempt, e);
                    }
                }
            }
        })
    })?;

    scheduler.add(sweep_job).await?;

    // Daily material reset - runs at midnight Riyadh time (21:00 UTC)
    let reset_pool = pool.clone();
    let reset_job = Job::new_async("0 0 21 * * *", move |_uuid, _lock| {
        let pool = reset_pool.clone();
        Box::pin(async move {
            if let Err(e) = run_daily_reset(&pool).await {
                tracing::error!("Daily material reset failed: {}", e);
            }
        })
    })?;

    scheduler.add(reset_job).await?;
    scheduler.start().await?;

    tracing::info!("Scheduled tasks started (pickup sweep every minute, material reset daily)");
    Ok(scheduler)
}

/// Run one sweep tick.
///
/// Loads the pickups slotted for today's local date and flips the lines
/// whose slot starts this minute. Each due pickup is written through the
/// optimistic loop, which re-reads and re-applies the transition when a
/// concurrent writer wins the version race; the transition must not be
/// dropped, because the matching minute never comes again. Exhausting the
/// loop surfaces as an error so the bounded per-tick retry re-runs the
/// whole sweep.
async fn run_pickup_sweep(pool: &PgPool) -> Result<()> {
    let now = riyadh_now();
    let today = now.date_naive();
    let minute = minute_of(&now);

    let pickups = Pickup::find_by_slot_date(pool, today).await?;
    if pickups.is_empty() {
        return Ok(());
    }

    let mut transitioned = 0;
    for mut pickup in pickups {
        // Dry run on the copy already in hand; most of today's pickups are
        // not due this minute.
        if pickup.sweep_due_lines(today, &minute) == 0 {
            continue;
        }

        let (_, changed) =
            with_pickup(pool, pickup.id, |fresh| Ok(fresh.sweep_due_lines(today, &minute)))
                .await?;
        transitioned += changed;
    }

    if transitioned > 0 {
        tracing::info!(
            "Pickup sweep moved {} branch lines to in_progress at {} {}",
            transitioned,
            today,
            minute
        );
    }

    Ok(())
}

/// Run the daily material reset.
///
/// Walks every branch document and returns `picked_up` materials to
/// circulation; branches whose materials changed are written back
/// wholesale.
async fn run_daily_reset(pool: &PgPool) -> Result<()> {
    tracing::info!("Running daily material reset");

    let now = riyadh_now().with_timezone(&chrono::Utc);
    let branches = Branch::find_all(pool).await?;

    let mut reset_count = 0;
    for mut branch in branches {
        let mut changed = false;
        for material in branch.materials.values_mut() {
            if material.reset_after_pickup(now) {
                changed = true;
                reset_count += 1;
            }
        }
        if changed {
            Branch::update_materials(pool, branch.id, &branch.materials).await?;
        }
    }

    tracing::info!("Daily reset complete: {} materials returned to circulation", reset_count);
    Ok(())
}
