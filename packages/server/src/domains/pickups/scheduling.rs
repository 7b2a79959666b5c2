//! Next-occurrence arithmetic for recurring pickups.

use chrono::{Days, Months, NaiveDate};

use crate::domains::catalog::models::Frequency;

/// Compute the next pickup date after `current_date`.
///
/// Weekly advances 7 days, bi-weekly 14, monthly one calendar month; any
/// other frequency leaves the date unchanged. The result is then pushed
/// forward one day at a time while it collides with a skip date.
///
/// `day_of_week` is accepted for call-site compatibility with the stored
/// recurring details but does not participate in the calculation.
pub fn calculate_next_pickup_date(
    current_date: NaiveDate,
    frequency: Frequency,
    _day_of_week: Option<u32>,
    skip_dates: &[NaiveDate],
) -> NaiveDate {
    let mut next = match frequency {
        Frequency::Weekly => current_date + Days::new(7),
        Frequency::BiWeekly => current_date + Days::new(14),
        Frequency::Monthly => current_date + Months::new(1),
        _ => current_date,
    };

    while skip_dates.contains(&next) {
        next = next + Days::new(1);
    }

    next
}
