//! Delivery time estimation.
//!
//! Pure functions over "now", a queue position and the dispatcher's activity.
//! Callers recompute on every use; results are never cached.

use super::dispatcher::DispatcherActivity;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Time left until the dispatcher's next send attempt.
///
/// An idle dispatcher starts a full interval after the next enqueue. A running
/// one has already spent `now - interval_started` of the current interval.
#[must_use]
pub fn time_until_next_attempt(
    now: DateTime<Utc>,
    interval: Duration,
    activity: DispatcherActivity,
) -> Duration {
    match activity {
        DispatcherActivity::Idle => interval,
        DispatcherActivity::Running { interval_started } => {
            let elapsed = (now - interval_started).to_std().unwrap_or(Duration::ZERO);
            interval.saturating_sub(elapsed)
        }
    }
}

/// Projected send time of the item that takes `position` (1-based).
///
/// - idle: `now + position * interval`
/// - running: `now + max(0, interval - elapsed) + (position - 1) * interval`
#[must_use]
pub fn estimate(
    now: DateTime<Utc>,
    position: usize,
    interval: Duration,
    activity: DispatcherActivity,
) -> DateTime<Utc> {
    let ahead = u32::try_from(position.saturating_sub(1)).unwrap_or(u32::MAX);
    let wait = time_until_next_attempt(now, interval, activity)
        .saturating_add(interval.saturating_mul(ahead));
    add_saturating(now, wait)
}

fn add_saturating(base: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(offset)
        .ok()
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
