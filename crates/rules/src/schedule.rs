//! Calendar arithmetic shared by the rules and the status side-effect.

use chrono::{DateTime, Utc};

use projwatch_core::{Assignment, Entity};

const SECS_PER_DAY: f64 = 86_400.0;

fn fractional_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    to.signed_duration_since(from).num_seconds() as f64 / SECS_PER_DAY
}

/// Whole days until `target`, rounded up. Negative once `target` has passed
/// by at least a full day.
pub fn days_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    fractional_days(now, target).ceil() as i64
}

/// Whole days elapsed since `past`, rounded down.
pub fn days_since(past: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    fractional_days(past, now).floor() as i64
}

/// Linear expected progress between `start` and `end`, clamped to 0..=100.
///
/// Returns `None` for an empty or inverted window.
pub fn expected_progress(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    let total = fractional_days(start, end);
    if total <= 0.0 {
        return None;
    }
    let elapsed = fractional_days(start, now);
    Some((elapsed / total * 100.0).clamp(0.0, 100.0))
}

/// Expected minus actual progress, in percentage points.
pub fn schedule_gap(entity: &Entity, actual: f64, now: DateTime<Utc>) -> Option<f64> {
    let (start, end) = (entity.start_date?, entity.end_date?);
    expected_progress(start, end, now).map(|expected| expected - actual)
}

/// Gap of the whole entity, measured against its self-reported progress.
pub fn entity_gap(entity: &Entity, now: DateTime<Utc>) -> Option<f64> {
    schedule_gap(entity, entity.progress, now)
}

/// Gap of one assignment, measured against its approved-milestone share.
///
/// Assignments without milestones have nothing to measure.
pub fn assignment_gap(entity: &Entity, assignment: &Assignment, now: DateTime<Utc>) -> Option<f64> {
    if assignment.milestones.is_empty() {
        return None;
    }
    schedule_gap(entity, assignment.actual_progress(), now)
}
