//! Cron expression helpers for batch triggers.

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

/// How far back a never-run cron job looks for a missed tick.
const FIRST_RUN_LOOKBACK_HOURS: i64 = 24;

/// Accept operator-style 5-field cron (`min hour dom month dow`) by adding the
/// seconds field the `cron` crate expects. Anything else is passed through.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        _ => expr.to_string(),
    }
}

/// True when the schedule has a tick in `(last_run, now]`.
pub(crate) fn is_cron_due(
    schedule: &Schedule,
    now: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
) -> bool {
    let since = last_run.unwrap_or(now - Duration::hours(FIRST_RUN_LOOKBACK_HOURS));
    schedule
        .after(&since)
        .next()
        .is_some_and(|tick| tick <= now)
}
