//! Per-job schedule entry types.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use projwatch_core::config::parse_duration;

use super::cron::normalize_cron;

/// Batch operations an operator can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BatchJob {
    /// Evaluate, resolve, escalate.
    FullCycle,
    /// Escalation pass only.
    EscalationOnly,
}

impl BatchJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchJob::FullCycle => "full_cycle",
            BatchJob::EscalationOnly => "escalation_only",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule '{expr}': {reason}")]
    Invalid { expr: String, reason: String },
}

/// What makes a job due.
#[derive(Debug, Clone)]
pub enum JobTrigger {
    /// Normalized 6-field cron expression.
    Cron(Schedule),
    /// Fixed spacing since the last run.
    Interval(Duration),
}

impl JobTrigger {
    /// Parse `"15m"`-style intervals or 5/6-field cron expressions.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        if let Some(interval) = parse_duration(expr) {
            if interval.is_zero() {
                return Err(ScheduleError::Invalid {
                    expr: expr.to_string(),
                    reason: "interval must be positive".to_string(),
                });
            }
            return Ok(JobTrigger::Interval(interval));
        }
        Schedule::from_str(&normalize_cron(expr))
            .map(JobTrigger::Cron)
            .map_err(|e| ScheduleError::Invalid {
                expr: expr.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Scheduling state for a single job.
#[derive(Debug, Clone)]
pub struct JobScheduleEntry {
    pub job: BatchJob,
    pub trigger: JobTrigger,
    /// Timestamp of the last completed run.
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
}
