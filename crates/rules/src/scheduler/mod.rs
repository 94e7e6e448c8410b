//! Cron/interval scheduling for batch runs.
//!
//! Tracks when each batch job (full cycle, escalation-only) last ran and
//! decides which ones are due. The engine itself does not care what triggers
//! a run; this is what the worker's `watch` loop uses.

mod core;
pub(crate) mod cron;
mod entry;

#[cfg(test)]
mod tests;

pub use self::core::BatchScheduler;
pub use self::entry::{BatchJob, JobScheduleEntry, JobTrigger, ScheduleError};
