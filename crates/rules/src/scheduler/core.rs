//! [`BatchScheduler`]: decides which batch jobs are due.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::cron::is_cron_due;
use super::entry::{BatchJob, JobScheduleEntry, JobTrigger};

/// Tracks trigger and last-run time per batch job.
pub struct BatchScheduler {
    entries: BTreeMap<BatchJob, JobScheduleEntry>,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Install or replace the trigger for a job. Preserves `last_run`.
    pub fn schedule(&mut self, job: BatchJob, trigger: JobTrigger) {
        match self.entries.get_mut(&job) {
            Some(entry) => {
                entry.trigger = trigger;
                entry.enabled = true;
            }
            None => {
                self.entries.insert(
                    job,
                    JobScheduleEntry {
                        job,
                        trigger,
                        last_run: None,
                        enabled: true,
                    },
                );
            }
        }
    }

    pub fn set_enabled(&mut self, job: BatchJob, enabled: bool) {
        if let Some(entry) = self.entries.get_mut(&job) {
            entry.enabled = enabled;
        }
    }

    /// Check whether a job should run at the given instant.
    pub fn should_run(&self, job: BatchJob, now: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get(&job) else {
            return false;
        };
        if !entry.enabled {
            return false;
        }

        match &entry.trigger {
            JobTrigger::Interval(interval) => match entry.last_run {
                None => true,
                Some(last) => {
                    let elapsed = now.signed_duration_since(last);
                    let due = elapsed
                        >= chrono::Duration::from_std(*interval).unwrap_or(chrono::Duration::zero());
                    if !due {
                        debug!(job = job.as_str(), "job interval not yet elapsed");
                    }
                    due
                }
            },
            JobTrigger::Cron(schedule) => is_cron_due(schedule, now, entry.last_run),
        }
    }

    /// Record a completed run at a specific timestamp.
    pub fn record_run_at(&mut self, job: BatchJob, at: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(&job) {
            entry.last_run = Some(at);
        }
    }

    /// Jobs due at `now`, full cycle first.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<BatchJob> {
        self.entries
            .keys()
            .copied()
            .filter(|job| self.should_run(*job, now))
            .collect()
    }

    pub fn get(&self, job: BatchJob) -> Option<&JobScheduleEntry> {
        self.entries.get(&job)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}
