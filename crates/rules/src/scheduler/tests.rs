//! Tests for the scheduler module.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::scheduler::cron::{is_cron_due, normalize_cron};
use crate::scheduler::{BatchJob, BatchScheduler, JobTrigger};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

// -- normalize_cron ----------------------------------------------------

#[test]
fn normalize_cron_5_to_6_fields() {
    assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
    assert_eq!(normalize_cron("0 6 * * 1-5"), "0 0 6 * * 1-5");
}

#[test]
fn normalize_cron_already_6_fields() {
    assert_eq!(normalize_cron("0 */15 * * * *"), "0 */15 * * * *");
}

// -- JobTrigger::parse -------------------------------------------------

#[test]
fn trigger_parses_interval() {
    match JobTrigger::parse("30m").unwrap() {
        JobTrigger::Interval(d) => assert_eq!(d, Duration::from_secs(1_800)),
        other => panic!("expected interval, got {other:?}"),
    }
}

#[test]
fn trigger_parses_cron() {
    assert!(matches!(
        JobTrigger::parse("0 2 * * *").unwrap(),
        JobTrigger::Cron(_)
    ));
}

#[test]
fn trigger_rejects_garbage() {
    assert!(JobTrigger::parse("every tuesday").is_err());
}

// -- should_run --------------------------------------------------------

#[test]
fn unscheduled_job_never_runs() {
    let sched = BatchScheduler::new();
    assert!(!sched.should_run(BatchJob::FullCycle, Utc::now()));
}

#[test]
fn interval_job_runs_first_time_then_waits() {
    let mut sched = BatchScheduler::new();
    sched.schedule(BatchJob::FullCycle, JobTrigger::parse("1h").unwrap());

    let t = at("2026-01-15T10:00:00Z");
    assert!(sched.should_run(BatchJob::FullCycle, t));

    sched.record_run_at(BatchJob::FullCycle, t);
    assert!(!sched.should_run(BatchJob::FullCycle, t + chrono::Duration::minutes(59)));
    assert!(sched.should_run(BatchJob::FullCycle, t + chrono::Duration::minutes(60)));
}

#[test]
fn cron_job_respects_last_run() {
    let mut sched = BatchScheduler::new();
    sched.schedule(BatchJob::EscalationOnly, JobTrigger::parse("*/5 * * * *").unwrap());

    let just_after_tick = at("2026-01-15T10:00:01Z");
    sched.record_run_at(BatchJob::EscalationOnly, just_after_tick);

    assert!(!sched.should_run(
        BatchJob::EscalationOnly,
        just_after_tick + chrono::Duration::minutes(2)
    ));
    assert!(sched.should_run(
        BatchJob::EscalationOnly,
        just_after_tick + chrono::Duration::minutes(5)
    ));
}

#[test]
fn disabled_job_is_not_due() {
    let mut sched = BatchScheduler::new();
    sched.schedule(BatchJob::FullCycle, JobTrigger::parse("1m").unwrap());
    sched.set_enabled(BatchJob::FullCycle, false);
    assert!(sched.due_jobs(Utc::now()).is_empty());
}

#[test]
fn reschedule_preserves_last_run() {
    let mut sched = BatchScheduler::new();
    sched.schedule(BatchJob::FullCycle, JobTrigger::parse("1h").unwrap());
    let t = at("2026-01-15T10:00:00Z");
    sched.record_run_at(BatchJob::FullCycle, t);

    sched.schedule(BatchJob::FullCycle, JobTrigger::parse("2h").unwrap());
    assert_eq!(sched.get(BatchJob::FullCycle).unwrap().last_run, Some(t));
    assert_eq!(sched.len(), 1);
}

#[test]
fn due_jobs_orders_full_cycle_first() {
    let mut sched = BatchScheduler::new();
    sched.schedule(BatchJob::EscalationOnly, JobTrigger::parse("1m").unwrap());
    sched.schedule(BatchJob::FullCycle, JobTrigger::parse("1m").unwrap());
    assert_eq!(
        sched.due_jobs(Utc::now()),
        vec![BatchJob::FullCycle, BatchJob::EscalationOnly]
    );
}

// -- is_cron_due -------------------------------------------------------

#[test]
fn is_cron_due_never_run_before() {
    let schedule = Schedule::from_str("0 * * * * *").unwrap();
    assert!(is_cron_due(&schedule, Utc::now(), None));
}

#[test]
fn is_cron_due_just_ran() {
    let schedule = Schedule::from_str("0 * * * * *").unwrap();
    let now = Utc::now();
    assert!(!is_cron_due(&schedule, now, Some(now)));
}
