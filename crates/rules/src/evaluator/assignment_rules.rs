//! Rules evaluated once per assignment (one candidate per agency).

use chrono::{DateTime, Utc};
use serde_json::json;

use projwatch_core::config::RuleThresholds;
use projwatch_core::{Assignment, BaseAlertKind, Entity, MilestoneStatus, Severity};

use crate::catalog::Candidate;
use crate::schedule::{assignment_gap, days_until};

pub(super) fn behind_schedule(
    entity: &Entity,
    assignment: &Assignment,
    now: DateTime<Utc>,
    t: &RuleThresholds,
) -> Option<Candidate> {
    let gap = assignment_gap(entity, assignment, now)?;
    if gap <= t.behind_schedule_gap {
        return None;
    }
    let severity = if gap > t.behind_schedule_critical_gap {
        Severity::Critical
    } else {
        Severity::Warning
    };
    let actual = assignment.actual_progress();
    Some(Candidate::new(
        BaseAlertKind::BehindSchedule,
        severity,
        Some(assignment.agency_id.clone()),
        format!(
            "Agency {} on project '{}' is {:.0} points behind schedule ({:.0}% done, {:.0}% expected)",
            assignment.agency_id,
            entity.name,
            gap,
            actual,
            actual + gap
        ),
        json!({ "gap": gap, "actualProgress": actual, "expectedProgress": actual + gap }),
    ))
}

/// Rejected and submitted counts; `submitted` is everything past NotStarted.
pub(crate) fn rejection_counts(assignment: &Assignment) -> (usize, usize) {
    assignment
        .milestones
        .iter()
        .fold((0, 0), |(rejected, submitted), m| {
            (
                rejected + usize::from(m.status == MilestoneStatus::Rejected),
                submitted + usize::from(m.status.is_submitted()),
            )
        })
}

pub(super) fn high_rejection_rate(assignment: &Assignment, t: &RuleThresholds) -> Option<Candidate> {
    let (rejected, submitted) = rejection_counts(assignment);
    if submitted == 0 {
        return None;
    }
    let rate = rejected as f64 / submitted as f64 * 100.0;
    if rate <= t.rejection_rate_percent {
        return None;
    }
    Some(Candidate::new(
        BaseAlertKind::HighRejectionRate,
        Severity::Warning,
        Some(assignment.agency_id.clone()),
        format!(
            "Agency {} has {} of {} submitted milestones rejected ({:.0}%)",
            assignment.agency_id, rejected, submitted, rate
        ),
        json!({ "rejected": rejected, "submitted": submitted, "rate": rate }),
    ))
}

/// Length of the trailing run of rejections, ignoring unstarted milestones.
pub(crate) fn trailing_rejections(assignment: &Assignment) -> usize {
    assignment
        .milestones
        .iter()
        .rev()
        .filter(|m| m.status != MilestoneStatus::NotStarted)
        .take_while(|m| m.status == MilestoneStatus::Rejected)
        .count()
}

pub(super) fn consecutive_rejections(
    assignment: &Assignment,
    t: &RuleThresholds,
) -> Option<Candidate> {
    let run = trailing_rejections(assignment);
    if run < t.consecutive_rejections {
        return None;
    }
    Some(Candidate::new(
        BaseAlertKind::ConsecutiveRejections,
        Severity::Critical,
        Some(assignment.agency_id.clone()),
        format!(
            "Agency {} had its last {} milestone submissions rejected",
            assignment.agency_id, run
        ),
        json!({ "streak": run }),
    ))
}

/// Non-terminal milestones whose due date satisfies `pred(days_until_due)`.
fn due_milestones<'a>(
    assignment: &'a Assignment,
    now: DateTime<Utc>,
    pred: impl Fn(i64) -> bool,
) -> Vec<(&'a str, i64)> {
    assignment
        .milestones
        .iter()
        .filter(|m| !m.status.is_terminal())
        .filter_map(|m| m.due_date.map(|due| (m.id.as_str(), days_until(due, now))))
        .filter(|(_, days)| pred(*days))
        .collect()
}

pub(super) fn milestone_due_soon(
    assignment: &Assignment,
    now: DateTime<Utc>,
    t: &RuleThresholds,
) -> Option<Candidate> {
    let due = due_milestones(assignment, now, |d| d > 0 && d <= t.milestone_due_window_days);
    let soonest = due.iter().map(|(_, d)| *d).min()?;
    let ids: Vec<&str> = due.iter().map(|(id, _)| *id).collect();
    Some(Candidate::new(
        BaseAlertKind::MilestoneDueSoon,
        Severity::Warning,
        Some(assignment.agency_id.clone()),
        format!(
            "{} milestone(s) due within {} day(s)",
            ids.len(),
            soonest
        ),
        json!({ "milestoneIds": ids, "soonestDays": soonest }),
    ))
}

pub(super) fn milestone_overdue(assignment: &Assignment, now: DateTime<Utc>) -> Option<Candidate> {
    let overdue = due_milestones(assignment, now, |d| d < 0);
    let worst = overdue.iter().map(|(_, d)| -d).max()?;
    let ids: Vec<&str> = overdue.iter().map(|(id, _)| *id).collect();
    Some(Candidate::new(
        BaseAlertKind::MilestoneOverdue,
        Severity::Critical,
        Some(assignment.agency_id.clone()),
        format!(
            "{} milestone(s) overdue, the oldest by {} day(s)",
            ids.len(),
            worst
        ),
        json!({ "milestoneIds": ids, "daysOverdue": worst }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecipientRole;
    use crate::evaluator::tests::{assignment, entity, milestone, now};
    use chrono::Duration;
    use MilestoneStatus::*;

    #[test]
    fn behind_schedule_gap_thresholds() {
        let t = RuleThresholds::default();
        // 50% elapsed.
        let e = entity();

        // 2 of 5 approved = 40%, gap 10: quiet.
        let a = assignment(
            "a1",
            vec![
                milestone("1", Approved),
                milestone("2", Approved),
                milestone("3", NotStarted),
                milestone("4", NotStarted),
                milestone("5", NotStarted),
            ],
        );
        assert!(behind_schedule(&e, &a, now(), &t).is_none());

        // 1 of 4 = 25%, gap 25: warning.
        let a = assignment(
            "a1",
            vec![
                milestone("1", Approved),
                milestone("2", NotStarted),
                milestone("3", NotStarted),
                milestone("4", NotStarted),
            ],
        );
        let c = behind_schedule(&e, &a, now(), &t).unwrap();
        assert_eq!(c.severity, Severity::Warning);
        assert_eq!(c.agency_id.as_deref(), Some("a1"));
        assert_eq!(c.recipient, RecipientRole::StateOfficer);

        // 0 of 2, gap 50: critical.
        let a = assignment("a1", vec![milestone("1", NotStarted), milestone("2", NotStarted)]);
        assert_eq!(behind_schedule(&e, &a, now(), &t).unwrap().severity, Severity::Critical);
    }

    #[test]
    fn behind_schedule_needs_dates_and_milestones() {
        let t = RuleThresholds::default();
        let mut e = entity();
        let empty = assignment("a1", vec![]);
        assert!(behind_schedule(&e, &empty, now(), &t).is_none());

        e.start_date = None;
        let a = assignment("a1", vec![milestone("1", NotStarted)]);
        assert!(behind_schedule(&e, &a, now(), &t).is_none());
    }

    #[test]
    fn rejection_rate_above_forty_percent() {
        let t = RuleThresholds::default();
        let a = assignment(
            "a1",
            vec![
                milestone("1", Rejected),
                milestone("2", Rejected),
                milestone("3", Rejected),
                milestone("4", Approved),
                milestone("5", PendingReview),
                milestone("6", NotStarted),
            ],
        );
        assert_eq!(rejection_counts(&a), (3, 5));
        let c = high_rejection_rate(&a, &t).unwrap();
        assert_eq!(c.severity, Severity::Warning);
        assert_eq!(c.metadata["rejected"], 3);
        assert_eq!(c.metadata["submitted"], 5);
    }

    #[test]
    fn rejection_rate_exactly_forty_is_quiet() {
        let t = RuleThresholds::default();
        let a = assignment(
            "a1",
            vec![
                milestone("1", Rejected),
                milestone("2", Rejected),
                milestone("3", Approved),
                milestone("4", Approved),
                milestone("5", PendingReview),
            ],
        );
        assert!(high_rejection_rate(&a, &t).is_none());
    }

    #[test]
    fn rejection_rate_without_submissions_is_quiet() {
        let t = RuleThresholds::default();
        let a = assignment("a1", vec![milestone("1", NotStarted)]);
        assert!(high_rejection_rate(&a, &t).is_none());
    }

    #[test]
    fn trailing_rejections_skip_unstarted_and_stop_at_other_statuses() {
        let a = assignment(
            "a1",
            vec![
                milestone("1", Rejected),
                milestone("2", Approved),
                milestone("3", Rejected),
                milestone("4", NotStarted),
                milestone("5", Rejected),
                milestone("6", NotStarted),
            ],
        );
        assert_eq!(trailing_rejections(&a), 2);

        let a = assignment(
            "a1",
            vec![milestone("1", Rejected), milestone("2", PendingReview)],
        );
        assert_eq!(trailing_rejections(&a), 0);
    }

    #[test]
    fn consecutive_rejections_fire_at_two() {
        let t = RuleThresholds::default();
        let a = assignment("a1", vec![milestone("1", Rejected), milestone("2", Rejected)]);
        let c = consecutive_rejections(&a, &t).unwrap();
        assert_eq!(c.severity, Severity::Critical);

        let a = assignment("a1", vec![milestone("1", Approved), milestone("2", Rejected)]);
        assert!(consecutive_rejections(&a, &t).is_none());
    }

    #[test]
    fn milestone_due_soon_and_overdue_go_to_agency() {
        let t = RuleThresholds::default();
        let mut soon = milestone("soon", NotStarted);
        soon.due_date = Some(now() + Duration::days(2));
        let mut late = milestone("late", Rejected);
        late.due_date = Some(now() - Duration::days(4));
        let mut done = milestone("done", Approved);
        done.due_date = Some(now() - Duration::days(10));
        let mut far = milestone("far", NotStarted);
        far.due_date = Some(now() + Duration::days(20));
        let a = assignment("a9", vec![soon, late, done, far]);

        let c = milestone_due_soon(&a, now(), &t).unwrap();
        assert_eq!(c.severity, Severity::Warning);
        assert_eq!(c.recipient, RecipientRole::AgencyContact("a9".to_string()));
        assert_eq!(c.metadata["milestoneIds"], json!(["soon"]));

        let c = milestone_overdue(&a, now()).unwrap();
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.metadata["milestoneIds"], json!(["late"]));
        assert_eq!(c.metadata["daysOverdue"], 4);
    }

    #[test]
    fn milestone_past_due_by_less_than_a_day_is_quiet() {
        let t = RuleThresholds::default();
        let mut just_missed = milestone("m1", NotStarted);
        just_missed.due_date = Some(now() - Duration::hours(20));
        let a = assignment("a1", vec![just_missed]);
        assert_eq!(days_until(now() - Duration::hours(20), now()), 0);
        assert!(milestone_due_soon(&a, now(), &t).is_none());
        assert!(milestone_overdue(&a, now()).is_none());

        // A full day late, it turns overdue.
        let later = now() + Duration::hours(5);
        let c = milestone_overdue(&a, later).unwrap();
        assert_eq!(c.metadata["daysOverdue"], 1);
    }

    #[test]
    fn milestone_due_later_today_is_due_soon() {
        let t = RuleThresholds::default();
        let mut today = milestone("m1", NotStarted);
        today.due_date = Some(now() + Duration::hours(3));
        let a = assignment("a1", vec![today]);
        let c = milestone_due_soon(&a, now(), &t).unwrap();
        assert_eq!(c.metadata["soonestDays"], 1);
        assert!(milestone_overdue(&a, now()).is_none());
    }

    #[test]
    fn approved_milestones_are_never_due() {
        let t = RuleThresholds::default();
        let mut done = milestone("done", Approved);
        done.due_date = Some(now() + Duration::days(1));
        let a = assignment("a1", vec![done]);
        assert!(milestone_due_soon(&a, now(), &t).is_none());
        assert!(milestone_overdue(&a, now()).is_none());
    }
}
