//! Rules evaluated once per entity.

use chrono::{DateTime, Utc};
use serde_json::json;

use projwatch_core::config::RuleThresholds;
use projwatch_core::{BaseAlertKind, Entity, MilestoneStatus, Severity};

use crate::catalog::Candidate;
use crate::schedule::{days_since, days_until};

pub(super) fn deadline_approaching(
    entity: &Entity,
    now: DateTime<Utc>,
    t: &RuleThresholds,
) -> Option<Candidate> {
    let end = entity.end_date?;
    let days = days_until(end, now);
    if days <= 0 || days > t.deadline_window_days || entity.progress >= t.deadline_progress_floor {
        return None;
    }
    Some(Candidate::new(
        BaseAlertKind::DeadlineApproaching,
        Severity::Critical,
        None,
        format!(
            "Project '{}' ends in {} day(s) but is only {:.0}% complete",
            entity.name, days, entity.progress
        ),
        json!({ "daysUntil": days, "progress": entity.progress, "endDate": end }),
    ))
}

pub(super) fn inactive_entity(
    entity: &Entity,
    now: DateTime<Utc>,
    t: &RuleThresholds,
) -> Option<Candidate> {
    let last = entity.last_activity();
    let idle = days_since(last, now);
    if idle < t.inactivity_days {
        return None;
    }
    Some(Candidate::new(
        BaseAlertKind::InactiveEntity,
        Severity::Critical,
        None,
        format!("Project '{}' has had no activity for {} days", entity.name, idle),
        json!({ "daysInactive": idle, "lastActivity": last }),
    ))
}

pub(super) fn slow_review(
    entity: &Entity,
    now: DateTime<Utc>,
    t: &RuleThresholds,
) -> Option<Candidate> {
    // Oldest submission still waiting on a reviewer.
    let (milestone, submitted_at) = entity
        .milestones()
        .filter(|m| m.status == MilestoneStatus::PendingReview)
        .filter_map(|m| m.submitted_at.map(|at| (m, at)))
        .min_by_key(|(_, at)| *at)?;

    let pending = days_since(submitted_at, now);
    if pending <= t.slow_review_days {
        return None;
    }
    let severity = if pending > t.slow_review_critical_days {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(Candidate::new(
        BaseAlertKind::SlowReview,
        severity,
        None,
        format!(
            "Milestone '{}' on project '{}' has waited {} days for review",
            milestone.text, entity.name, pending
        ),
        json!({ "milestoneId": milestone.id, "pendingDays": pending }),
    ))
}
