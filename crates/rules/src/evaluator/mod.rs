//! Pure entity evaluator.
//!
//! Turns one entity snapshot plus a clock into the list of alerts that should
//! currently exist for it. No I/O, no shared state: every call is a function
//! of `(entity, now, thresholds)`, so entities can be evaluated in parallel.
//!
//! Rules are split by scope:
//! - **Entity rules**: deadline, inactivity, slow review
//! - **Assignment rules**: schedule gap, rejection rate/streak, milestone dates

mod assignment_rules;
mod entity_rules;

use chrono::{DateTime, Utc};

use projwatch_core::config::RuleThresholds;
use projwatch_core::{BaseAlertKind, Entity};

use crate::catalog::Candidate;
use crate::error::EvaluationError;

// ── Evaluator ───────────────────────────────────────────────────────

/// Evaluates the rule catalog against entity snapshots.
#[derive(Debug, Clone, Default)]
pub struct EntityEvaluator {
    thresholds: RuleThresholds,
}

impl EntityEvaluator {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Evaluate every rule in the catalog.
    ///
    /// Completed entities yield nothing. Malformed snapshots are reported as
    /// errors so the caller can skip the entity without aborting the batch.
    pub fn evaluate(
        &self,
        entity: &Entity,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, EvaluationError> {
        let mut out = Vec::new();
        for kind in BaseAlertKind::ALL {
            out.extend(self.evaluate_kind(kind, entity, now)?);
        }
        Ok(out)
    }

    /// Evaluate a single rule.
    pub fn evaluate_kind(
        &self,
        kind: BaseAlertKind,
        entity: &Entity,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, EvaluationError> {
        if !entity.is_active() {
            return Ok(Vec::new());
        }
        validate(entity)?;

        let t = &self.thresholds;
        let candidates = match kind {
            BaseAlertKind::DeadlineApproaching => {
                entity_rules::deadline_approaching(entity, now, t).into_iter().collect()
            }
            BaseAlertKind::InactiveEntity => {
                entity_rules::inactive_entity(entity, now, t).into_iter().collect()
            }
            BaseAlertKind::SlowReview => {
                entity_rules::slow_review(entity, now, t).into_iter().collect()
            }
            BaseAlertKind::BehindSchedule => entity
                .assignments
                .iter()
                .filter_map(|a| assignment_rules::behind_schedule(entity, a, now, t))
                .collect(),
            BaseAlertKind::HighRejectionRate => entity
                .assignments
                .iter()
                .filter_map(|a| assignment_rules::high_rejection_rate(a, t))
                .collect(),
            BaseAlertKind::ConsecutiveRejections => entity
                .assignments
                .iter()
                .filter_map(|a| assignment_rules::consecutive_rejections(a, t))
                .collect(),
            BaseAlertKind::MilestoneDueSoon => entity
                .assignments
                .iter()
                .filter_map(|a| assignment_rules::milestone_due_soon(a, now, t))
                .collect(),
            BaseAlertKind::MilestoneOverdue => entity
                .assignments
                .iter()
                .filter_map(|a| assignment_rules::milestone_overdue(a, now))
                .collect(),
        };
        Ok(candidates)
    }
}

fn validate(entity: &Entity) -> Result<(), EvaluationError> {
    if !(0.0..=100.0).contains(&entity.progress) {
        return Err(EvaluationError::ProgressOutOfRange {
            entity_id: entity.id.clone(),
            progress: entity.progress,
        });
    }
    if let (Some(start), Some(end)) = (entity.start_date, entity.end_date) {
        if end < start {
            return Err(EvaluationError::InvalidSchedule {
                entity_id: entity.id.clone(),
                start,
                end,
            });
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::RecipientRole;
    use chrono::{Duration, TimeZone};
    use projwatch_core::{Assignment, EntityStatus, Milestone, MilestoneStatus, Severity};

    pub(crate) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap()
    }

    pub(crate) fn entity() -> Entity {
        Entity {
            id: "e1".to_string(),
            name: "Bridge".to_string(),
            region: "north".to_string(),
            status: EntityStatus::OnTrack,
            progress: 50.0,
            budget: 1_000_000.0,
            start_date: Some(now() - Duration::days(50)),
            end_date: Some(now() + Duration::days(50)),
            updated_at: now(),
            assignments: Vec::new(),
        }
    }

    pub(crate) fn milestone(id: &str, status: MilestoneStatus) -> Milestone {
        Milestone {
            id: id.to_string(),
            text: format!("milestone {id}"),
            status,
            due_date: None,
            submitted_at: status.is_submitted().then(now),
            reviewed_at: None,
        }
    }

    pub(crate) fn assignment(agency: &str, milestones: Vec<Milestone>) -> Assignment {
        Assignment {
            agency_id: agency.to_string(),
            allocated_funds: 100.0,
            milestones,
        }
    }

    fn kinds(candidates: &[Candidate]) -> Vec<BaseAlertKind> {
        candidates.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn healthy_entity_yields_nothing() {
        let evaluator = EntityEvaluator::default();
        assert!(evaluator.evaluate(&entity(), now()).unwrap().is_empty());
    }

    #[test]
    fn deadline_five_days_out_at_half_progress() {
        let mut e = entity();
        e.start_date = Some(now() - Duration::days(95));
        e.end_date = Some(now() + Duration::days(5));
        e.progress = 50.0;

        let candidates = EntityEvaluator::default()
            .evaluate_kind(BaseAlertKind::DeadlineApproaching, &e, now())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].severity, Severity::Critical);
        assert_eq!(candidates[0].recipient, RecipientRole::StateOfficer);
        assert_eq!(candidates[0].agency_id, None);
    }

    #[test]
    fn completed_entity_is_never_evaluated() {
        let mut e = entity();
        e.status = EntityStatus::Completed;
        e.updated_at = now() - Duration::days(100);
        assert!(EntityEvaluator::default().evaluate(&e, now()).unwrap().is_empty());
    }

    #[test]
    fn inverted_schedule_is_an_error() {
        let mut e = entity();
        e.end_date = Some(now() - Duration::days(60));
        let err = EntityEvaluator::default().evaluate(&e, now()).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidSchedule { .. }));
    }

    #[test]
    fn progress_out_of_range_is_an_error() {
        let mut e = entity();
        e.progress = 140.0;
        let err = EntityEvaluator::default().evaluate(&e, now()).unwrap_err();
        assert!(matches!(err, EvaluationError::ProgressOutOfRange { .. }));
    }

    #[test]
    fn evaluate_combines_entity_and_assignment_rules() {
        let mut e = entity();
        e.updated_at = now() - Duration::days(20);
        e.assignments.push(assignment(
            "a1",
            vec![
                milestone("m1", MilestoneStatus::NotStarted),
                milestone("m2", MilestoneStatus::NotStarted),
            ],
        ));

        let candidates = EntityEvaluator::default().evaluate(&e, now()).unwrap();
        let kinds = kinds(&candidates);
        // 50% expected vs 0% approved on a1.
        assert!(kinds.contains(&BaseAlertKind::BehindSchedule));
        assert!(kinds.contains(&BaseAlertKind::InactiveEntity));
        assert!(!kinds.contains(&BaseAlertKind::DeadlineApproaching));
    }
}
