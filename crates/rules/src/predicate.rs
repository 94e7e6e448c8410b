//! Resolve predicates: does the condition behind an open alert still hold?
//!
//! Every rule resolves when its trigger no longer fires, except
//! `behind_schedule`, which keeps holding until the gap drops below the
//! lower resolve margin so an assignment hovering at the trigger line does
//! not open and close alerts on alternate runs.

use chrono::{DateTime, Utc};

use projwatch_core::{BaseAlertKind, Entity};

use crate::catalog::is_per_assignment;
use crate::error::EvaluationError;
use crate::evaluator::EntityEvaluator;
use crate::schedule::assignment_gap;

/// Whether the rule `kind` still fires for `entity` (scoped to `agency_id`).
///
/// Inactive entities and agencies no longer assigned never hold.
pub fn still_holds(
    evaluator: &EntityEvaluator,
    kind: BaseAlertKind,
    agency_id: Option<&str>,
    entity: &Entity,
    now: DateTime<Utc>,
) -> Result<bool, EvaluationError> {
    if !entity.is_active() {
        return Ok(false);
    }
    let assignment = match agency_id {
        Some(agency) => match entity.assignment(agency) {
            Some(a) => Some(a),
            None => return Ok(false),
        },
        None if is_per_assignment(kind) => return Ok(false),
        None => None,
    };

    if kind == BaseAlertKind::BehindSchedule {
        // Run validation even though the gap is computed directly.
        evaluator.evaluate_kind(kind, entity, now)?;
        let Some(assignment) = assignment else {
            return Ok(false);
        };
        let resolve_below = evaluator.thresholds().behind_schedule_resolve_gap;
        return Ok(assignment_gap(entity, assignment, now).is_some_and(|gap| gap >= resolve_below));
    }

    Ok(evaluator
        .evaluate_kind(kind, entity, now)?
        .iter()
        .any(|c| c.agency_id.as_deref() == agency_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::tests::{assignment, entity, milestone, now};
    use projwatch_core::{EntityStatus, MilestoneStatus::*};

    fn four_milestones(approved: usize) -> Vec<projwatch_core::Milestone> {
        (0..4)
            .map(|i| {
                let status = if i < approved { Approved } else { NotStarted };
                milestone(&i.to_string(), status)
            })
            .collect()
    }

    #[test]
    fn behind_schedule_uses_hysteresis() {
        let evaluator = EntityEvaluator::default();
        let mut e = entity(); // 50% expected

        // 1/4 approved: gap 25, fires.
        e.assignments.push(assignment("a1", four_milestones(1)));
        assert!(still_holds(&evaluator, BaseAlertKind::BehindSchedule, Some("a1"), &e, now()).unwrap());

        // Gap 12.5: below trigger (15) but above resolve margin (10): still holds.
        let mut ms = four_milestones(1);
        ms.push(milestone("x", Approved));
        ms.push(milestone("y", Approved));
        ms.push(milestone("z", NotStarted));
        ms.push(milestone("w", NotStarted));
        // 3 of 8 approved = 37.5%
        e.assignments[0].milestones = ms;
        assert!(evaluator
            .evaluate_kind(BaseAlertKind::BehindSchedule, &e, now())
            .unwrap()
            .is_empty());
        assert!(still_holds(&evaluator, BaseAlertKind::BehindSchedule, Some("a1"), &e, now()).unwrap());

        // 2/4 approved: gap 0, resolves.
        e.assignments[0].milestones = four_milestones(2);
        assert!(!still_holds(&evaluator, BaseAlertKind::BehindSchedule, Some("a1"), &e, now()).unwrap());
    }

    #[test]
    fn completed_entity_never_holds() {
        let evaluator = EntityEvaluator::default();
        let mut e = entity();
        e.status = EntityStatus::Completed;
        e.updated_at = now() - chrono::Duration::days(40);
        assert!(!still_holds(&evaluator, BaseAlertKind::InactiveEntity, None, &e, now()).unwrap());
    }

    #[test]
    fn removed_agency_never_holds() {
        let evaluator = EntityEvaluator::default();
        let mut e = entity();
        e.assignments.push(assignment("a1", vec![milestone("1", Rejected), milestone("2", Rejected)]));
        assert!(still_holds(&evaluator, BaseAlertKind::ConsecutiveRejections, Some("a1"), &e, now()).unwrap());
        assert!(!still_holds(&evaluator, BaseAlertKind::ConsecutiveRejections, Some("gone"), &e, now()).unwrap());
    }

    #[test]
    fn agency_scope_must_match() {
        let evaluator = EntityEvaluator::default();
        let mut e = entity();
        e.assignments.push(assignment("a1", vec![milestone("1", Approved)]));
        e.assignments.push(assignment("a2", vec![milestone("1", Rejected), milestone("2", Rejected)]));
        assert!(!still_holds(&evaluator, BaseAlertKind::ConsecutiveRejections, Some("a1"), &e, now()).unwrap());
        assert!(still_holds(&evaluator, BaseAlertKind::ConsecutiveRejections, Some("a2"), &e, now()).unwrap());
    }
}
