//! Entity status side-effect: OnTrack <-> Delayed.

use chrono::{DateTime, Utc};

use projwatch_core::config::RuleThresholds;
use projwatch_core::{Entity, EntityStatus};

use crate::schedule::entity_gap;

/// Whole-entity behind-schedule check, on the entity's own progress.
pub fn is_behind_schedule(entity: &Entity, now: DateTime<Utc>, t: &RuleThresholds) -> bool {
    entity_gap(entity, now).is_some_and(|gap| gap > t.behind_schedule_gap)
}

/// The status the entity should move to, or `None` when it is already right.
///
/// Only OnTrack and Delayed flip; PendingApproval and Completed are owned by
/// other workflows.
pub fn status_transition(
    entity: &Entity,
    now: DateTime<Utc>,
    t: &RuleThresholds,
) -> Option<EntityStatus> {
    let behind = is_behind_schedule(entity, now, t);
    match (entity.status, behind) {
        (EntityStatus::OnTrack, true) => Some(EntityStatus::Delayed),
        (EntityStatus::Delayed, false) => Some(EntityStatus::OnTrack),
        _ => None,
    }
}
