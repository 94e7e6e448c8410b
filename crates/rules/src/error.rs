//! Errors raised while evaluating an entity snapshot.

use chrono::{DateTime, Utc};
use projwatch_core::EntityId;

/// Snapshot defects that make an entity unevaluable for this run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("entity {entity_id}: end date {end} precedes start date {start}")]
    InvalidSchedule {
        entity_id: EntityId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("entity {entity_id}: progress {progress} outside 0..=100")]
    ProgressOutOfRange { entity_id: EntityId, progress: f64 },
}
