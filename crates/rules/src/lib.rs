//! Rule catalog and pure entity evaluator for project alerts.
//!
//! This crate provides:
//! - The rule catalog: eight timeliness/quality rules with their recipients
//! - A pure evaluator turning an entity snapshot and a clock into candidates
//! - Resolve predicates (with hysteresis) used by the auto-resolver
//! - The entity status side-effect (OnTrack <-> Delayed)
//! - Cron/interval helpers for scheduling batch runs

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod predicate;
pub mod schedule;
pub mod scheduler;
pub mod status;

pub use catalog::{Candidate, RecipientRole};
pub use error::EvaluationError;
pub use evaluator::EntityEvaluator;
