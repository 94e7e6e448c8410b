//! Alert engine for monitored government projects.
//!
//! Wires the pure rule evaluator to the stores:
//! - [`gate`]: recipient lookup and deduplicated inserts
//! - [`resolver`]: auto-resolve with cascade to escalations
//! - [`escalation`]: time-based promotion up the hierarchy
//! - [`orchestrator`]: the batch runs tying them together
//!
//! Notifications are a side channel (see [`notifications`]) and never affect
//! what is persisted.

pub mod error;
pub mod escalation;
pub mod gate;
pub mod notifications;
pub mod orchestrator;
pub mod resolver;
pub mod store;
pub mod summary;

pub use error::{EngineError, StoreError};
pub use notifications::{AlertEvent, AlertNotifier};
pub use orchestrator::{AlertEngine, RunPhase};
pub use summary::{EscalationStats, RunSummary};
