//! Error types for stores and the engine.

use projwatch_core::AlertId;

/// Errors surfaced by entity, directory, and alert stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("alert not found: {0}")]
    NotFound(AlertId),

    /// A conditioned update found the alert in a state that forbids it.
    #[error("alert {id}: {reason}")]
    InvalidTransition { id: AlertId, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort a batch run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The entity store could not list active entities at all.
    #[error("entity store unreachable: {0}")]
    EntityStoreUnavailable(#[source] StoreError),

    /// Another run holds the run-level lock.
    #[error("a batch run is already in progress")]
    RunInProgress,

    #[error(transparent)]
    Store(#[from] StoreError),
}
