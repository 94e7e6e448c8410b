//! Store seams the engine talks to.
//!
//! - [`EntityStore`]: project snapshots and the status side-effect
//! - [`Directory`]: who receives what (agency contacts, officers, admins)
//! - [`AlertStore`]: alert records with the conditioned writes the
//!   dedup and escalation invariants rely on
//!
//! In-memory implementations live in [`memory`] and [`entities`]; the alert
//! store can persist itself to a JSON file.

pub mod entities;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use projwatch_core::{
    Alert, AlertId, Entity, EntityStatus, EscalationLevel, UserId,
};

use crate::error::StoreError;

pub use entities::{InMemoryEntityStore, SharedDirectory, StaticDirectory};
pub use memory::InMemoryAlertStore;

// ── Entities & directory ──────────────────────────────────────

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Every entity whose status is not Completed.
    async fn active_entities(&self) -> Result<Vec<Entity>, StoreError>;

    async fn entity(&self, id: &str) -> Result<Option<Entity>, StoreError>;

    async fn set_status(&self, id: &str, status: EntityStatus) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn agency_contact(&self, agency_id: &str) -> Result<Option<UserId>, StoreError>;

    async fn state_officer(&self, region: &str) -> Result<Option<UserId>, StoreError>;

    async fn central_admins(&self) -> Result<Vec<UserId>, StoreError>;
}

// ── Alerts ────────────────────────────────────────────────────

/// Result of a guarded insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(AlertId),
    /// An unresolved alert with the same dedup key already exists.
    Duplicate(AlertId),
}

/// One escalation step, applied atomically by [`AlertStore::escalate`].
#[derive(Debug, Clone)]
pub struct EscalationRequest {
    pub source_id: AlertId,
    /// Level the source must still be at for the step to apply.
    pub expected_level: EscalationLevel,
    pub new_level: EscalationLevel,
    /// Alerts to create, each at `new_level`.
    pub children: Vec<Alert>,
}

#[derive(Debug, Clone)]
pub enum EscalationOutcome {
    Applied {
        created: Vec<Alert>,
        /// Children dropped because an identical escalation was already open.
        skipped: usize,
    },
    /// The source was acknowledged, resolved, snoozed, or already moved on.
    Stale,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert unless an unresolved alert with the same dedup key and tier
    /// exists. Check and insert happen under one lock.
    async fn insert_if_no_open_duplicate(&self, alert: Alert) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, id: AlertId) -> Result<Option<Alert>, StoreError>;

    async fn all(&self) -> Result<Vec<Alert>, StoreError>;

    /// Neither acknowledged nor auto-resolved, snoozed or not.
    async fn unresolved(&self) -> Result<Vec<Alert>, StoreError>;

    async fn open_for_recipient(
        &self,
        recipient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError>;

    /// Open alerts whose tier and level both equal `level` and that were
    /// created at or before `cutoff`.
    async fn open_at_level_older_than(
        &self,
        level: EscalationLevel,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError>;

    async fn by_origin(&self, origin: AlertId) -> Result<Vec<Alert>, StoreError>;

    async fn acknowledge(
        &self,
        id: AlertId,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError>;

    async fn snooze(
        &self,
        id: AlertId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError>;

    /// Mark an unresolved alert auto-resolved. Returns `false` when it was
    /// already acknowledged or resolved.
    async fn resolve(&self, id: AlertId, now: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn escalate(
        &self,
        request: EscalationRequest,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome, StoreError>;
}
