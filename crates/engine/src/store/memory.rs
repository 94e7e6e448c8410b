//! In-memory alert store with optional JSON file persistence.
//!
//! All records sit behind one `RwLock`, so every conditioned write (dedup
//! insert, escalation step, acknowledge) is a single critical section. When a
//! path is configured the full record set is written to disk before the
//! in-memory state is swapped, so a failed write leaves the store unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use projwatch_core::{Alert, AlertId, EscalationLevel};

use super::{AlertStore, EscalationOutcome, EscalationRequest, InsertOutcome};
use crate::error::StoreError;

type Records = HashMap<AlertId, Alert>;

pub struct InMemoryAlertStore {
    alerts: RwLock<Records>,
    path: Option<PathBuf>,
}

impl InMemoryAlertStore {
    /// Volatile store, nothing touches disk.
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Store backed by `path`. Existing records are loaded and any whose
    /// level sits below its type's tier is repaired.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut records = HashMap::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let loaded: Vec<Alert> = if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            };
            for mut alert in loaded {
                if alert.normalize() {
                    warn!(
                        alert_id = %alert.id,
                        alert_type = %alert.alert_type,
                        level = %alert.escalation_level,
                        "Raised stored escalation level to match alert type"
                    );
                }
                records.insert(alert.id, alert);
            }
            debug!(count = records.len(), path = %path.display(), "Loaded alert store");
        }
        Ok(Self {
            alerts: RwLock::new(records),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.alerts.read().expect("alert store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<R>(&self, f: impl FnOnce(&Records) -> R) -> R {
        let guard = self.alerts.read().expect("alert store lock poisoned");
        f(&guard)
    }

    /// Apply `f` under the write lock. With a backing file, `f` runs on a
    /// copy that only replaces the live records once it is on disk.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Records) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.alerts.write().expect("alert store lock poisoned");
        match &self.path {
            None => f(&mut guard),
            Some(path) => {
                let mut next = guard.clone();
                let out = f(&mut next)?;
                write_snapshot(path, &next)?;
                *guard = next;
                Ok(out)
            }
        }
    }

    fn filtered(&self, pred: impl Fn(&Alert) -> bool) -> Vec<Alert> {
        self.read(|records| {
            let mut out: Vec<Alert> = records.values().filter(|a| pred(a)).cloned().collect();
            out.sort_by_key(|a| a.created_at);
            out
        })
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Write all records, oldest first, via a temp file and rename.
fn write_snapshot(path: &Path, records: &Records) -> Result<(), StoreError> {
    let mut alerts: Vec<&Alert> = records.values().collect();
    alerts.sort_by_key(|a| (a.created_at, a.id));
    let json = serde_json::to_string_pretty(&alerts)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn find_mut(records: &mut Records, id: AlertId) -> Result<&mut Alert, StoreError> {
    records.get_mut(&id).ok_or(StoreError::NotFound(id))
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn insert_if_no_open_duplicate(&self, alert: Alert) -> Result<InsertOutcome, StoreError> {
        let key = alert.dedup_key();
        let tier = alert.tier();
        self.mutate(|records| {
            let existing = records
                .values()
                .find(|a| a.is_unresolved() && a.tier() == tier && a.dedup_key() == key);
            if let Some(existing) = existing {
                return Ok(InsertOutcome::Duplicate(existing.id));
            }
            let id = alert.id;
            records.insert(id, alert);
            Ok(InsertOutcome::Inserted(id))
        })
    }

    async fn get(&self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        Ok(self.read(|records| records.get(&id).cloned()))
    }

    async fn all(&self) -> Result<Vec<Alert>, StoreError> {
        Ok(self.filtered(|_| true))
    }

    async fn unresolved(&self) -> Result<Vec<Alert>, StoreError> {
        Ok(self.filtered(Alert::is_unresolved))
    }

    async fn open_for_recipient(
        &self,
        recipient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(self.filtered(|a| a.recipient_id == recipient_id && a.is_open(now)))
    }

    async fn open_at_level_older_than(
        &self,
        level: EscalationLevel,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(self.filtered(|a| {
            a.is_open(now) && a.tier() == level && a.escalation_level == level && a.created_at <= cutoff
        }))
    }

    async fn by_origin(&self, origin: AlertId) -> Result<Vec<Alert>, StoreError> {
        Ok(self.filtered(|a| a.origin_alert_id == Some(origin)))
    }

    async fn acknowledge(
        &self,
        id: AlertId,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        self.mutate(|records| {
            let alert = find_mut(records, id)?;
            if alert.auto_resolved {
                return Err(StoreError::InvalidTransition {
                    id,
                    reason: "already auto-resolved".to_string(),
                });
            }
            if !alert.acknowledged {
                alert.acknowledged = true;
                alert.acknowledged_by = Some(by.to_string());
                alert.acknowledged_at = Some(now);
                alert.updated_at = now;
            }
            Ok(alert.clone())
        })
    }

    async fn snooze(
        &self,
        id: AlertId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        self.mutate(|records| {
            let alert = find_mut(records, id)?;
            if !alert.is_unresolved() {
                return Err(StoreError::InvalidTransition {
                    id,
                    reason: "cannot snooze a closed alert".to_string(),
                });
            }
            if until <= now {
                return Err(StoreError::InvalidTransition {
                    id,
                    reason: "snooze must end in the future".to_string(),
                });
            }
            alert.snoozed_until = Some(until);
            alert.updated_at = now;
            Ok(alert.clone())
        })
    }

    async fn resolve(&self, id: AlertId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        // Skip the disk write entirely when there is nothing to change.
        let needs_write = self.read(|records| records.get(&id).map(Alert::is_unresolved));
        match needs_write {
            None => return Err(StoreError::NotFound(id)),
            Some(false) => return Ok(false),
            Some(true) => {}
        }
        self.mutate(|records| {
            let alert = find_mut(records, id)?;
            if !alert.is_unresolved() {
                return Ok(false);
            }
            alert.auto_resolved = true;
            alert.resolved_at = Some(now);
            alert.updated_at = now;
            Ok(true)
        })
    }

    async fn escalate(
        &self,
        request: EscalationRequest,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome, StoreError> {
        if request.new_level <= request.expected_level {
            return Err(StoreError::InvalidTransition {
                id: request.source_id,
                reason: format!(
                    "escalation must move up, not {} -> {}",
                    request.expected_level, request.new_level
                ),
            });
        }
        self.mutate(|records| {
            let source = find_mut(records, request.source_id)?;
            if !source.is_open(now) || source.escalation_level != request.expected_level {
                return Ok(EscalationOutcome::Stale);
            }
            source.escalation_level = request.new_level;
            source.updated_at = now;

            let mut created = Vec::new();
            let mut skipped = 0;
            for child in request.children {
                let key = child.escalation_key();
                let already_open = records
                    .values()
                    .chain(created.iter())
                    .any(|a| a.is_unresolved() && a.escalation_key() == key);
                if already_open {
                    skipped += 1;
                    continue;
                }
                created.push(child);
            }
            for child in &created {
                records.insert(child.id, child.clone());
            }
            Ok(EscalationOutcome::Applied { created, skipped })
        })
    }
}
