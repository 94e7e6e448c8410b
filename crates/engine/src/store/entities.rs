//! Snapshot-backed entity store and a static recipient directory.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use projwatch_core::{AgencyId, Entity, EntityId, EntityStatus, UserId};

use super::{Directory, EntityStore};
use crate::error::StoreError;

// ── Entities ──────────────────────────────────────────────────

/// Entities held in memory, usually loaded from a JSON array on disk.
pub struct InMemoryEntityStore {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
}

impl InMemoryEntityStore {
    pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: RwLock::new(entities.into_iter().map(|e| (e.id.clone(), e)).collect()),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let entities: Vec<Entity> = serde_json::from_str(&content)?;
        Ok(Self::new(entities))
    }

    /// Insert or replace a snapshot.
    pub fn upsert(&self, entity: Entity) {
        self.entities
            .write()
            .expect("entity store lock poisoned")
            .insert(entity.id.clone(), entity);
    }

    /// Apply an in-place edit to one entity, if present.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Entity)) -> bool {
        let mut entities = self.entities.write().expect("entity store lock poisoned");
        match entities.get_mut(id) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<Entity> {
        self.entities
            .read()
            .expect("entity store lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Write the current snapshots back out, e.g. after status updates.
    pub fn save_json_file(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn active_entities(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .entities
            .read()
            .expect("entity store lock poisoned")
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect())
    }

    async fn entity(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .entities
            .read()
            .expect("entity store lock poisoned")
            .get(id)
            .cloned())
    }

    async fn set_status(&self, id: &str, status: EntityStatus) -> Result<(), StoreError> {
        if self.update(id, |e| e.status = status) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("entity {id} not found")))
        }
    }
}

// ── Directory ─────────────────────────────────────────────────

/// Fixed recipient lookup tables.
///
/// ```json
/// {
///   "agencyContacts": { "roads-agency": "user-17" },
///   "stateOfficers": { "north": "officer-north" },
///   "centralAdmins": ["admin-1", "admin-2"]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticDirectory {
    #[serde(default)]
    pub agency_contacts: HashMap<AgencyId, UserId>,
    /// Keyed by region.
    #[serde(default)]
    pub state_officers: HashMap<String, UserId>,
    #[serde(default)]
    pub central_admins: Vec<UserId>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_agency_contact(mut self, agency: impl Into<AgencyId>, user: impl Into<UserId>) -> Self {
        self.agency_contacts.insert(agency.into(), user.into());
        self
    }

    pub fn with_state_officer(mut self, region: impl Into<String>, user: impl Into<UserId>) -> Self {
        self.state_officers.insert(region.into(), user.into());
        self
    }

    pub fn with_central_admin(mut self, user: impl Into<UserId>) -> Self {
        self.central_admins.push(user.into());
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn agency_contact(&self, agency_id: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self.agency_contacts.get(agency_id).cloned())
    }

    async fn state_officer(&self, region: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self.state_officers.get(region).cloned())
    }

    async fn central_admins(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.central_admins.clone())
    }
}

/// Directory whose contents can change between runs, e.g. an officer being
/// appointed after an escalation already failed to find one.
pub struct SharedDirectory {
    inner: RwLock<StaticDirectory>,
}

impl SharedDirectory {
    pub fn new(directory: StaticDirectory) -> Self {
        Self {
            inner: RwLock::new(directory),
        }
    }

    pub fn replace(&self, directory: StaticDirectory) {
        *self.inner.write().expect("directory lock poisoned") = directory;
    }

    fn current(&self) -> StaticDirectory {
        self.inner.read().expect("directory lock poisoned").clone()
    }
}

#[async_trait]
impl Directory for SharedDirectory {
    async fn agency_contact(&self, agency_id: &str) -> Result<Option<UserId>, StoreError> {
        self.current().agency_contact(agency_id).await
    }

    async fn state_officer(&self, region: &str) -> Result<Option<UserId>, StoreError> {
        self.current().state_officer(region).await
    }

    async fn central_admins(&self) -> Result<Vec<UserId>, StoreError> {
        self.current().central_admins().await
    }
}
