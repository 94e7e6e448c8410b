//! Persistence gate: candidates in, deduplicated alerts out.
//!
//! Resolves each candidate's recipient role to concrete users, builds the
//! direct-tier alert, and hands it to the store's guarded insert. A failed
//! write is retried once; after that the alert is dropped for this run and
//! the next run will try again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use projwatch_core::{Alert, AlertType, Entity, UserId};
use projwatch_rules::{Candidate, RecipientRole};

use crate::error::StoreError;
use crate::store::{AlertStore, Directory, InsertOutcome};

/// What happened to one entity's candidates.
#[derive(Debug, Default)]
pub struct GateReport {
    pub created: Vec<Alert>,
    pub duplicates: usize,
    pub recipient_misses: usize,
    pub errors: Vec<String>,
}

pub struct PersistenceGate {
    alerts: Arc<dyn AlertStore>,
    directory: Arc<dyn Directory>,
}

impl PersistenceGate {
    pub fn new(alerts: Arc<dyn AlertStore>, directory: Arc<dyn Directory>) -> Self {
        Self { alerts, directory }
    }

    pub async fn admit(
        &self,
        entity: &Entity,
        candidates: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> GateReport {
        let mut report = GateReport::default();

        for candidate in candidates {
            let recipients = match self.recipients(entity, &candidate.recipient).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(entity_id = %entity.id, kind = %candidate.kind, error = %e, "Recipient lookup failed");
                    report.errors.push(format!("{}: recipient lookup for {}: {e}", entity.id, candidate.kind));
                    continue;
                }
            };
            if recipients.is_empty() {
                warn!(
                    entity_id = %entity.id,
                    kind = %candidate.kind,
                    role = ?candidate.recipient,
                    "No recipient configured, alert not created"
                );
                report.recipient_misses += 1;
                continue;
            }

            for recipient in recipients {
                let alert = Alert::new(
                    AlertType::direct(candidate.kind),
                    candidate.severity,
                    recipient,
                    entity.id.clone(),
                    candidate.agency_id.clone(),
                    candidate.message.clone(),
                    now,
                )
                .with_metadata(candidate.metadata.clone());

                match self.insert_with_retry(alert.clone()).await {
                    Ok(InsertOutcome::Inserted(_)) => {
                        debug!(
                            alert_id = %alert.id,
                            entity_id = %alert.entity_id,
                            alert_type = %alert.alert_type,
                            recipient = %alert.recipient_id,
                            "Alert created"
                        );
                        report.created.push(alert);
                    }
                    Ok(InsertOutcome::Duplicate(existing)) => {
                        debug!(
                            existing = %existing,
                            entity_id = %alert.entity_id,
                            alert_type = %alert.alert_type,
                            "Open alert already exists"
                        );
                        report.duplicates += 1;
                    }
                    Err(e) => {
                        warn!(
                            entity_id = %alert.entity_id,
                            alert_type = %alert.alert_type,
                            error = %e,
                            "Alert insert failed after retry"
                        );
                        report.errors.push(format!(
                            "{}: insert {} failed: {e}",
                            alert.entity_id, alert.alert_type
                        ));
                    }
                }
            }
        }
        report
    }

    async fn recipients(
        &self,
        entity: &Entity,
        role: &RecipientRole,
    ) -> Result<Vec<UserId>, StoreError> {
        match role {
            RecipientRole::AgencyContact(agency) => {
                Ok(self.directory.agency_contact(agency).await?.into_iter().collect())
            }
            RecipientRole::StateOfficer => {
                Ok(self.directory.state_officer(&entity.region).await?.into_iter().collect())
            }
            RecipientRole::CentralAdmins => self.directory.central_admins().await,
        }
    }

    async fn insert_with_retry(&self, alert: Alert) -> Result<InsertOutcome, StoreError> {
        match self.alerts.insert_if_no_open_duplicate(alert.clone()).await {
            Ok(outcome) => Ok(outcome),
            Err(first) => {
                warn!(alert_id = %alert.id, error = %first, "Alert insert failed, retrying once");
                self.alerts.insert_if_no_open_duplicate(alert).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryAlertStore, StaticDirectory};
    use chrono::TimeZone;
    use projwatch_core::{BaseAlertKind, EntityStatus, Severity};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap()
    }

    fn entity() -> Entity {
        Entity {
            id: "e1".to_string(),
            name: "Bridge".to_string(),
            region: "north".to_string(),
            status: EntityStatus::OnTrack,
            progress: 50.0,
            budget: 0.0,
            start_date: None,
            end_date: None,
            updated_at: now(),
            assignments: Vec::new(),
        }
    }

    fn candidate(kind: BaseAlertKind, recipient: RecipientRole, agency: Option<&str>) -> Candidate {
        Candidate {
            kind,
            severity: Severity::Critical,
            recipient,
            agency_id: agency.map(str::to_string),
            message: "m".to_string(),
            metadata: json!({}),
        }
    }

    fn gate(dir: StaticDirectory) -> (PersistenceGate, Arc<InMemoryAlertStore>) {
        let store = Arc::new(InMemoryAlertStore::new());
        (PersistenceGate::new(store.clone(), Arc::new(dir)), store)
    }

    #[tokio::test]
    async fn routes_to_agency_contact_and_dedups() {
        let (gate, store) = gate(StaticDirectory::new().with_agency_contact("a1", "contact-1"));
        let c = candidate(
            BaseAlertKind::MilestoneOverdue,
            RecipientRole::AgencyContact("a1".to_string()),
            Some("a1"),
        );

        let report = gate.admit(&entity(), vec![c.clone()], now()).await;
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].recipient_id, "contact-1");

        let report = gate.admit(&entity(), vec![c], now()).await;
        assert!(report.created.is_empty());
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn fans_out_to_every_admin() {
        let (gate, store) = gate(
            StaticDirectory::new()
                .with_central_admin("admin-1")
                .with_central_admin("admin-2"),
        );
        let c = candidate(BaseAlertKind::SlowReview, RecipientRole::CentralAdmins, None);
        let report = gate.admit(&entity(), vec![c.clone()], now()).await;
        assert_eq!(report.created.len(), 2);

        let report = gate.admit(&entity(), vec![c], now()).await;
        assert_eq!(report.duplicates, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn missing_officer_is_a_recipient_miss() {
        let (gate, store) = gate(StaticDirectory::new());
        let c = candidate(BaseAlertKind::InactiveEntity, RecipientRole::StateOfficer, None);
        let report = gate.admit(&entity(), vec![c], now()).await;
        assert_eq!(report.recipient_misses, 1);
        assert!(report.errors.is_empty());
        assert!(store.is_empty());
    }
}
