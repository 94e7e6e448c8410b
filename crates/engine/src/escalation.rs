//! Time-based escalation of unaddressed alerts.
//!
//! Two steps, each applied atomically per source alert:
//!
//! | From | Condition | Creates |
//! |------|-----------|---------|
//! | level 0 direct alert | open, has an agency, older than `supervisory_after` | `escalated_*` for the region's state officer |
//! | level 1 `escalated_*` alert | open, older than `admin_after` | `admin_escalated_*` for every central admin |
//!
//! The source's level moves up in the same store operation that creates the
//! new alerts. When no recipient exists the source is left untouched so a
//! later run can retry once the directory is fixed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use projwatch_core::config::EscalationConfig;
use projwatch_core::{Alert, AlertType, EscalationLevel, Severity, UserId};

use crate::error::StoreError;
use crate::store::{AlertStore, Directory, EntityStore, EscalationOutcome, EscalationRequest};

#[derive(Debug, Default)]
pub struct EscalationReport {
    pub created: Vec<Alert>,
    /// Sources promoted to supervisory level.
    pub supervisory: usize,
    /// Sources promoted to top level.
    pub admin: usize,
    /// Children not created because the same escalation was already open.
    pub skipped_existing: usize,
    /// Sources that changed underneath the pass (acknowledged, snoozed, moved).
    pub stale: usize,
    pub recipient_misses: usize,
    pub errors: Vec<String>,
}

pub struct EscalationEngine {
    alerts: Arc<dyn AlertStore>,
    entities: Arc<dyn EntityStore>,
    directory: Arc<dyn Directory>,
    config: EscalationConfig,
}

impl EscalationEngine {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        entities: Arc<dyn EntityStore>,
        directory: Arc<dyn Directory>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            alerts,
            entities,
            directory,
            config,
        }
    }

    /// Run both steps. Top-level escalation runs first so an alert promoted
    /// to supervisory in this pass is not immediately promoted again.
    pub async fn run(&self, now: DateTime<Utc>) -> EscalationReport {
        let mut report = EscalationReport::default();
        if let Err(e) = self.escalate_to_admins(now, &mut report).await {
            warn!(error = %e, "Top-level escalation pass failed");
            report.errors.push(format!("admin escalation: {e}"));
        }
        if let Err(e) = self.escalate_to_officers(now, &mut report).await {
            warn!(error = %e, "Supervisory escalation pass failed");
            report.errors.push(format!("supervisory escalation: {e}"));
        }
        if report.supervisory + report.admin > 0 {
            info!(
                supervisory = report.supervisory,
                admin = report.admin,
                created = report.created.len(),
                "Escalation pass complete"
            );
        }
        report
    }

    /// Cutoff creation time for a step.
    pub fn cutoff(&self, level: EscalationLevel, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let after = match level {
            EscalationLevel::Direct => self.config.supervisory_after,
            EscalationLevel::Supervisory => self.config.admin_after,
            EscalationLevel::Top => return None,
        };
        chrono::Duration::from_std(after).ok().map(|d| now - d)
    }

    async fn escalate_to_officers(
        &self,
        now: DateTime<Utc>,
        report: &mut EscalationReport,
    ) -> Result<(), StoreError> {
        let Some(cutoff) = self.cutoff(EscalationLevel::Direct, now) else {
            return Ok(());
        };
        let due = self
            .alerts
            .open_at_level_older_than(EscalationLevel::Direct, cutoff, now)
            .await?;

        for source in due.into_iter().filter(|a| a.agency_id.is_some()) {
            let region = match self.entities.entity(&source.entity_id).await {
                Ok(Some(entity)) if entity.is_active() => entity.region,
                Ok(_) => {
                    debug!(alert_id = %source.id, entity_id = %source.entity_id, "Entity gone or inactive, not escalating");
                    continue;
                }
                Err(e) => {
                    report.errors.push(format!("load entity {}: {e}", source.entity_id));
                    continue;
                }
            };
            let officer = match self.directory.state_officer(&region).await {
                Ok(Some(officer)) => officer,
                Ok(None) => {
                    warn!(alert_id = %source.id, region = %region, "No state officer for region, escalation deferred");
                    report.recipient_misses += 1;
                    continue;
                }
                Err(e) => {
                    report.errors.push(format!("officer lookup for {region}: {e}"));
                    continue;
                }
            };

            let child = child_alert(&source, EscalationLevel::Supervisory, officer, now);
            self.apply(&source, EscalationLevel::Supervisory, vec![child], now, report)
                .await;
        }
        Ok(())
    }

    async fn escalate_to_admins(
        &self,
        now: DateTime<Utc>,
        report: &mut EscalationReport,
    ) -> Result<(), StoreError> {
        let Some(cutoff) = self.cutoff(EscalationLevel::Supervisory, now) else {
            return Ok(());
        };
        let due = self
            .alerts
            .open_at_level_older_than(EscalationLevel::Supervisory, cutoff, now)
            .await?;
        if due.is_empty() {
            return Ok(());
        }
        let admins = self.directory.central_admins().await?;

        for source in due {
            if admins.is_empty() {
                warn!(alert_id = %source.id, "No central admins configured, escalation deferred");
                report.recipient_misses += 1;
                continue;
            }
            let children = admins
                .iter()
                .map(|admin| child_alert(&source, EscalationLevel::Top, admin.clone(), now))
                .collect();
            self.apply(&source, EscalationLevel::Top, children, now, report)
                .await;
        }
        Ok(())
    }

    async fn apply(
        &self,
        source: &Alert,
        new_level: EscalationLevel,
        children: Vec<Alert>,
        now: DateTime<Utc>,
        report: &mut EscalationReport,
    ) {
        let request = EscalationRequest {
            source_id: source.id,
            expected_level: source.escalation_level,
            new_level,
            children,
        };
        match self.alerts.escalate(request, now).await {
            Ok(EscalationOutcome::Applied { created, skipped }) => {
                debug!(
                    alert_id = %source.id,
                    level = %new_level,
                    created = created.len(),
                    skipped,
                    "Alert escalated"
                );
                match new_level {
                    EscalationLevel::Supervisory => report.supervisory += 1,
                    _ => report.admin += 1,
                }
                report.skipped_existing += skipped;
                report.created.extend(created);
            }
            Ok(EscalationOutcome::Stale) => {
                debug!(alert_id = %source.id, "Alert changed before escalation, skipped");
                report.stale += 1;
            }
            Err(e) => {
                warn!(alert_id = %source.id, error = %e, "Escalation write failed");
                report.errors.push(format!("escalate {}: {e}", source.id));
            }
        }
    }
}

/// Build the alert a step creates for one recipient.
fn child_alert(source: &Alert, level: EscalationLevel, recipient: UserId, now: DateTime<Utc>) -> Alert {
    let label = match level {
        EscalationLevel::Top => "Escalated to central administration",
        _ => "Escalated",
    };
    let waited_hours = source.age(now).num_hours();
    Alert::new(
        AlertType::at_tier(source.kind(), level),
        Severity::Critical,
        recipient,
        source.entity_id.clone(),
        source.agency_id.clone(),
        format!("{label}: {} (unaddressed for {waited_hours}h)", source.message),
        now,
    )
    .with_origin(source.id)
    .with_metadata(json!({
        "originAlertId": source.id,
        "originRecipientId": source.recipient_id,
        "originCreatedAt": source.created_at,
        "originSeverity": source.severity,
        "originMetadata": source.metadata,
    }))
}
