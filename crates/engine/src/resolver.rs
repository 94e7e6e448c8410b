//! Auto-resolver: close alerts whose condition no longer holds.
//!
//! Only direct-tier alerts are re-checked against their rule. Escalated
//! alerts close by cascade, when the alert they were escalated from is
//! auto-resolved. A sweep also closes escalations whose origin was resolved
//! in an earlier run that stopped before cascading.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use projwatch_core::{Alert, AlertId, Entity, EntityId, EscalationLevel};
use projwatch_rules::{predicate::still_holds, EntityEvaluator};

use crate::error::StoreError;
use crate::store::{AlertStore, EntityStore};

#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Direct alerts closed because their rule stopped firing.
    pub resolved: Vec<AlertId>,
    /// Escalated alerts closed by cascade.
    pub cascaded: Vec<AlertId>,
    pub errors: Vec<String>,
}

pub struct AutoResolver {
    alerts: Arc<dyn AlertStore>,
    entities: Arc<dyn EntityStore>,
    evaluator: EntityEvaluator,
}

impl AutoResolver {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        entities: Arc<dyn EntityStore>,
        evaluator: EntityEvaluator,
    ) -> Self {
        Self {
            alerts,
            entities,
            evaluator,
        }
    }

    /// Re-check every unresolved direct alert, snoozed ones included.
    ///
    /// Fails only when the list of unresolved alerts cannot be read.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ResolveReport, StoreError> {
        let unresolved = self.alerts.unresolved().await?;
        let mut report = ResolveReport::default();
        let mut snapshots: HashMap<EntityId, Option<Entity>> = HashMap::new();

        for alert in unresolved.iter().filter(|a| a.tier() == EscalationLevel::Direct) {
            let holds = match self.check(alert, &mut snapshots, now).await {
                Ok(holds) => holds,
                Err(msg) => {
                    warn!(alert_id = %alert.id, entity_id = %alert.entity_id, error = %msg, "Resolve check failed, leaving alert open");
                    report.errors.push(msg);
                    continue;
                }
            };
            if holds {
                continue;
            }
            match self.alerts.resolve(alert.id, now).await {
                Ok(true) => {
                    debug!(alert_id = %alert.id, alert_type = %alert.alert_type, "Alert auto-resolved");
                    report.resolved.push(alert.id);
                    self.cascade(alert.id, now, &mut report).await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "Failed to resolve alert");
                    report.errors.push(format!("resolve {}: {e}", alert.id));
                }
            }
        }

        self.sweep_orphans(&unresolved, now, &mut report).await;

        if !report.resolved.is_empty() || !report.cascaded.is_empty() {
            info!(
                resolved = report.resolved.len(),
                cascaded = report.cascaded.len(),
                "Auto-resolve pass complete"
            );
        }
        Ok(report)
    }

    async fn check(
        &self,
        alert: &Alert,
        snapshots: &mut HashMap<EntityId, Option<Entity>>,
        now: DateTime<Utc>,
    ) -> Result<bool, String> {
        if !snapshots.contains_key(&alert.entity_id) {
            let entity = self
                .entities
                .entity(&alert.entity_id)
                .await
                .map_err(|e| format!("load entity {}: {e}", alert.entity_id))?;
            snapshots.insert(alert.entity_id.clone(), entity);
        }
        // A missing entity cannot keep any condition alive.
        let Some(Some(entity)) = snapshots.get(&alert.entity_id) else {
            return Ok(false);
        };
        still_holds(
            &self.evaluator,
            alert.kind(),
            alert.agency_id.as_deref(),
            entity,
            now,
        )
        .map_err(|e| format!("{}: {e}", alert.id))
    }

    /// Resolve every unresolved descendant of `root`.
    async fn cascade(&self, root: AlertId, now: DateTime<Utc>, report: &mut ResolveReport) {
        let mut queue = VecDeque::from([root]);
        while let Some(parent) = queue.pop_front() {
            let children = match self.alerts.by_origin(parent).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(alert_id = %parent, error = %e, "Failed to list escalations");
                    report.errors.push(format!("cascade from {parent}: {e}"));
                    continue;
                }
            };
            for child in children.into_iter().filter(Alert::is_unresolved) {
                match self.alerts.resolve(child.id, now).await {
                    Ok(true) => {
                        debug!(alert_id = %child.id, origin = %parent, "Escalation resolved by cascade");
                        report.cascaded.push(child.id);
                        queue.push_back(child.id);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(alert_id = %child.id, error = %e, "Failed to cascade resolve");
                        report.errors.push(format!("cascade {}: {e}", child.id));
                    }
                }
            }
        }
    }

    /// Escalations left open although their origin is already auto-resolved.
    async fn sweep_orphans(&self, unresolved: &[Alert], now: DateTime<Utc>, report: &mut ResolveReport) {
        for alert in unresolved.iter().filter(|a| a.tier() > EscalationLevel::Direct) {
            let Some(origin) = alert.origin_alert_id else {
                continue;
            };
            let origin_resolved = match self.alerts.get(origin).await {
                Ok(Some(o)) => o.auto_resolved,
                Ok(None) => false,
                Err(e) => {
                    report.errors.push(format!("load origin {origin}: {e}"));
                    continue;
                }
            };
            if !origin_resolved {
                continue;
            }
            match self.alerts.resolve(alert.id, now).await {
                Ok(true) => {
                    report.cascaded.push(alert.id);
                    self.cascade(alert.id, now, report).await;
                }
                Ok(false) => {}
                Err(e) => report.errors.push(format!("resolve {}: {e}", alert.id)),
            }
        }
    }
}
