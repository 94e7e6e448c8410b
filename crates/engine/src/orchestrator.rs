//! Batch orchestrator.
//!
//! One full cycle runs three phases in order:
//!
//! 1. **Evaluating**: every active entity in parallel (bounded), each one
//!    evaluated, status-corrected, and passed through the persistence gate
//! 2. **Resolving**: unresolved alerts re-checked, closed ones cascaded
//! 3. **Escalating**: aged alerts promoted up the hierarchy
//!
//! Runs are serialized by an async mutex: a second caller waits for the
//! first to finish, or gets [`EngineError::RunInProgress`] from the `try_`
//! variants. Notifications go out on spawned tasks after each phase persists.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use projwatch_core::config::Config;
use projwatch_core::{Alert, AlertId, Entity, EscalationLevel};
use projwatch_rules::status::status_transition;
use projwatch_rules::EntityEvaluator;

use crate::error::{EngineError, StoreError};
use crate::escalation::EscalationEngine;
use crate::gate::{GateReport, PersistenceGate};
use crate::notifications::{AlertEvent, AlertNotifier};
use crate::resolver::AutoResolver;
use crate::store::{AlertStore, Directory, EntityStore};
use crate::summary::{EscalationStats, RunSummary};

// ── Phase tracking ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Evaluating,
    Resolving,
    Escalating,
}

/// Resets the phase to Idle when a run ends, however it ends.
struct PhaseGuard<'a> {
    phase: &'a RwLock<RunPhase>,
}

impl PhaseGuard<'_> {
    fn set(&self, next: RunPhase) {
        *self.phase.write().expect("phase lock poisoned") = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.set(RunPhase::Idle);
    }
}

#[derive(Debug, Default)]
struct EntityOutcome {
    evaluated: bool,
    status_changed: bool,
    gate: GateReport,
    errors: Vec<String>,
}

// ── Engine ────────────────────────────────────────────────────

pub struct AlertEngine {
    entities: Arc<dyn EntityStore>,
    alerts: Arc<dyn AlertStore>,
    evaluator: EntityEvaluator,
    gate: PersistenceGate,
    resolver: AutoResolver,
    escalation: EscalationEngine,
    max_concurrency: usize,
    notifier: Option<AlertNotifier>,
    run_lock: tokio::sync::Mutex<()>,
    phase: RwLock<RunPhase>,
}

impl AlertEngine {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        directory: Arc<dyn Directory>,
        alerts: Arc<dyn AlertStore>,
        config: &Config,
    ) -> Self {
        let evaluator = EntityEvaluator::new(config.rules.clone());
        Self {
            gate: PersistenceGate::new(alerts.clone(), directory.clone()),
            resolver: AutoResolver::new(alerts.clone(), entities.clone(), evaluator.clone()),
            escalation: EscalationEngine::new(
                alerts.clone(),
                entities.clone(),
                directory,
                config.escalation.clone(),
            ),
            entities,
            alerts,
            evaluator,
            max_concurrency: config.engine.max_concurrency.max(1),
            notifier: None,
            run_lock: tokio::sync::Mutex::new(()),
            phase: RwLock::new(RunPhase::Idle),
        }
    }

    pub fn with_notifier(mut self, notifier: AlertNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.read().expect("phase lock poisoned")
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    fn enter(&self, phase: RunPhase) -> PhaseGuard<'_> {
        let guard = PhaseGuard { phase: &self.phase };
        guard.set(phase);
        guard
    }

    fn notify(&self, alerts: &[Alert], event: AlertEvent, now: DateTime<Utc>) {
        if let Some(notifier) = &self.notifier {
            // Detached: delivery outcome is only logged.
            let _ = notifier.spawn(alerts.to_vec(), event, now);
        }
    }

    // ── Full cycle ────────────────────────────────────────────

    pub async fn run_full_cycle(&self) -> Result<RunSummary, EngineError> {
        self.run_full_cycle_at(Utc::now()).await
    }

    /// Full cycle against a fixed clock. Waits for any run in progress.
    ///
    /// Fails only when the entity store cannot list active entities; every
    /// other problem is logged and counted in the summary.
    pub async fn run_full_cycle_at(&self, now: DateTime<Utc>) -> Result<RunSummary, EngineError> {
        let _run = self.run_lock.lock().await;
        self.full_cycle_locked(now).await
    }

    /// Like [`run_full_cycle_at`](Self::run_full_cycle_at) but refuses to wait.
    pub async fn try_run_full_cycle_at(&self, now: DateTime<Utc>) -> Result<RunSummary, EngineError> {
        let _run = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        self.full_cycle_locked(now).await
    }

    async fn full_cycle_locked(&self, now: DateTime<Utc>) -> Result<RunSummary, EngineError> {
        let clock = Instant::now();
        let mut summary = RunSummary::new(now);
        let phase = self.enter(RunPhase::Evaluating);

        let entities = self
            .entities
            .active_entities()
            .await
            .map_err(EngineError::EntityStoreUnavailable)?;
        info!(entities = entities.len(), concurrency = self.max_concurrency, "Evaluating entities");

        let outcomes: Vec<EntityOutcome> = stream::iter(entities)
            .map(|entity| self.process_entity(entity, now))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut created = Vec::new();
        for outcome in outcomes {
            summary.entities_evaluated += usize::from(outcome.evaluated);
            summary.status_changes += usize::from(outcome.status_changed);
            summary.errors.extend(outcome.errors);
            created.extend(outcome.gate.created.iter().cloned());
            summary.absorb_gate(outcome.gate);
        }
        self.notify(&created, AlertEvent::Created, now);

        phase.set(RunPhase::Resolving);
        match self.resolver.run(now).await {
            Ok(report) => summary.absorb_resolve(&report),
            Err(e) => {
                warn!(error = %e, "Auto-resolve pass failed");
                summary.errors.push(format!("auto-resolve: {e}"));
            }
        }

        phase.set(RunPhase::Escalating);
        let report = self.escalation.run(now).await;
        summary.absorb_escalation(&report);
        self.notify(&report.created, AlertEvent::Escalated, now);

        summary.duration_ms = clock.elapsed().as_millis() as u64;
        info!(
            entities = summary.entities_evaluated,
            created = summary.alerts_created,
            duplicates = summary.duplicates_skipped,
            status_changes = summary.status_changes,
            resolved = summary.alerts_resolved,
            cascaded = summary.cascaded_resolutions,
            escalations = summary.escalations,
            recipient_misses = summary.recipient_misses,
            errors = summary.errors.len(),
            duration_ms = summary.duration_ms,
            "Full cycle complete"
        );
        Ok(summary)
    }

    async fn process_entity(&self, mut entity: Entity, now: DateTime<Utc>) -> EntityOutcome {
        let mut outcome = EntityOutcome::default();

        // Status is written after evaluation, not before alert generation.
        // No rule reads OnTrack vs Delayed, so the candidates are identical in
        // either order, and a snapshot that fails validation keeps its status.
        let candidates = match self.evaluator.evaluate(&entity, now) {
            Ok(c) => c,
            Err(e) => {
                warn!(entity_id = %entity.id, error = %e, "Skipping entity");
                outcome.errors.push(e.to_string());
                return outcome;
            }
        };
        outcome.evaluated = true;

        if let Some(next) = status_transition(&entity, now, self.evaluator.thresholds()) {
            match self.entities.set_status(&entity.id, next).await {
                Ok(()) => {
                    info!(entity_id = %entity.id, from = %entity.status, to = %next, "Entity status updated");
                    entity.status = next;
                    outcome.status_changed = true;
                }
                Err(e) => {
                    warn!(entity_id = %entity.id, error = %e, "Status update failed");
                    outcome.errors.push(format!("{}: status update: {e}", entity.id));
                }
            }
        }

        outcome.gate = self.gate.admit(&entity, candidates, now).await;
        outcome
    }

    // ── Escalation only ───────────────────────────────────────

    pub async fn run_escalation_only(&self) -> RunSummary {
        self.run_escalation_only_at(Utc::now()).await
    }

    pub async fn run_escalation_only_at(&self, now: DateTime<Utc>) -> RunSummary {
        let _run = self.run_lock.lock().await;
        let clock = Instant::now();
        let _phase = self.enter(RunPhase::Escalating);

        let mut summary = RunSummary::new(now);
        let report = self.escalation.run(now).await;
        summary.absorb_escalation(&report);
        self.notify(&report.created, AlertEvent::Escalated, now);

        summary.duration_ms = clock.elapsed().as_millis() as u64;
        info!(
            escalations = summary.escalations,
            stale = report.stale,
            recipient_misses = summary.recipient_misses,
            errors = summary.errors.len(),
            "Escalation run complete"
        );
        summary
    }

    // ── Read side & operator actions ──────────────────────────

    pub async fn escalation_stats(&self) -> Result<EscalationStats, StoreError> {
        self.escalation_stats_at(Utc::now()).await
    }

    pub async fn escalation_stats_at(&self, now: DateTime<Utc>) -> Result<EscalationStats, StoreError> {
        let alerts = self.alerts.all().await?;
        let supervisory_cutoff = self.escalation.cutoff(EscalationLevel::Direct, now);
        let admin_cutoff = self.escalation.cutoff(EscalationLevel::Supervisory, now);
        let due = |a: &Alert, cutoff: Option<DateTime<Utc>>| cutoff.is_some_and(|c| a.created_at <= c);

        let mut stats = EscalationStats::default();
        for alert in &alerts {
            if alert.tier() > EscalationLevel::Direct {
                stats.escalated_total += 1;
            }
            if alert.acknowledged {
                stats.acknowledged += 1;
            }
            if alert.auto_resolved {
                stats.auto_resolved += 1;
            }
            if !alert.is_unresolved() {
                continue;
            }
            if alert.is_snoozed(now) {
                stats.snoozed += 1;
                continue;
            }
            match alert.escalation_level {
                EscalationLevel::Direct => {
                    stats.open_direct += 1;
                    if alert.agency_id.is_some() && due(alert, supervisory_cutoff) {
                        stats.awaiting_supervisory += 1;
                    }
                }
                EscalationLevel::Supervisory => {
                    stats.open_supervisory += 1;
                    if alert.tier() == EscalationLevel::Supervisory && due(alert, admin_cutoff) {
                        stats.awaiting_admin += 1;
                    }
                }
                EscalationLevel::Top => stats.open_top += 1,
            }
        }
        Ok(stats)
    }

    pub async fn open_alerts_for(
        &self,
        recipient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError> {
        self.alerts.open_for_recipient(recipient_id, now).await
    }

    pub async fn acknowledge(
        &self,
        id: AlertId,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        let alert = self.alerts.acknowledge(id, by, now).await?;
        info!(alert_id = %id, by, "Alert acknowledged");
        Ok(alert)
    }

    pub async fn snooze(
        &self,
        id: AlertId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        let alert = self.alerts.snooze(id, until, now).await?;
        info!(alert_id = %id, until = %until, "Alert snoozed");
        Ok(alert)
    }
}
