//! Run reports returned by the engine's batch operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::escalation::EscalationReport;
use crate::gate::GateReport;
use crate::resolver::ResolveReport;

/// Counts for one full cycle or escalation-only run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub entities_evaluated: usize,
    pub alerts_created: usize,
    pub duplicates_skipped: usize,
    pub status_changes: usize,
    pub alerts_resolved: usize,
    pub cascaded_resolutions: usize,
    /// New alerts created by escalation.
    pub escalations: usize,
    pub recipient_misses: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            entities_evaluated: 0,
            alerts_created: 0,
            duplicates_skipped: 0,
            status_changes: 0,
            alerts_resolved: 0,
            cascaded_resolutions: 0,
            escalations: 0,
            recipient_misses: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn absorb_gate(&mut self, report: GateReport) {
        self.alerts_created += report.created.len();
        self.duplicates_skipped += report.duplicates;
        self.recipient_misses += report.recipient_misses;
        self.errors.extend(report.errors);
    }

    pub(crate) fn absorb_resolve(&mut self, report: &ResolveReport) {
        self.alerts_resolved += report.resolved.len();
        self.cascaded_resolutions += report.cascaded.len();
        self.errors.extend(report.errors.iter().cloned());
    }

    pub(crate) fn absorb_escalation(&mut self, report: &EscalationReport) {
        self.escalations += report.created.len();
        self.recipient_misses += report.recipient_misses;
        self.errors.extend(report.errors.iter().cloned());
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Point-in-time view of the escalation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationStats {
    /// Open alerts by current escalation level.
    pub open_direct: usize,
    pub open_supervisory: usize,
    pub open_top: usize,
    /// Open direct alerts old enough for the next escalation pass.
    pub awaiting_supervisory: usize,
    /// Open supervisory alerts old enough for the next escalation pass.
    pub awaiting_admin: usize,
    pub snoozed: usize,
    pub acknowledged: usize,
    pub auto_resolved: usize,
    /// Alerts ever created by escalation.
    pub escalated_total: usize,
}
