//! Rule catalog: who receives each rule and what the evaluator emits.

use projwatch_core::{AgencyId, BaseAlertKind, Severity};
use serde::Serialize;

/// Role a candidate is addressed to. Concrete users are looked up later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "scope")]
pub enum RecipientRole {
    /// Contact person of the given agency.
    AgencyContact(AgencyId),
    /// Officer responsible for the entity's region.
    StateOfficer,
    /// Every active central administrator.
    CentralAdmins,
}

/// Default recipient role for a rule, scoped to an agency where relevant.
pub fn recipient_for(kind: BaseAlertKind, agency_id: Option<&AgencyId>) -> RecipientRole {
    match (kind, agency_id) {
        (BaseAlertKind::SlowReview, _) => RecipientRole::CentralAdmins,
        (BaseAlertKind::MilestoneDueSoon | BaseAlertKind::MilestoneOverdue, Some(agency)) => {
            RecipientRole::AgencyContact(agency.clone())
        }
        _ => RecipientRole::StateOfficer,
    }
}

/// Whether a rule is evaluated once per assignment rather than per entity.
pub fn is_per_assignment(kind: BaseAlertKind) -> bool {
    matches!(
        kind,
        BaseAlertKind::BehindSchedule
            | BaseAlertKind::HighRejectionRate
            | BaseAlertKind::ConsecutiveRejections
            | BaseAlertKind::MilestoneDueSoon
            | BaseAlertKind::MilestoneOverdue
    )
}

/// An alert the evaluator wants to exist, before dedup and recipient lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub kind: BaseAlertKind,
    pub severity: Severity,
    pub recipient: RecipientRole,
    pub agency_id: Option<AgencyId>,
    pub message: String,
    pub metadata: serde_json::Value,
}

impl Candidate {
    pub(crate) fn new(
        kind: BaseAlertKind,
        severity: Severity,
        agency_id: Option<AgencyId>,
        message: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            severity,
            recipient: recipient_for(kind, agency_id.as_ref()),
            agency_id,
            message,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestone_rules_go_to_agency_contact() {
        let agency = "agency-7".to_string();
        assert_eq!(
            recipient_for(BaseAlertKind::MilestoneOverdue, Some(&agency)),
            RecipientRole::AgencyContact(agency.clone())
        );
        assert_eq!(
            recipient_for(BaseAlertKind::BehindSchedule, Some(&agency)),
            RecipientRole::StateOfficer
        );
    }

    #[test]
    fn slow_review_goes_to_central_admins() {
        assert_eq!(
            recipient_for(BaseAlertKind::SlowReview, None),
            RecipientRole::CentralAdmins
        );
    }

    #[test]
    fn per_assignment_rules() {
        assert!(is_per_assignment(BaseAlertKind::HighRejectionRate));
        assert!(!is_per_assignment(BaseAlertKind::InactiveEntity));
        assert!(!is_per_assignment(BaseAlertKind::SlowReview));
    }
}
