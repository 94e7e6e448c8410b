//! Alert model: rule kinds, escalation tiers, and the persisted alert record.
//!
//! The escalation tier is structural. The prefixed type string
//! (`escalated_deadline_approaching`) exists only on the wire, and parsing it
//! strips prefixes until the base rule name is reached.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{AgencyId, EntityId, UserId};
use crate::error::CoreError;

pub type AlertId = Uuid;

// ── Severity ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// ── Rule kinds ────────────────────────────────────────────────

/// Rule identifier with every escalation prefix removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseAlertKind {
    DeadlineApproaching,
    InactiveEntity,
    SlowReview,
    BehindSchedule,
    HighRejectionRate,
    ConsecutiveRejections,
    MilestoneDueSoon,
    MilestoneOverdue,
}

impl BaseAlertKind {
    pub const ALL: [BaseAlertKind; 8] = [
        BaseAlertKind::DeadlineApproaching,
        BaseAlertKind::InactiveEntity,
        BaseAlertKind::SlowReview,
        BaseAlertKind::BehindSchedule,
        BaseAlertKind::HighRejectionRate,
        BaseAlertKind::ConsecutiveRejections,
        BaseAlertKind::MilestoneDueSoon,
        BaseAlertKind::MilestoneOverdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseAlertKind::DeadlineApproaching => "deadline_approaching",
            BaseAlertKind::InactiveEntity => "inactive_entity",
            BaseAlertKind::SlowReview => "slow_review",
            BaseAlertKind::BehindSchedule => "behind_schedule",
            BaseAlertKind::HighRejectionRate => "high_rejection_rate",
            BaseAlertKind::ConsecutiveRejections => "consecutive_rejections",
            BaseAlertKind::MilestoneDueSoon => "milestone_due_soon",
            BaseAlertKind::MilestoneOverdue => "milestone_overdue",
        }
    }

    /// Rules delivered to every central admin; each admin holds their own copy.
    pub fn fans_out(&self) -> bool {
        matches!(self, BaseAlertKind::SlowReview)
    }
}

impl fmt::Display for BaseAlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseAlertKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseAlertKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAlertType(s.to_string()))
    }
}

// ── Escalation tiers ──────────────────────────────────────────

/// Tier in the recipient hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EscalationLevel {
    /// Agency contact or the rule's direct recipient.
    Direct = 0,
    /// State officer for the entity's region.
    Supervisory = 1,
    /// Central administrators.
    Top = 2,
}

impl EscalationLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<EscalationLevel> {
        match self {
            EscalationLevel::Direct => Some(EscalationLevel::Supervisory),
            EscalationLevel::Supervisory => Some(EscalationLevel::Top),
            EscalationLevel::Top => None,
        }
    }

    pub fn type_prefix(self) -> &'static str {
        match self {
            EscalationLevel::Direct => "",
            EscalationLevel::Supervisory => "escalated_",
            EscalationLevel::Top => "admin_escalated_",
        }
    }
}

impl From<EscalationLevel> for u8 {
    fn from(level: EscalationLevel) -> u8 {
        level.as_u8()
    }
}

impl TryFrom<u8> for EscalationLevel {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EscalationLevel::Direct),
            1 => Ok(EscalationLevel::Supervisory),
            2 => Ok(EscalationLevel::Top),
            other => Err(CoreError::InvalidLevel(other)),
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ── Alert type ────────────────────────────────────────────────

/// Base rule plus the tier the alert was created at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AlertType {
    pub base: BaseAlertKind,
    pub tier: EscalationLevel,
}

impl AlertType {
    pub fn direct(base: BaseAlertKind) -> Self {
        Self {
            base,
            tier: EscalationLevel::Direct,
        }
    }

    pub fn at_tier(base: BaseAlertKind, tier: EscalationLevel) -> Self {
        Self { base, tier }
    }

    /// Parse a prefixed type string, stripping prefixes until stable.
    ///
    /// Stacked prefixes (`escalated_escalated_x`) collapse; the highest tier
    /// seen wins.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let mut rest = s;
        let mut tier = EscalationLevel::Direct;
        loop {
            if let Some(stripped) = rest.strip_prefix(EscalationLevel::Top.type_prefix()) {
                tier = tier.max(EscalationLevel::Top);
                rest = stripped;
            } else if let Some(stripped) =
                rest.strip_prefix(EscalationLevel::Supervisory.type_prefix())
            {
                tier = tier.max(EscalationLevel::Supervisory);
                rest = stripped;
            } else {
                break;
            }
        }
        let base = rest
            .parse::<BaseAlertKind>()
            .map_err(|_| CoreError::UnknownAlertType(s.to_string()))?;
        Ok(Self { base, tier })
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tier.type_prefix(), self.base.as_str())
    }
}

impl From<AlertType> for String {
    fn from(t: AlertType) -> String {
        t.to_string()
    }
}

impl TryFrom<String> for AlertType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AlertType::parse(&value)
    }
}

// ── Keys ──────────────────────────────────────────────────────

/// Identity used by the persistence gate to refuse duplicates.
///
/// `recipient` is only populated for fan-out rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub entity_id: EntityId,
    pub kind: BaseAlertKind,
    pub agency_id: Option<AgencyId>,
    pub recipient: Option<UserId>,
}

/// Identity used by the escalation engine to refuse duplicate promotions.
///
/// Scoped to the agency so two agencies tripping the same rule on one entity
/// each get their own escalation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EscalationKey {
    pub recipient_id: UserId,
    pub entity_id: EntityId,
    pub agency_id: Option<AgencyId>,
    pub alert_type: AlertType,
    pub escalation_level: EscalationLevel,
}

// ── Alert ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub recipient_id: UserId,
    pub entity_id: EntityId,
    #[serde(default)]
    pub agency_id: Option<AgencyId>,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Alert this one was escalated from.
    #[serde(default)]
    pub origin_alert_id: Option<AlertId>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_by: Option<UserId>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub snoozed_until: Option<DateTime<Utc>>,
    pub escalation_level: EscalationLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Create a fresh alert at its type's tier.
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        recipient_id: impl Into<UserId>,
        entity_id: impl Into<EntityId>,
        agency_id: Option<AgencyId>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            recipient_id: recipient_id.into(),
            entity_id: entity_id.into(),
            agency_id,
            message: message.into(),
            metadata: serde_json::Value::Null,
            origin_alert_id: None,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            auto_resolved: false,
            resolved_at: None,
            snoozed_until: None,
            escalation_level: alert_type.tier,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_origin(mut self, origin: AlertId) -> Self {
        self.origin_alert_id = Some(origin);
        self
    }

    pub fn kind(&self) -> BaseAlertKind {
        self.alert_type.base
    }

    pub fn tier(&self) -> EscalationLevel {
        self.alert_type.tier
    }

    /// Neither acknowledged nor auto-resolved. Snoozed alerts count.
    pub fn is_unresolved(&self) -> bool {
        !self.acknowledged && !self.auto_resolved
    }

    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }

    /// Unresolved and not under an active snooze.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_unresolved() && !self.is_snoozed(now)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            entity_id: self.entity_id.clone(),
            kind: self.kind(),
            agency_id: self.agency_id.clone(),
            recipient: self
                .kind()
                .fans_out()
                .then(|| self.recipient_id.clone()),
        }
    }

    pub fn escalation_key(&self) -> EscalationKey {
        EscalationKey {
            recipient_id: self.recipient_id.clone(),
            entity_id: self.entity_id.clone(),
            agency_id: self.agency_id.clone(),
            alert_type: self.alert_type,
            escalation_level: self.escalation_level,
        }
    }

    /// Repair a record whose stored level sits below the tier encoded in its
    /// type. The level is raised, never lowered.
    pub fn normalize(&mut self) -> bool {
        if self.escalation_level < self.tier() {
            self.escalation_level = self.tier();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn alert_type_display_uses_tier_prefix() {
        let t = AlertType::at_tier(BaseAlertKind::MilestoneOverdue, EscalationLevel::Supervisory);
        assert_eq!(t.to_string(), "escalated_milestone_overdue");
        let t = AlertType::at_tier(BaseAlertKind::MilestoneOverdue, EscalationLevel::Top);
        assert_eq!(t.to_string(), "admin_escalated_milestone_overdue");
    }

    #[test]
    fn alert_type_parse_strips_until_stable() {
        let t = AlertType::parse("escalated_escalated_behind_schedule").unwrap();
        assert_eq!(t.base, BaseAlertKind::BehindSchedule);
        assert_eq!(t.tier, EscalationLevel::Supervisory);

        let t = AlertType::parse("escalated_admin_escalated_slow_review").unwrap();
        assert_eq!(t.base, BaseAlertKind::SlowReview);
        assert_eq!(t.tier, EscalationLevel::Top);
    }

    #[test]
    fn alert_type_parse_rejects_unknown() {
        assert!(AlertType::parse("escalated_budget_blown").is_err());
    }

    #[test]
    fn alert_serializes_prefixed_type_and_numeric_level() {
        let alert = Alert::new(
            AlertType::at_tier(BaseAlertKind::DeadlineApproaching, EscalationLevel::Supervisory),
            Severity::Critical,
            "officer-1",
            "e1",
            None,
            "deadline",
            now(),
        );
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "escalated_deadline_approaching");
        assert_eq!(json["escalationLevel"], 1);
        assert_eq!(json["severity"], "critical");

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back.alert_type, alert.alert_type);
    }

    #[test]
    fn normalize_raises_level_to_tier() {
        let mut alert = Alert::new(
            AlertType::at_tier(BaseAlertKind::SlowReview, EscalationLevel::Top),
            Severity::Critical,
            "admin-1",
            "e1",
            None,
            "slow",
            now(),
        );
        alert.escalation_level = EscalationLevel::Direct;
        assert!(alert.normalize());
        assert_eq!(alert.escalation_level, EscalationLevel::Top);
        assert!(!alert.normalize());
    }

    #[test]
    fn snoozed_alert_is_unresolved_but_not_open() {
        let mut alert = Alert::new(
            AlertType::direct(BaseAlertKind::InactiveEntity),
            Severity::Critical,
            "officer-1",
            "e1",
            None,
            "idle",
            now(),
        );
        alert.snoozed_until = Some(now() + Duration::hours(4));
        assert!(alert.is_unresolved());
        assert!(!alert.is_open(now()));
        assert!(alert.is_open(now() + Duration::hours(5)));
    }

    #[test]
    fn dedup_key_includes_recipient_only_for_fan_out() {
        let a = Alert::new(
            AlertType::direct(BaseAlertKind::SlowReview),
            Severity::Warning,
            "admin-1",
            "e1",
            None,
            "slow",
            now(),
        );
        assert_eq!(a.dedup_key().recipient.as_deref(), Some("admin-1"));

        let b = Alert::new(
            AlertType::direct(BaseAlertKind::BehindSchedule),
            Severity::Warning,
            "officer-1",
            "e1",
            Some("agency-1".to_string()),
            "behind",
            now(),
        );
        assert!(b.dedup_key().recipient.is_none());
    }

    #[test]
    fn escalation_key_separates_agencies() {
        let escalated = |agency: &str| {
            Alert::new(
                AlertType::at_tier(BaseAlertKind::MilestoneOverdue, EscalationLevel::Supervisory),
                Severity::Critical,
                "officer-1",
                "e1",
                Some(agency.to_string()),
                "escalated",
                now(),
            )
        };
        let roads = escalated("roads");
        let water = escalated("water");
        assert_ne!(roads.escalation_key(), water.escalation_key());
        assert_eq!(roads.escalation_key(), escalated("roads").escalation_key());
    }
}
