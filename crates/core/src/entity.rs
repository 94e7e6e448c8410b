use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EntityId = String;
pub type AgencyId = String;
pub type MilestoneId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    PendingApproval,
    OnTrack,
    Delayed,
    Completed,
}

impl EntityStatus {
    /// Completed entities drop out of every evaluation pass.
    pub fn is_active(&self) -> bool {
        !matches!(self, EntityStatus::Completed)
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityStatus::PendingApproval => write!(f, "PendingApproval"),
            EntityStatus::OnTrack => write!(f, "OnTrack"),
            EntityStatus::Delayed => write!(f, "Delayed"),
            EntityStatus::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    NotStarted,
    PendingReview,
    Approved,
    Rejected,
}

impl MilestoneStatus {
    /// Approved milestones need no further action from anyone.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MilestoneStatus::Approved)
    }

    /// Anything the agency has handed in at least once.
    pub fn is_submitted(&self) -> bool {
        !matches!(self, MilestoneStatus::NotStarted)
    }
}

/// A trackable unit of work inside an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: MilestoneId,
    pub text: String,
    pub status: MilestoneStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Link between an entity and the agency executing part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub agency_id: AgencyId,
    #[serde(default)]
    pub allocated_funds: f64,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Assignment {
    /// Share of milestones approved, in percent. Zero when nothing is planned.
    pub fn actual_progress(&self) -> f64 {
        if self.milestones.is_empty() {
            return 0.0;
        }
        let approved = self
            .milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Approved)
            .count();
        approved as f64 / self.milestones.len() as f64 * 100.0
    }
}

/// A monitored project snapshot as loaded from the entity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    /// Region (state) used to route alerts to the responsible officer.
    pub region: String,
    pub status: EntityStatus,
    /// Self-reported completion, 0..=100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl Entity {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn assignment(&self, agency_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.agency_id == agency_id)
    }

    /// Every milestone across all assignments.
    pub fn milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.assignments.iter().flat_map(|a| a.milestones.iter())
    }

    /// Most recent sign of life: the entity's own update or any milestone
    /// submission/review.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.milestones()
            .flat_map(|m| [m.submitted_at, m.reviewed_at])
            .flatten()
            .fold(self.updated_at, |latest, t| latest.max(t))
    }
}
