use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a contact stands in the calling workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Pending,
    Contacted,
    FollowUp,
    NotInterested,
    Completed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::FollowUp => "follow_up",
            Self::NotInterested => "not_interested",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "contacted" => Some(Self::Contacted),
            "follow_up" => Some(Self::FollowUp),
            "not_interested" => Some(Self::NotInterested),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Statuses a caller still has work to do on.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Contacted | Self::FollowUp)
    }
}

/// A lead inside a project, the unit of assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub project_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub assigned_caller: Option<Uuid>,
    pub call_status: CallStatus,
    /// Pre-assigned at import time; exempt from the 24h reassignment
    /// until it decays.
    pub is_special: bool,
    pub last_call_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(project_id: Uuid, full_name: String, phone: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            full_name,
            phone,
            assigned_caller: None,
            call_status: CallStatus::default(),
            is_special: false,
            last_call_date: None,
            is_active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_caller.is_some()
    }

    pub fn is_held_by(&self, user_id: Uuid) -> bool {
        self.assigned_caller == Some(user_id)
    }
}
