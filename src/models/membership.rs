use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a user holds inside one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Caller,
    Contact,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Caller => "caller",
            Self::Contact => "contact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "caller" => Some(Self::Caller),
            "contact" => Some(Self::Contact),
            _ => None,
        }
    }

    /// Roles allowed to hold contacts.
    pub fn can_work_contacts(&self) -> bool {
        matches!(self, Self::Admin | Self::Caller)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(project_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self {
            project_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Caller"), Some(Role::Caller));
        assert_eq!(Role::parse("contact"), Some(Role::Contact));
        assert_eq!(Role::parse("regular"), None);
    }

    #[test]
    fn test_can_work_contacts() {
        assert!(Role::Admin.can_work_contacts());
        assert!(Role::Caller.can_work_contacts());
        assert!(!Role::Contact.can_work_contacts());
    }
}
