use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit trail entry for a contact. `performed_by` is `None` for sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactLog {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub action: String,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ContactLog {
    pub fn new(contact_id: Uuid, action: String, performed_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_id,
            action,
            performed_by,
            created_at: Utc::now(),
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
