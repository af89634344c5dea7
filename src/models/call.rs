use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CallStatus;

/// What came of a call, as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResult {
    Answered,
    NoAnswer,
    Busy,
    Unreachable,
    WrongNumber,
    NotInterested,
    CallbackRequested,
    Interested,
    NoTime,
}

impl CallResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
            Self::Unreachable => "unreachable",
            Self::WrongNumber => "wrong_number",
            Self::NotInterested => "not_interested",
            Self::CallbackRequested => "callback_requested",
            Self::Interested => "interested",
            Self::NoTime => "no_time",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "answered" => Some(Self::Answered),
            "no_answer" => Some(Self::NoAnswer),
            "busy" => Some(Self::Busy),
            "unreachable" => Some(Self::Unreachable),
            "wrong_number" => Some(Self::WrongNumber),
            "not_interested" => Some(Self::NotInterested),
            "callback_requested" => Some(Self::CallbackRequested),
            "interested" => Some(Self::Interested),
            "no_time" => Some(Self::NoTime),
            _ => None,
        }
    }

    /// Contact status this result moves the contact to. `None` leaves the
    /// contact's status as it was.
    pub fn contact_status(&self) -> Option<CallStatus> {
        match self {
            Self::Answered => Some(CallStatus::Contacted),
            Self::CallbackRequested => Some(CallStatus::FollowUp),
            Self::NotInterested | Self::WrongNumber => Some(CallStatus::NotInterested),
            _ => None,
        }
    }
}

/// Line state of the call itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Pending,
    Answered,
    NoAnswer,
    WrongNumber,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Answered => "answered",
            Self::NoAnswer => "no_answer",
            Self::WrongNumber => "wrong_number",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "answered" => Self::Answered,
            "no_answer" => Self::NoAnswer,
            "wrong_number" => Self::WrongNumber,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub caller_id: Uuid,
    pub project_id: Uuid,
    pub result: Option<CallResult>,
    pub status: CallState,
    pub duration: Option<u32>,
    pub notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub call_date: DateTime<Utc>,
    pub is_editable: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub edited_by: Option<Uuid>,
    pub edit_reason: Option<String>,
    /// JSON snapshot of the fields as they were before the first edit.
    pub original_data: Option<String>,
}

impl Call {
    pub fn new(contact_id: Uuid, caller_id: Uuid, project_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_id,
            caller_id,
            project_id,
            result: None,
            status: CallState::default(),
            duration: None,
            notes: None,
            follow_up_required: false,
            follow_up_date: None,
            call_date: Utc::now(),
            is_editable: true,
            edited_at: None,
            edited_by: None,
            edit_reason: None,
            original_data: None,
        }
    }

    /// Values captured into `original_data` on the first edit.
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            result: self.result,
            notes: self.notes.clone(),
            duration: self.duration,
            follow_up_required: self.follow_up_required,
            follow_up_date: self.follow_up_date,
        }
    }

    pub fn original(&self) -> Option<CallSnapshot> {
        self.original_data
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub result: Option<CallResult>,
    pub notes: Option<String>,
    pub duration: Option<u32>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
}

/// Fields an edit may change. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallChanges {
    pub result: Option<CallResult>,
    pub notes: Option<String>,
    pub duration: Option<u32>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<DateTime<Utc>>,
}

/// One changed field of one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdit {
    pub id: Uuid,
    pub call_id: Uuid,
    pub edited_by: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub edit_reason: Option<String>,
    pub edited_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_to_contact_status_table() {
        assert_eq!(CallResult::Answered.contact_status(), Some(CallStatus::Contacted));
        assert_eq!(
            CallResult::CallbackRequested.contact_status(),
            Some(CallStatus::FollowUp)
        );
        assert_eq!(
            CallResult::NotInterested.contact_status(),
            Some(CallStatus::NotInterested)
        );
        assert_eq!(
            CallResult::WrongNumber.contact_status(),
            Some(CallStatus::NotInterested)
        );
        assert_eq!(CallResult::NoAnswer.contact_status(), None);
        assert_eq!(CallResult::Busy.contact_status(), None);
    }

    #[test]
    fn test_snapshot_json() {
        let mut call = Call::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        call.result = Some(CallResult::NoAnswer);
        call.duration = Some(42);
        call.original_data = Some(serde_json::to_string(&call.snapshot()).unwrap());

        let original = call.original().unwrap();
        assert_eq!(original.result, Some(CallResult::NoAnswer));
        assert_eq!(original.duration, Some(42));
        assert!(!original.follow_up_required);
    }
}
