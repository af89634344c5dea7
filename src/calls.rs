//! Call recording and the call edit trail.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{CrmError, Result};
use crate::models::*;

/// What a caller reports after dialling a contact.
#[derive(Debug, Clone, Default)]
pub struct CallOutcome {
    pub result: Option<CallResult>,
    pub status: CallState,
    pub duration: Option<u32>,
    pub notes: Option<String>,
    pub follow_up_date: Option<DateTime<Utc>>,
}

fn is_admin(db: &Database, project_id: Uuid, user_id: Uuid) -> Result<bool> {
    if db.is_superuser(user_id)? {
        return Ok(true);
    }
    Ok(db.role_of(project_id, user_id)? == Some(Role::Admin))
}

/// Record a call against a contact and fold its result into the contact's
/// status. Only the assigned caller, project admins and superusers may
/// submit.
pub fn submit_call(
    db: &Database,
    contact_id: Uuid,
    caller: Uuid,
    outcome: CallOutcome,
) -> Result<(Call, Contact)> {
    let contact = db
        .get_contact(contact_id)?
        .ok_or_else(|| CrmError::NotFound(format!("contact {}", contact_id)))?;

    if !contact.is_held_by(caller) && !is_admin(db, contact.project_id, caller)? {
        return Err(CrmError::permission(format!(
            "user {} is not assigned to contact {}",
            caller, contact_id
        )));
    }
    if outcome.duration.is_some() && outcome.result.is_none() {
        return Err(CrmError::validation("a duration needs a call result"));
    }

    let mut call = Call::new(contact.id, caller, contact.project_id);
    call.result = outcome.result;
    call.status = outcome.status;
    call.duration = outcome.duration;
    call.notes = outcome.notes;
    call.follow_up_date = outcome.follow_up_date;
    call.follow_up_required =
        outcome.result == Some(CallResult::CallbackRequested) || outcome.follow_up_date.is_some();

    let updated = db.immediate(|| {
        db.insert_call(&call)?;
        let updated = db.record_call_outcome(contact.id, &call, call.call_date)?;
        let label = call.result.map_or("no result", |r| r.as_str());
        db.insert_contact_log(
            &ContactLog::new(contact.id, format!("Call recorded: {}", label), Some(caller))
                .at(call.call_date),
        )?;
        Ok::<_, CrmError>(updated)
    })?;

    tracing::info!(
        call_id = %call.id,
        contact_id = %contact.id,
        result = call.result.map_or("none", |r| r.as_str()),
        status = updated.call_status.as_str(),
        "Call submitted"
    );
    Ok((call, updated))
}

/// Amend a recorded call. The first edit snapshots the original values;
/// every changed field gets its own history row.
pub fn edit_call(
    db: &Database,
    call_id: Uuid,
    editor: Uuid,
    changes: CallChanges,
    reason: Option<String>,
) -> Result<Call> {
    let mut call = db
        .get_call(call_id)?
        .ok_or_else(|| CrmError::NotFound(format!("call {}", call_id)))?;

    if !call.is_editable {
        return Err(CrmError::permission(format!("call {} is locked", call_id)));
    }
    if call.caller_id != editor && !is_admin(db, call.project_id, editor)? {
        return Err(CrmError::permission(format!(
            "user {} may not edit call {}",
            editor, call_id
        )));
    }

    let before = call.snapshot();
    let mut fields: Vec<(&'static str, Option<String>, Option<String>)> = Vec::new();

    if let Some(result) = changes.result {
        if call.result != Some(result) {
            fields.push((
                "result",
                call.result.map(|r| r.as_str().to_string()),
                Some(result.as_str().to_string()),
            ));
            call.result = Some(result);
        }
    }
    if let Some(notes) = changes.notes {
        if call.notes.as_deref() != Some(notes.as_str()) {
            fields.push(("notes", call.notes.clone(), Some(notes.clone())));
            call.notes = Some(notes);
        }
    }
    if let Some(duration) = changes.duration {
        if call.duration != Some(duration) {
            fields.push((
                "duration",
                call.duration.map(|d| d.to_string()),
                Some(duration.to_string()),
            ));
            call.duration = Some(duration);
        }
    }
    if let Some(required) = changes.follow_up_required {
        if call.follow_up_required != required {
            fields.push((
                "follow_up_required",
                Some(call.follow_up_required.to_string()),
                Some(required.to_string()),
            ));
            call.follow_up_required = required;
        }
    }
    if let Some(date) = changes.follow_up_date {
        if call.follow_up_date != Some(date) {
            fields.push((
                "follow_up_date",
                call.follow_up_date.map(|d| d.to_rfc3339()),
                Some(date.to_rfc3339()),
            ));
            call.follow_up_date = Some(date);
        }
    }

    if fields.is_empty() {
        return Err(CrmError::validation("edit changes nothing"));
    }

    let now = Utc::now();
    if call.original_data.is_none() {
        call.original_data =
            Some(serde_json::to_string(&before).map_err(|e| CrmError::Storage(e.into()))?);
    }
    call.edited_at = Some(now);
    call.edited_by = Some(editor);
    call.edit_reason = reason.clone();
    let result_changed = fields.iter().any(|(name, _, _)| *name == "result");

    db.immediate(|| {
        db.update_call(&call)?;
        for (field_name, old_value, new_value) in &fields {
            db.insert_call_edit(&CallEdit {
                id: Uuid::new_v4(),
                call_id: call.id,
                edited_by: editor,
                field_name: field_name.to_string(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                edit_reason: reason.clone(),
                edited_at: now,
            })?;
        }

        // Only the latest call drives the contact's status.
        if result_changed {
            let latest = db.get_calls_for_contact(call.contact_id)?;
            if latest.first().map(|c| c.id) == Some(call.id) {
                if let Some(status) = call.result.and_then(|r| r.contact_status()) {
                    db.set_call_status(call.contact_id, status)?;
                }
            }
        }
        Ok::<_, CrmError>(())
    })?;

    tracing::info!(call_id = %call.id, editor = %editor, fields = fields.len(), "Call edited");
    Ok(call)
}

/// Admin-only: freeze or unfreeze a call against further edits.
pub fn set_call_editable(db: &Database, call_id: Uuid, admin: Uuid, editable: bool) -> Result<Call> {
    let mut call = db
        .get_call(call_id)?
        .ok_or_else(|| CrmError::NotFound(format!("call {}", call_id)))?;
    if !is_admin(db, call.project_id, admin)? {
        return Err(CrmError::permission(format!(
            "user {} is not an admin of project {}",
            admin, call.project_id
        )));
    }

    call.is_editable = editable;
    db.update_call(&call)?;
    Ok(call)
}
