use anyhow::Result;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::{parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid, ts, Database};
use crate::models::*;

const CALL_COLUMNS: &str = "id, contact_id, caller_id, project_id, result, status, duration, notes, \
     follow_up_required, follow_up_date, call_date, is_editable, edited_at, edited_by, \
     edit_reason, original_data";

impl Database {
    pub fn insert_call(&self, call: &Call) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO calls ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                CALL_COLUMNS
            ),
            params![
                call.id.to_string(),
                call.contact_id.to_string(),
                call.caller_id.to_string(),
                call.project_id.to_string(),
                call.result.map(|r| r.as_str()),
                call.status.as_str(),
                call.duration,
                call.notes,
                call.follow_up_required,
                call.follow_up_date.as_ref().map(ts),
                ts(&call.call_date),
                call.is_editable,
                call.edited_at.as_ref().map(ts),
                call.edited_by.map(|id| id.to_string()),
                call.edit_reason,
                call.original_data,
            ],
        )?;
        Ok(())
    }

    pub fn get_call(&self, id: Uuid) -> Result<Option<Call>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM calls WHERE id = ?", CALL_COLUMNS),
            [id.to_string()],
            Self::row_to_call,
        );

        match result {
            Ok(call) => Ok(Some(call)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Calls for a contact, most recent first.
    pub fn get_calls_for_contact(&self, contact_id: Uuid) -> Result<Vec<Call>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM calls WHERE contact_id = ? ORDER BY call_date DESC",
            CALL_COLUMNS
        ))?;

        let calls = stmt
            .query_map([contact_id.to_string()], Self::row_to_call)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(calls)
    }

    /// Persist the editable fields and edit metadata of a call.
    pub fn update_call(&self, call: &Call) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE calls SET result = ?, duration = ?, notes = ?, follow_up_required = ?,
                 follow_up_date = ?, is_editable = ?, edited_at = ?, edited_by = ?,
                 edit_reason = ?, original_data = ?
             WHERE id = ?",
            params![
                call.result.map(|r| r.as_str()),
                call.duration,
                call.notes,
                call.follow_up_required,
                call.follow_up_date.as_ref().map(ts),
                call.is_editable,
                call.edited_at.as_ref().map(ts),
                call.edited_by.map(|id| id.to_string()),
                call.edit_reason,
                call.original_data,
                call.id.to_string(),
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn insert_call_edit(&self, edit: &CallEdit) -> Result<()> {
        self.conn.execute(
            "INSERT INTO call_edits (id, call_id, edited_by, field_name, old_value, new_value,
                 edit_reason, edited_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                edit.id.to_string(),
                edit.call_id.to_string(),
                edit.edited_by.to_string(),
                edit.field_name,
                edit.old_value,
                edit.new_value,
                edit.edit_reason,
                ts(&edit.edited_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_edits_for_call(&self, call_id: Uuid) -> Result<Vec<CallEdit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, call_id, edited_by, field_name, old_value, new_value, edit_reason, edited_at
             FROM call_edits WHERE call_id = ? ORDER BY edited_at ASC, rowid ASC",
        )?;

        let edits = stmt
            .query_map([call_id.to_string()], |row| {
                Ok(CallEdit {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    call_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    edited_by: parse_uuid(&row.get::<_, String>(2)?)?,
                    field_name: row.get(3)?,
                    old_value: row.get(4)?,
                    new_value: row.get(5)?,
                    edit_reason: row.get(6)?,
                    edited_at: parse_ts(&row.get::<_, String>(7)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(edits)
    }

    fn row_to_call(row: &Row) -> rusqlite::Result<Call> {
        Ok(Call {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            contact_id: parse_uuid(&row.get::<_, String>(1)?)?,
            caller_id: parse_uuid(&row.get::<_, String>(2)?)?,
            project_id: parse_uuid(&row.get::<_, String>(3)?)?,
            result: row
                .get::<_, Option<String>>(4)?
                .as_deref()
                .and_then(CallResult::parse),
            status: CallState::parse(&row.get::<_, String>(5)?),
            duration: row.get(6)?,
            notes: row.get(7)?,
            follow_up_required: row.get(8)?,
            follow_up_date: parse_opt_ts(row.get(9)?)?,
            call_date: parse_ts(&row.get::<_, String>(10)?)?,
            is_editable: row.get(11)?,
            edited_at: parse_opt_ts(row.get(12)?)?,
            edited_by: parse_opt_uuid(row.get(13)?)?,
            edit_reason: row.get(14)?,
            original_data: row.get(15)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_crud() {
        let db = Database::open_memory().unwrap();
        let owner = User::new("owner".into());
        db.insert_user(&owner).unwrap();
        let project = db.create_project("P", owner.id).unwrap();
        let contact = Contact::new(project.id, "Lead".into(), "0911".into());
        db.insert_contact(&contact).unwrap();

        let mut call = Call::new(contact.id, owner.id, project.id);
        call.result = Some(CallResult::Answered);
        call.status = CallState::Answered;
        call.duration = Some(95);
        call.notes = Some("wants brochure".into());
        db.insert_call(&call).unwrap();

        let got = db.get_call(call.id).unwrap().unwrap();
        assert_eq!(got.result, Some(CallResult::Answered));
        assert_eq!(got.status, CallState::Answered);
        assert_eq!(got.duration, Some(95));
        assert!(got.is_editable);

        let mut edited = got.clone();
        edited.notes = Some("sent brochure".into());
        assert!(db.update_call(&edited).unwrap());
        assert_eq!(
            db.get_call(call.id).unwrap().unwrap().notes.as_deref(),
            Some("sent brochure")
        );

        assert_eq!(db.get_calls_for_contact(contact.id).unwrap().len(), 1);
        assert!(db.get_call(Uuid::new_v4()).unwrap().is_none());
    }
}
