//! Contact ledger: per-project leads and their assignment state.
//!
//! Every write to `assigned_caller` is a conditional UPDATE whose WHERE
//! clause restates what the writer last saw. Zero affected rows means
//! another writer got there first and surfaces as `CrmError::Conflict`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row, ToSql};
use std::collections::HashMap;
use uuid::Uuid;

use super::{is_unique_violation, parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid, ts, Database};
use crate::error::CrmError;
use crate::models::*;

const CONTACT_COLUMNS: &str = "id, project_id, full_name, phone, assigned_caller, call_status, \
     is_special, last_call_date, is_active, created_by, created_at, updated_at";

/// What a conditional update expects to find on the row.
#[derive(Debug, Clone, Copy)]
enum Guard {
    /// `assigned_caller` still equals this value.
    Caller(Option<Uuid>),
    /// Caller and `updated_at` both unchanged since the row was read.
    Version(Option<Uuid>, DateTime<Utc>),
}

/// Which reclamation predicate a sweep scan applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleFilter {
    /// Assigned, pending/contacted, not special, untouched since cutoff.
    Unworked,
    /// Assigned, pending, untouched since cutoff.
    Inactive,
    /// Special, no call (or creation when never called) since cutoff.
    SpecialNoCall,
}

impl StaleFilter {
    fn predicate(&self) -> &'static str {
        match self {
            Self::Unworked => {
                "assigned_caller IS NOT NULL AND is_special = 0 \
                 AND call_status IN ('pending', 'contacted') AND updated_at < ?"
            }
            Self::Inactive => {
                "assigned_caller IS NOT NULL AND call_status = 'pending' AND updated_at < ?"
            }
            Self::SpecialNoCall => "is_special = 1 AND COALESCE(last_call_date, created_at) < ?",
        }
    }
}

/// A contact found by a sweep scan with its scan cursor.
#[derive(Debug, Clone)]
pub struct SweepRow {
    pub rowid: i64,
    pub contact: Contact,
}

impl Database {
    // ==================== CONTACT CREATE ====================

    /// Insert a contact. Phone must be unique within the project.
    pub fn insert_contact(&self, contact: &Contact) -> crate::error::Result<()> {
        if contact.full_name.trim().is_empty() {
            return Err(CrmError::validation("contact name cannot be empty"));
        }
        if contact.phone.trim().is_empty() {
            return Err(CrmError::validation("contact phone cannot be empty"));
        }

        let result = self.conn.execute(
            &format!(
                "INSERT INTO contacts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                CONTACT_COLUMNS
            ),
            params![
                contact.id.to_string(),
                contact.project_id.to_string(),
                contact.full_name,
                contact.phone,
                contact.assigned_caller.map(|id| id.to_string()),
                contact.call_status.as_str(),
                contact.is_special,
                contact.last_call_date.as_ref().map(ts),
                contact.is_active,
                contact.created_by.map(|id| id.to_string()),
                ts(&contact.created_at),
                ts(&contact.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(CrmError::validation(format!(
                "phone {} already exists in this project",
                contact.phone
            ))),
            Err(e) => Err(e.into()),
        }
    }

    // ==================== CONTACT READ ====================

    pub fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM contacts WHERE id = ?", CONTACT_COLUMNS),
            [id.to_string()],
            Self::row_to_contact,
        );

        match result {
            Ok(contact) => Ok(Some(contact)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_contact_by_phone(&self, project_id: Uuid, phone: &str) -> Result<Option<Contact>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM contacts WHERE project_id = ? AND phone = ?",
                CONTACT_COLUMNS
            ),
            params![project_id.to_string(), phone],
            Self::row_to_contact,
        );

        match result {
            Ok(contact) => Ok(Some(contact)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Active contacts of a project, optionally narrowed to one caller.
    pub fn list_contacts(
        &self,
        project_id: Uuid,
        assigned_to: Option<Uuid>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM contacts
             WHERE project_id = ? AND is_active = 1 AND (? IS NULL OR assigned_caller = ?)
             ORDER BY full_name ASC LIMIT ? OFFSET ?",
            CONTACT_COLUMNS
        ))?;

        let caller = assigned_to.map(|id| id.to_string());
        let contacts = stmt
            .query_map(
                params![project_id.to_string(), caller, caller, limit, offset],
                Self::row_to_contact,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(contacts)
    }

    /// Fresh-assignment candidates, oldest-created first.
    pub fn unassigned_pending(&self, project_id: Uuid, limit: u32) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM contacts
             WHERE project_id = ? AND assigned_caller IS NULL
               AND call_status = 'pending' AND is_active = 1
             ORDER BY created_at ASC, rowid ASC LIMIT ?",
            CONTACT_COLUMNS
        ))?;

        let contacts = stmt
            .query_map(params![project_id.to_string(), limit], Self::row_to_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(contacts)
    }

    /// A caller's queue in the given statuses; never-called contacts first,
    /// then by oldest last call.
    pub fn assigned_to(
        &self,
        project_id: Uuid,
        caller: Uuid,
        statuses: &[CallStatus],
    ) -> Result<Vec<Contact>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM contacts
             WHERE project_id = ? AND assigned_caller = ? AND is_active = 1
               AND call_status IN ({})
             ORDER BY last_call_date IS NOT NULL, last_call_date ASC, created_at ASC, rowid ASC",
            CONTACT_COLUMNS, placeholders
        );

        let project = project_id.to_string();
        let caller = caller.to_string();
        let mut values: Vec<&dyn ToSql> = vec![&project, &caller];
        let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        for name in &names {
            values.push(name);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(&values[..], Self::row_to_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(contacts)
    }

    /// Open-contact count per caller. Callers holding nothing map to zero.
    pub fn caller_loads(&self, project_id: Uuid, callers: &[Uuid]) -> Result<HashMap<Uuid, usize>> {
        let mut loads: HashMap<Uuid, usize> = callers.iter().map(|id| (*id, 0)).collect();

        let mut stmt = self.conn.prepare(
            "SELECT assigned_caller, COUNT(*) FROM contacts
             WHERE project_id = ? AND assigned_caller IS NOT NULL AND is_active = 1
               AND call_status IN ('pending', 'contacted', 'follow_up')
             GROUP BY assigned_caller",
        )?;
        let rows = stmt.query_map([project_id.to_string()], |row| {
            Ok((parse_uuid(&row.get::<_, String>(0)?)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (caller, count) = row?;
            if let Some(load) = loads.get_mut(&caller) {
                *load = count as usize;
            }
        }

        Ok(loads)
    }

    /// One page of contacts matching `filter` with `rowid > after`.
    pub fn sweep_page(
        &self,
        filter: StaleFilter,
        cutoff: DateTime<Utc>,
        after: i64,
        limit: u32,
    ) -> Result<Vec<SweepRow>> {
        let sql = format!(
            "SELECT {}, rowid FROM contacts
             WHERE is_active = 1 AND {} AND rowid > ?
             ORDER BY rowid ASC LIMIT ?",
            CONTACT_COLUMNS,
            filter.predicate()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![ts(&cutoff), after, limit], |row| {
                Ok(SweepRow {
                    contact: Self::row_to_contact(row)?,
                    rowid: row.get(12)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    // ==================== ASSIGNMENT WRITES ====================

    /// Compare-and-swap the caller: succeeds only while the row's caller is
    /// still `expected`.
    pub fn apply_assignment(
        &self,
        contact_id: Uuid,
        expected: Option<Uuid>,
        caller: Uuid,
        at: DateTime<Utc>,
    ) -> crate::error::Result<Contact> {
        let caller = caller.to_string();
        let at = ts(&at);
        self.guarded_update(
            contact_id,
            Guard::Caller(expected),
            "assigned_caller = ?, updated_at = ?",
            &[&caller, &at],
        )
    }

    /// Hand a contact read by a sweep to `caller`, provided nobody touched
    /// the row since it was read.
    pub fn apply_reassignment(
        &self,
        seen: &Contact,
        caller: Uuid,
        at: DateTime<Utc>,
    ) -> crate::error::Result<Contact> {
        let caller = caller.to_string();
        let at = ts(&at);
        self.guarded_update(
            seen.id,
            Guard::Version(seen.assigned_caller, seen.updated_at),
            "assigned_caller = ?, updated_at = ?",
            &[&caller, &at],
        )
    }

    /// Unconditional overwrite for explicit admin decisions.
    pub fn force_assignment(
        &self,
        contact_id: Uuid,
        caller: Uuid,
        at: DateTime<Utc>,
    ) -> crate::error::Result<bool> {
        let rows = self.conn.execute(
            "UPDATE contacts SET assigned_caller = ?, updated_at = ? WHERE id = ?",
            params![caller.to_string(), ts(&at), contact_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    /// Return a contact to the pool: clear the caller and restart at pending.
    pub fn release(
        &self,
        contact_id: Uuid,
        expected: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> crate::error::Result<Contact> {
        let at = ts(&at);
        self.guarded_update(
            contact_id,
            Guard::Caller(expected),
            "assigned_caller = NULL, call_status = 'pending', updated_at = ?",
            &[&at],
        )
    }

    /// Clear the caller but keep the call status.
    pub fn clear_caller(
        &self,
        contact_id: Uuid,
        expected: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> crate::error::Result<Contact> {
        let at = ts(&at);
        self.guarded_update(
            contact_id,
            Guard::Caller(expected),
            "assigned_caller = NULL, updated_at = ?",
            &[&at],
        )
    }

    /// Sweep variant of [`Database::clear_caller`], guarded on the row version.
    pub fn clear_caller_if_unchanged(
        &self,
        seen: &Contact,
        at: DateTime<Utc>,
    ) -> crate::error::Result<Contact> {
        let at = ts(&at);
        self.guarded_update(
            seen.id,
            Guard::Version(seen.assigned_caller, seen.updated_at),
            "assigned_caller = NULL, updated_at = ?",
            &[&at],
        )
    }

    /// Unassign a special contact and drop its special flag for good.
    pub fn demote_special(&self, seen: &Contact, at: DateTime<Utc>) -> crate::error::Result<Contact> {
        let at = ts(&at);
        self.guarded_update(
            seen.id,
            Guard::Version(seen.assigned_caller, seen.updated_at),
            "assigned_caller = NULL, is_special = 0, updated_at = ?",
            &[&at],
        )
    }

    /// Fold a call's result into the contact: status via the result table,
    /// `last_call_date` from the call, `updated_at = at`.
    pub fn record_call_outcome(
        &self,
        contact_id: Uuid,
        call: &Call,
        at: DateTime<Utc>,
    ) -> crate::error::Result<Contact> {
        let status = call
            .result
            .and_then(|r| r.contact_status())
            .map(|s| s.as_str());

        let rows = self.conn.execute(
            "UPDATE contacts SET call_status = COALESCE(?, call_status),
                 last_call_date = ?, updated_at = ?
             WHERE id = ?",
            params![
                status,
                ts(&call.call_date),
                ts(&at),
                contact_id.to_string()
            ],
        )?;
        if rows == 0 {
            return Err(CrmError::NotFound(format!("contact {}", contact_id)));
        }

        self.get_contact(contact_id)?
            .ok_or_else(|| CrmError::NotFound(format!("contact {}", contact_id)))
    }

    pub fn set_call_status(&self, contact_id: Uuid, status: CallStatus) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE contacts SET call_status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), ts(&Utc::now()), contact_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    /// Soft delete: the contact drops out of every queue and sweep.
    pub fn deactivate_contact(&self, id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE contacts SET is_active = 0, updated_at = ? WHERE id = ?",
            params![ts(&Utc::now()), id.to_string()],
        )?;
        Ok(rows > 0)
    }

    pub fn reactivate_contact(&self, id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE contacts SET is_active = 1, updated_at = ? WHERE id = ?",
            params![ts(&Utc::now()), id.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn guarded_update(
        &self,
        contact_id: Uuid,
        guard: Guard,
        set_clause: &str,
        set_values: &[&dyn ToSql],
    ) -> crate::error::Result<Contact> {
        let id = contact_id.to_string();
        let (expected_caller, seen_at) = match guard {
            Guard::Caller(caller) => (caller, None),
            Guard::Version(caller, updated_at) => (caller, Some(ts(&updated_at))),
        };
        let expected_caller = expected_caller.map(|c| c.to_string());

        let mut sql = format!(
            "UPDATE contacts SET {} WHERE id = ? AND assigned_caller IS ?",
            set_clause
        );
        let mut values: Vec<&dyn ToSql> = set_values.to_vec();
        values.push(&id);
        values.push(&expected_caller);
        if let Some(seen_at) = seen_at.as_ref() {
            sql.push_str(" AND updated_at = ?");
            values.push(seen_at);
        }

        let rows = self.conn.execute(&sql, &values[..])?;
        if rows == 0 {
            return match self.get_contact(contact_id)? {
                Some(_) => Err(CrmError::Conflict(contact_id)),
                None => Err(CrmError::NotFound(format!("contact {}", contact_id))),
            };
        }

        self.get_contact(contact_id)?
            .ok_or_else(|| CrmError::NotFound(format!("contact {}", contact_id)))
    }

    fn row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
        let status: String = row.get(5)?;
        Ok(Contact {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            project_id: parse_uuid(&row.get::<_, String>(1)?)?,
            full_name: row.get(2)?,
            phone: row.get(3)?,
            assigned_caller: parse_opt_uuid(row.get(4)?)?,
            call_status: CallStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("unknown call status {}", status).into(),
                )
            })?,
            is_special: row.get(6)?,
            last_call_date: parse_opt_ts(row.get(7)?)?,
            is_active: row.get(8)?,
            created_by: parse_opt_uuid(row.get(9)?)?,
            created_at: parse_ts(&row.get::<_, String>(10)?)?,
            updated_at: parse_ts(&row.get::<_, String>(11)?)?,
        })
    }
}
