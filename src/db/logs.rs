use anyhow::Result;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::{parse_opt_uuid, parse_ts, parse_uuid, ts, Database};
use crate::models::ContactLog;

impl Database {
    pub fn insert_contact_log(&self, log: &ContactLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO contact_logs (id, contact_id, action, performed_by, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                log.id.to_string(),
                log.contact_id.to_string(),
                log.action,
                log.performed_by.map(|id| id.to_string()),
                ts(&log.created_at),
            ],
        )?;
        Ok(())
    }

    /// Audit trail for a contact, newest first.
    pub fn get_logs_for_contact(&self, contact_id: Uuid) -> Result<Vec<ContactLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, contact_id, action, performed_by, created_at FROM contact_logs
             WHERE contact_id = ? ORDER BY created_at DESC, rowid DESC",
        )?;

        let logs = stmt
            .query_map([contact_id.to_string()], Self::row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(logs)
    }

    pub fn count_logs_for_contact(&self, contact_id: Uuid) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM contact_logs WHERE contact_id = ?",
            [contact_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_log(row: &Row) -> rusqlite::Result<ContactLog> {
        Ok(ContactLog {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            contact_id: parse_uuid(&row.get::<_, String>(1)?)?,
            action: row.get(2)?,
            performed_by: parse_opt_uuid(row.get(3)?)?,
            created_at: parse_ts(&row.get::<_, String>(4)?)?,
        })
    }
}
