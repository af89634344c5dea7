use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::assign::AssignmentEngine;
use crate::config::Config;
use crate::db::Database;
use crate::error::CrmError;
use crate::models::{Contact, ContactLog};

/// A row from a CSV import file.
///
/// Headers must match field names exactly (`full_name`, `phone`,
/// `assigned_caller_phone`); `name` and `caller_phone` are accepted as aliases.
/// Empty strings are converted to `None` for optional fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    #[serde(alias = "name")]
    pub full_name: String,

    pub phone: String,

    /// Phone of the caller the contact is handed to up front. Such contacts
    /// are imported as special.
    #[serde(default, alias = "caller_phone", deserialize_with = "empty_string_as_none")]
    pub assigned_caller_phone: Option<String>,
}

impl ImportRow {
    /// Validate that required fields are present and non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            bail!("full_name is required and cannot be empty");
        }
        if self.phone.trim().is_empty() {
            bail!("phone is required and cannot be empty");
        }
        Ok(())
    }
}

/// Deserialize empty strings as None.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-().]").expect("separator pattern is valid"));

/// Strip separators and restore the trunk `0` that spreadsheets drop from
/// 9 and 10 digit local numbers.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let phone = SEPARATORS.replace_all(raw.trim(), "").to_string();

    let digits = phone.strip_prefix('+').unwrap_or(&phone);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("invalid phone number: {}", raw);
    }

    if !phone.starts_with('+') && matches!(phone.len(), 9 | 10) && !phone.starts_with('0') {
        return Ok(format!("0{}", phone));
    }
    Ok(phone)
}

/// Import results summary.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub created: u32,
    pub special: u32,
    pub unknown_callers: u32,
    pub auto_assigned: u32,
    pub duplicates: u32,
    pub errors: u32,
}

/// Execute the import command.
pub fn run_import(
    db: &Database,
    config: &Config,
    project_id: Uuid,
    admin: Uuid,
    file: &str,
    dry_run: bool,
) -> Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        bail!("File not found: {}", file);
    }

    let reader = File::open(path).context("Failed to open CSV file")?;

    if dry_run {
        eprintln!("Dry run: {}", file);
    } else {
        eprintln!("Importing: {}", file);
    }

    let stats = import_contacts(db, config, project_id, admin, reader, dry_run)?;
    print_summary(&stats, dry_run);
    Ok(())
}

/// Read contacts from CSV into a project, then spread the ones without a
/// caller over the project's callers.
pub fn import_contacts(
    db: &Database,
    config: &Config,
    project_id: Uuid,
    admin: Uuid,
    reader: impl Read,
    dry_run: bool,
) -> Result<ImportStats> {
    let engine = AssignmentEngine::new(db, config);
    if db.get_project(project_id)?.is_none() {
        return Err(CrmError::NotFound(format!("project {}", project_id)).into());
    }
    if !engine.is_admin(project_id, admin)? {
        return Err(CrmError::permission(format!(
            "user {} is not an admin of project {}",
            admin, project_id
        ))
        .into());
    }

    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut stats = ImportStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut unassigned: Vec<Uuid> = Vec::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let line = idx + 2; // CSV line number (1-indexed, skip header)

        let row: ImportRow = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(line, "CSV parse error: {}", e);
                stats.errors += 1;
                continue;
            }
        };

        if let Err(e) = row.validate() {
            tracing::warn!(line, "Invalid row: {}", e);
            stats.errors += 1;
            continue;
        }

        let phone = match normalize_phone(&row.phone) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(line, "{}", e);
                stats.errors += 1;
                continue;
            }
        };

        if !seen.insert(phone.clone()) || db.find_contact_by_phone(project_id, &phone)?.is_some() {
            stats.duplicates += 1;
            continue;
        }

        let caller = match row.assigned_caller_phone.as_deref() {
            Some(raw) => {
                let resolved = resolve_caller(db, &engine, project_id, raw)?;
                if resolved.is_none() {
                    tracing::warn!(line, caller_phone = raw, "Caller not found in project, importing unassigned");
                    stats.unknown_callers += 1;
                }
                resolved
            }
            None => None,
        };

        let mut contact = Contact::new(project_id, row.full_name.trim().to_string(), phone);
        contact.created_by = Some(admin);
        if let Some(caller) = caller {
            contact.assigned_caller = Some(caller);
            contact.is_special = true;
        }

        if dry_run {
            stats.created += 1;
            if contact.is_special {
                stats.special += 1;
            }
            continue;
        }

        let inserted = db.immediate(|| {
            db.insert_contact(&contact)?;
            if let Some(caller) = contact.assigned_caller {
                db.insert_contact_log(&ContactLog::new(
                    contact.id,
                    format!("Imported for {}", engine.username(caller)?),
                    Some(admin),
                ))?;
            }
            Ok::<_, CrmError>(())
        });

        match inserted {
            Ok(()) => {
                stats.created += 1;
                if contact.is_special {
                    stats.special += 1;
                } else {
                    unassigned.push(contact.id);
                }
            }
            Err(CrmError::Validation(msg)) => {
                tracing::debug!(line, "Skipping duplicate: {}", msg);
                stats.duplicates += 1;
            }
            Err(e) => {
                tracing::error!(line, "Insert failed: {}", e);
                stats.errors += 1;
            }
        }
    }

    if !unassigned.is_empty() {
        let assigned = engine.assign_pool(project_id, &unassigned, config.strategy)?;
        stats.auto_assigned = assigned as u32;
    }

    tracing::info!(
        project_id = %project_id,
        created = stats.created,
        special = stats.special,
        auto_assigned = stats.auto_assigned,
        duplicates = stats.duplicates,
        errors = stats.errors,
        dry_run,
        "Import finished"
    );
    Ok(stats)
}

/// Caller for a pre-assigned row: a user with that phone who may work
/// contacts in the project.
fn resolve_caller(
    db: &Database,
    engine: &AssignmentEngine<'_>,
    project_id: Uuid,
    raw_phone: &str,
) -> Result<Option<Uuid>> {
    let Ok(phone) = normalize_phone(raw_phone) else {
        return Ok(None);
    };
    let user = match db.find_user_by_phone(&phone)? {
        Some(u) => Some(u),
        None => db.find_user_by_phone(raw_phone.trim())?,
    };
    match user {
        Some(u) if engine.can_work(project_id, u.id)? => Ok(Some(u.id)),
        _ => Ok(None),
    }
}

fn print_summary(stats: &ImportStats, dry_run: bool) {
    let verb = if dry_run { "Would create" } else { "Created" };

    println!("\n{} {} contacts", verb, stats.created);
    if stats.special > 0 {
        println!("  {} pre-assigned (special)", stats.special);
    }
    if stats.auto_assigned > 0 {
        println!("  {} auto-assigned", stats.auto_assigned);
    }
    if stats.unknown_callers > 0 {
        println!("Unknown callers: {}", stats.unknown_callers);
    }
    if stats.duplicates > 0 {
        println!("Skipped {} duplicates", stats.duplicates);
    }
    if stats.errors > 0 {
        println!("Errors: {}", stats.errors);
    }
}
