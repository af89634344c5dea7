use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use inquire::Confirm;
use uuid::Uuid;

use super::display::print_contact_detail;
use super::{acting_user, find_contact, find_project, find_user, AutoAssignArgs, BulkAssignArgs, CallCommand, ContactArgs};
use crate::assign::{AssignmentEngine, AssignmentStrategy};
use crate::calls::{edit_call, set_call_editable, submit_call, CallOutcome};
use crate::config::Config;
use crate::db::Database;
use crate::models::{CallChanges, CallResult, CallState};

/// Print the caller's next contact, claiming a fresh one when needed.
pub fn run_next(db: &Database, config: &Config, as_user: Option<&str>, project: &str) -> Result<()> {
    let user = acting_user(db, as_user)?;
    let project = find_project(db, project)?;
    let engine = AssignmentEngine::new(db, config);

    match engine.request_next(project.id, user.id)? {
        Some(contact) => {
            let calls = db.get_calls_for_contact(contact.id)?;
            print_contact_detail(&contact, Some(&user.username), &calls, &[]);
        }
        None => println!("No contacts waiting in {}.", project.name),
    }
    Ok(())
}

pub fn run_release(db: &Database, config: &Config, as_user: Option<&str>, args: &ContactArgs) -> Result<()> {
    let user = acting_user(db, as_user)?;
    let project = find_project(db, &args.project)?;
    let contact = find_contact(db, &project, &args.contact)?;

    let released = AssignmentEngine::new(db, config).release(contact.id, user.id)?;
    println!("Released {}", released.full_name);
    Ok(())
}

pub fn run_unassign(db: &Database, config: &Config, as_user: Option<&str>, args: &ContactArgs) -> Result<()> {
    let user = acting_user(db, as_user)?;
    let project = find_project(db, &args.project)?;
    let contact = find_contact(db, &project, &args.contact)?;

    let cleared = AssignmentEngine::new(db, config).remove_assigned_caller(contact.id, user.id)?;
    println!("Removed caller from {}", cleared.full_name);
    Ok(())
}

pub fn run_bulk_assign(
    db: &Database,
    config: &Config,
    as_user: Option<&str>,
    args: &BulkAssignArgs,
) -> Result<()> {
    let user = acting_user(db, as_user)?;
    let project = find_project(db, &args.project)?;
    let target = args.to.as_deref().map(|name| find_user(db, name)).transpose()?;

    let mut ids: Vec<Uuid> = Vec::with_capacity(args.contacts.len());
    let mut already_assigned = 0;
    for identifier in &args.contacts {
        let contact = find_contact(db, &project, identifier)?;
        if contact.is_assigned() {
            already_assigned += 1;
        }
        ids.push(contact.id);
    }

    if already_assigned > 0 && !args.yes {
        let confirmed = Confirm::new(&format!(
            "{} of {} contacts already have a caller. Overwrite?",
            already_assigned,
            ids.len()
        ))
        .with_default(false)
        .prompt()
        .unwrap_or(false);

        if !confirmed {
            return Ok(());
        }
    }

    let updated = AssignmentEngine::new(db, config).bulk_assign(
        project.id,
        &ids,
        target.as_ref().map(|u| u.id),
        user.id,
    )?;
    match target {
        Some(t) => println!("Assigned {} contacts to {}", updated, t.username),
        None => println!("Assigned {} contacts", updated),
    }
    Ok(())
}

pub fn run_auto_assign(
    db: &Database,
    config: &Config,
    as_user: Option<&str>,
    args: &AutoAssignArgs,
) -> Result<()> {
    let user = acting_user(db, as_user)?;
    let project = find_project(db, &args.project)?;
    let strategy = match args.strategy.as_deref() {
        Some(s) => AssignmentStrategy::parse(s)
            .ok_or_else(|| anyhow!("Unknown strategy {} (load-balanced or random)", s))?,
        None => config.strategy,
    };

    let assigned =
        AssignmentEngine::new(db, config).assign_unassigned(project.id, user.id, strategy)?;
    println!("Assigned {} contacts ({})", assigned, strategy.as_str());
    Ok(())
}

pub fn run_call(db: &Database, as_user: Option<&str>, cmd: CallCommand) -> Result<()> {
    let user = acting_user(db, as_user)?;

    match cmd {
        CallCommand::Submit {
            project,
            contact,
            result,
            duration,
            notes,
            follow_up,
        } => {
            let project = find_project(db, &project)?;
            let contact = find_contact(db, &project, &contact)?;
            let result = result.as_deref().map(parse_result).transpose()?;
            let outcome = CallOutcome {
                result,
                status: call_state_for(result),
                duration,
                notes,
                follow_up_date: follow_up.as_deref().map(parse_date).transpose()?,
            };

            let (call, contact) = submit_call(db, contact.id, user.id, outcome)?;
            println!(
                "Recorded call {} for {}; status is now {}",
                call.id,
                contact.full_name,
                contact.call_status.as_str()
            );
        }
        CallCommand::Edit {
            call,
            result,
            duration,
            notes,
            follow_up_required,
            follow_up,
            reason,
        } => {
            let changes = CallChanges {
                result: result.as_deref().map(parse_result).transpose()?,
                notes,
                duration,
                follow_up_required,
                follow_up_date: follow_up.as_deref().map(parse_date).transpose()?,
            };
            let edited = edit_call(db, parse_call_id(&call)?, user.id, changes, reason)?;
            println!("Updated call {}", edited.id);
        }
        CallCommand::Lock { call } => {
            set_call_editable(db, parse_call_id(&call)?, user.id, false)?;
            println!("Locked call {}", call);
        }
        CallCommand::Unlock { call } => {
            set_call_editable(db, parse_call_id(&call)?, user.id, true)?;
            println!("Unlocked call {}", call);
        }
    }
    Ok(())
}

fn parse_result(s: &str) -> Result<CallResult> {
    CallResult::parse(s).ok_or_else(|| anyhow!("Unknown call result: {}", s))
}

fn parse_call_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim()).map_err(|_| anyhow!("Not a call ID: {}", s))
}

/// Dial state implied by a reported result.
fn call_state_for(result: Option<CallResult>) -> CallState {
    match result {
        None => CallState::Pending,
        Some(CallResult::NoAnswer | CallResult::Busy | CallResult::Unreachable) => CallState::NoAnswer,
        Some(CallResult::WrongNumber) => CallState::WrongNumber,
        Some(_) => CallState::Answered,
    }
}

/// Parse YYYY-MM-DD as midnight UTC, or a full RFC 3339 timestamp.
fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date: {} (use YYYY-MM-DD)", s))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("Invalid date: {}", s))
}
