use anyhow::{anyhow, bail, Result};
use chrono::Utc;

use super::display::{print_contact_detail, print_contact_row, print_member};
use super::import::normalize_phone;
use super::{
    acting_user, find_contact, find_project, find_user, ConfigCommand, ContactCommand,
    MemberCommand, ProjectCommand, UserCommand,
};
use crate::assign::AssignmentEngine;
use crate::config::{env_var_for, Config, SETTING_KEYS};
use crate::db::Database;
use crate::error::CrmError;
use crate::models::{Contact, ContactLog, Project, Role, User};

pub fn run_user(db: &Database, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Add {
            username,
            phone,
            superuser,
        } => {
            let username = username.trim();
            if username.is_empty() {
                bail!("Username cannot be empty.");
            }
            let mut user = User::new(username.to_string());
            user.phone_number = phone.as_deref().map(normalize_phone).transpose()?;
            user.is_superuser = superuser;
            db.insert_user(&user)?;
            println!("Created user {} ({})", user.username, user.id);
        }
    }
    Ok(())
}

pub fn run_project(db: &Database, as_user: Option<&str>, cmd: ProjectCommand) -> Result<()> {
    match cmd {
        ProjectCommand::Create { name } => {
            let user = acting_user(db, as_user)?;
            let project = db.create_project(&name, user.id)?;
            println!("Created project {} ({})", project.name, project.id);
        }
        ProjectCommand::List => {
            let projects = db.list_projects()?;
            if projects.is_empty() {
                println!("No projects.");
            }
            for project in projects {
                println!("  {:<24} {:<10} {}", project.name, project.status.as_str(), project.id);
            }
        }
    }
    Ok(())
}

fn require_admin(engine: &AssignmentEngine<'_>, project: &Project, user: &User) -> Result<()> {
    if engine.is_admin(project.id, user.id)? {
        Ok(())
    } else {
        Err(CrmError::permission(format!(
            "{} is not an admin of {}",
            user.username, project.name
        ))
        .into())
    }
}

fn parse_role(role: &str) -> Result<Role> {
    Role::parse(role).ok_or_else(|| anyhow!("Unknown role {} (admin, caller or contact)", role))
}

pub fn run_member(
    db: &Database,
    config: &Config,
    as_user: Option<&str>,
    cmd: MemberCommand,
) -> Result<()> {
    let engine = AssignmentEngine::new(db, config);
    let actor = acting_user(db, as_user)?;

    match cmd {
        MemberCommand::Add {
            project,
            username,
            role,
        } => {
            let project = find_project(db, &project)?;
            require_admin(&engine, &project, &actor)?;
            let user = find_user(db, &username)?;
            let role = parse_role(&role)?;
            db.add_member(project.id, user.id, role)?;
            println!("Added {} to {} as {}", user.username, project.name, role.as_str());
        }
        MemberCommand::Role {
            project,
            username,
            role,
        } => {
            let project = find_project(db, &project)?;
            require_admin(&engine, &project, &actor)?;
            let user = find_user(db, &username)?;
            let role = parse_role(&role)?;
            if !db.set_role(project.id, user.id, role)? {
                bail!("{} is not a member of {}", user.username, project.name);
            }
            println!("{} is now {} in {}", user.username, role.as_str(), project.name);
        }
        MemberCommand::Remove { project, username } => {
            let project = find_project(db, &project)?;
            require_admin(&engine, &project, &actor)?;
            let user = find_user(db, &username)?;
            if !db.remove_member(project.id, user.id)? {
                bail!("{} is not a member of {}", user.username, project.name);
            }
            println!("Removed {} from {}", user.username, project.name);
        }
        MemberCommand::List { project } => {
            let project = find_project(db, &project)?;
            if !engine.can_work(project.id, actor.id)? {
                return Err(CrmError::permission(format!(
                    "{} cannot view {}",
                    actor.username, project.name
                ))
                .into());
            }
            for member in db.list_members(project.id)? {
                let username = engine.username(member.user_id)?;
                print_member(&member, &username);
            }
        }
    }
    Ok(())
}

pub fn run_contact(
    db: &Database,
    config: &Config,
    as_user: Option<&str>,
    cmd: ContactCommand,
) -> Result<()> {
    let engine = AssignmentEngine::new(db, config);
    let actor = acting_user(db, as_user)?;

    match cmd {
        ContactCommand::Add {
            project,
            name,
            phone,
        } => {
            let project = find_project(db, &project)?;
            require_admin(&engine, &project, &actor)?;
            let mut contact = Contact::new(project.id, name.trim().to_string(), normalize_phone(&phone)?);
            contact.created_by = Some(actor.id);
            db.insert_contact(&contact)?;
            println!("Added {} ({})", contact.full_name, contact.id);
        }
        ContactCommand::List {
            project,
            mine,
            caller,
            page,
            limit,
        } => {
            let project = find_project(db, &project)?;
            if !engine.can_work(project.id, actor.id)? {
                return Err(CrmError::permission(format!(
                    "{} cannot view {}",
                    actor.username, project.name
                ))
                .into());
            }
            let assigned_to = match (mine, caller) {
                (true, _) => Some(actor.id),
                (false, Some(name)) => Some(find_user(db, &name)?.id),
                (false, None) => None,
            };
            let offset = page.saturating_sub(1) * limit;
            let contacts = db.list_contacts(project.id, assigned_to, limit, offset)?;
            if contacts.is_empty() {
                println!("No contacts.");
            }
            for contact in &contacts {
                let caller = contact
                    .assigned_caller
                    .map(|id| engine.username(id))
                    .transpose()?;
                print_contact_row(contact, caller.as_deref());
            }
        }
        ContactCommand::Show { project, contact } => {
            let project = find_project(db, &project)?;
            let contact = find_contact(db, &project, &contact)?;
            if !contact.is_held_by(actor.id) && !engine.can_work(project.id, actor.id)? {
                return Err(CrmError::permission(format!(
                    "{} cannot view this contact",
                    actor.username
                ))
                .into());
            }
            let caller = contact
                .assigned_caller
                .map(|id| engine.username(id))
                .transpose()?;
            let calls = db.get_calls_for_contact(contact.id)?;
            let logs = db.get_logs_for_contact(contact.id)?;
            print_contact_detail(&contact, caller.as_deref(), &calls, &logs);
        }
        ContactCommand::Deactivate { project, contact } => {
            let project = find_project(db, &project)?;
            require_admin(&engine, &project, &actor)?;
            let contact = find_contact(db, &project, &contact)?;
            set_active(db, &contact, &actor, false)?;
            println!("Deactivated {}", contact.full_name);
        }
        ContactCommand::Reactivate { project, contact } => {
            let project = find_project(db, &project)?;
            require_admin(&engine, &project, &actor)?;
            let contact = find_contact(db, &project, &contact)?;
            set_active(db, &contact, &actor, true)?;
            println!("Reactivated {}", contact.full_name);
        }
    }
    Ok(())
}

fn set_active(db: &Database, contact: &Contact, actor: &User, active: bool) -> Result<()> {
    let action = if active { "Reactivated" } else { "Deactivated" };
    db.immediate(|| {
        if active {
            db.reactivate_contact(contact.id)?;
        } else {
            db.deactivate_contact(contact.id)?;
        }
        db.insert_contact_log(
            &ContactLog::new(
                contact.id,
                format!("{} by {}", action, actor.username),
                Some(actor.id),
            )
            .at(Utc::now()),
        )
    })
}

pub fn run_config(db: &Database, config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Get { key: None } => {
            for key in SETTING_KEYS {
                println!("  {:<22} {}", key, config.value_of(key).unwrap_or_default());
            }
        }
        ConfigCommand::Get { key: Some(key) } => {
            let value = config
                .value_of(&key)
                .ok_or_else(|| anyhow!("Unknown setting: {}", key))?;
            println!("{}", value);
            if std::env::var(env_var_for(&key)).is_ok() {
                eprintln!("(set by {})", env_var_for(&key));
            } else if db.get_setting(&key)?.is_none() {
                eprintln!("(default)");
            }
        }
        ConfigCommand::Set { key, value } => {
            Config::store(db, &key, &value)?;
            println!("{} = {}", key, value);
            if std::env::var(env_var_for(&key)).is_ok() {
                eprintln!("Note: {} overrides this value", env_var_for(&key));
            }
        }
    }
    Ok(())
}
