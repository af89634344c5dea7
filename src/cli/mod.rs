use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::models::{Contact, Project, User};

pub mod admin;
pub mod display;
pub mod import;
pub mod sweep;
pub mod work;

pub use import::run_import;
pub use sweep::run_sweep;

#[derive(Parser)]
#[command(name = "leaddesk")]
#[command(about = "Call-center CRM: hand out leads, record calls, reclaim stale work")]
#[command(version)]
pub struct Cli {
    /// Database file (defaults to the user config directory)
    #[arg(long, global = true, env = "LEADDESK_DB")]
    pub db: Option<PathBuf>,

    /// Username the command runs as
    #[arg(long = "as", global = true, env = "LEADDESK_USER", value_name = "USERNAME")]
    pub as_user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage project membership and roles
    #[command(subcommand)]
    Member(MemberCommand),
    /// Manage contacts
    #[command(subcommand)]
    Contact(ContactCommand),
    /// Import contacts from CSV
    Import(ImportArgs),
    /// Get the next contact to call
    Next(ProjectArgs),
    /// Give a contact back to the pool
    Release(ContactArgs),
    /// Remove the assigned caller from a contact (admin)
    Unassign(ContactArgs),
    /// Assign contacts explicitly, overwriting current callers (admin)
    BulkAssign(BulkAssignArgs),
    /// Spread all unassigned contacts over the callers (admin)
    AutoAssign(AutoAssignArgs),
    /// Record and edit calls
    #[command(subcommand)]
    Call(CallCommand),
    /// Run reclamation sweeps
    Sweep(SweepArgs),
    /// Read or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user
    Add {
        username: String,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(long)]
        superuser: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Create a project; you become its admin
    Create { name: String },
    /// List projects
    List,
}

#[derive(Subcommand)]
pub enum MemberCommand {
    /// Add a user to a project
    Add {
        project: String,
        username: String,
        /// admin, caller or contact
        #[arg(short, long, default_value = "caller")]
        role: String,
    },
    /// Change a member's role
    Role {
        project: String,
        username: String,
        role: String,
    },
    /// Remove a user from a project
    Remove { project: String, username: String },
    /// List members of a project
    List { project: String },
}

#[derive(Subcommand)]
pub enum ContactCommand {
    /// Add a single contact
    Add {
        project: String,
        name: String,
        phone: String,
    },
    /// List active contacts
    List {
        project: String,
        /// Only contacts assigned to you
        #[arg(short, long)]
        mine: bool,
        /// Only contacts assigned to this caller
        #[arg(short, long, value_name = "USERNAME")]
        caller: Option<String>,
        #[arg(short, long, default_value = "1")]
        page: u32,
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show a contact with its calls and audit trail
    Show { project: String, contact: String },
    /// Deactivate a contact (admin)
    Deactivate { project: String, contact: String },
    /// Reactivate a contact (admin)
    Reactivate { project: String, contact: String },
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Project name or UUID
    pub project: String,
}

#[derive(Args)]
pub struct ContactArgs {
    pub project: String,
    /// Contact UUID or phone number
    pub contact: String,
}

#[derive(Args)]
pub struct ImportArgs {
    pub project: String,
    pub file: String,
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct BulkAssignArgs {
    pub project: String,
    /// Contact UUIDs or phone numbers
    #[arg(required = true)]
    pub contacts: Vec<String>,
    /// Caller to receive every contact; random callers when omitted
    #[arg(long, value_name = "USERNAME")]
    pub to: Option<String>,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct AutoAssignArgs {
    pub project: String,
    /// load-balanced or random (defaults to the configured strategy)
    #[arg(short, long)]
    pub strategy: Option<String>,
}

#[derive(Subcommand)]
pub enum CallCommand {
    /// Record a call to a contact
    Submit {
        project: String,
        contact: String,
        /// answered, no_answer, busy, unreachable, wrong_number,
        /// not_interested, callback_requested, interested, no_time
        #[arg(short, long)]
        result: Option<String>,
        /// Duration in seconds
        #[arg(short, long)]
        duration: Option<u32>,
        #[arg(short, long)]
        notes: Option<String>,
        /// Follow-up date (YYYY-MM-DD)
        #[arg(short, long)]
        follow_up: Option<String>,
    },
    /// Edit a recorded call
    Edit {
        call: String,
        #[arg(short, long)]
        result: Option<String>,
        #[arg(short, long)]
        duration: Option<u32>,
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(long)]
        follow_up_required: Option<bool>,
        #[arg(short, long)]
        follow_up: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Lock a call against edits (admin)
    Lock { call: String },
    /// Unlock a call for edits (admin)
    Unlock { call: String },
}

#[derive(Args)]
pub struct SweepArgs {
    /// Run a single sweep: stale, inactive or special-decay
    #[arg(long)]
    pub only: Option<String>,
    /// Keep running on the configured interval until Ctrl+C
    #[arg(short, long)]
    pub watch: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show effective settings, or one stored value
    Get { key: Option<String> },
    /// Store a setting
    Set { key: String, value: String },
}

/// Execute a parsed command line.
pub fn run(cli: Cli, db: &Database, config: &Config) -> Result<()> {
    let as_user = cli.as_user.as_deref();

    match cli.command {
        Commands::User(cmd) => admin::run_user(db, cmd),
        Commands::Project(cmd) => admin::run_project(db, as_user, cmd),
        Commands::Member(cmd) => admin::run_member(db, config, as_user, cmd),
        Commands::Contact(cmd) => admin::run_contact(db, config, as_user, cmd),
        Commands::Config(cmd) => admin::run_config(db, config, cmd),
        Commands::Import(args) => {
            let user = acting_user(db, as_user)?;
            let project = find_project(db, &args.project)?;
            run_import(db, config, project.id, user.id, &args.file, args.dry_run)
        }
        Commands::Next(args) => work::run_next(db, config, as_user, &args.project),
        Commands::Release(args) => work::run_release(db, config, as_user, &args),
        Commands::Unassign(args) => work::run_unassign(db, config, as_user, &args),
        Commands::BulkAssign(args) => work::run_bulk_assign(db, config, as_user, &args),
        Commands::AutoAssign(args) => work::run_auto_assign(db, config, as_user, &args),
        Commands::Call(cmd) => work::run_call(db, as_user, cmd),
        Commands::Sweep(args) => run_sweep(db, config, args.only.as_deref(), args.watch),
    }
}

/// The user named by `--as`.
pub fn acting_user(db: &Database, as_user: Option<&str>) -> Result<User> {
    let username = as_user
        .ok_or_else(|| anyhow!("No acting user. Pass --as <username> or set LEADDESK_USER."))?;
    find_user(db, username)
}

pub fn find_user(db: &Database, username: &str) -> Result<User> {
    db.find_user_by_username(username.trim())?
        .ok_or_else(|| anyhow!("No user named {}", username))
}

/// Project by UUID or exact name.
pub fn find_project(db: &Database, identifier: &str) -> Result<Project> {
    let identifier = identifier.trim();
    if let Ok(id) = Uuid::parse_str(identifier) {
        return db
            .get_project(id)?
            .ok_or_else(|| anyhow!("No project found with ID: {}", identifier));
    }

    let mut matches: Vec<Project> = db
        .list_projects()?
        .into_iter()
        .filter(|p| p.name == identifier)
        .collect();
    match matches.len() {
        0 => Err(anyhow!("No project named {}", identifier)),
        1 => Ok(matches.remove(0)),
        n => Err(anyhow!("{} projects are named {}; use the UUID", n, identifier)),
    }
}

/// Contact by UUID, or by phone within the project.
pub fn find_contact(db: &Database, project: &Project, identifier: &str) -> Result<Contact> {
    let identifier = identifier.trim();
    if let Ok(id) = Uuid::parse_str(identifier) {
        return match db.get_contact(id)? {
            Some(c) if c.project_id == project.id => Ok(c),
            _ => Err(anyhow!("No contact found with ID: {}", identifier)),
        };
    }

    let phone = import::normalize_phone(identifier)?;
    db.find_contact_by_phone(project.id, &phone)?
        .ok_or_else(|| anyhow!("No contact with phone {} in {}", phone, project.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "leaddesk", "--as", "sara", "bulk-assign", "Spring", "0911", "0912", "--to", "ali",
        ])
        .unwrap();
        assert_eq!(cli.as_user.as_deref(), Some("sara"));
        match cli.command {
            Commands::BulkAssign(args) => {
                assert_eq!(args.contacts, vec!["0911", "0912"]);
                assert_eq!(args.to.as_deref(), Some("ali"));
            }
            _ => panic!("wrong command"),
        }

        let cli = Cli::try_parse_from(["leaddesk", "sweep", "--only", "stale"]).unwrap();
        assert!(matches!(cli.command, Commands::Sweep(SweepArgs { watch: false, .. })));
    }

    #[test]
    fn test_resolvers() {
        let db = Database::open_memory().unwrap();
        let admin = User::new("admin".into());
        db.insert_user(&admin).unwrap();
        let project = db.create_project("Spring", admin.id).unwrap();
        let contact = Contact::new(project.id, "Lead".into(), "09123456789".into());
        db.insert_contact(&contact).unwrap();

        assert_eq!(find_project(&db, "Spring").unwrap().id, project.id);
        assert_eq!(find_project(&db, &project.id.to_string()).unwrap().id, project.id);
        assert!(find_project(&db, "Autumn").is_err());

        assert_eq!(find_contact(&db, &project, "912 345 6789").unwrap().id, contact.id);
        assert_eq!(
            find_contact(&db, &project, &contact.id.to_string()).unwrap().id,
            contact.id
        );

        assert_eq!(acting_user(&db, Some("admin")).unwrap().id, admin.id);
        assert!(acting_user(&db, None).is_err());
        assert!(acting_user(&db, Some("ghost")).is_err());
    }
}
