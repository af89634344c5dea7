//! Users, projects and the per-project membership registry.

use anyhow::Result;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::{is_unique_violation, parse_ts, parse_uuid, ts, Database};
use crate::error::CrmError;
use crate::models::*;

const USER_COLUMNS: &str = "u.id, u.username, u.phone_number, u.is_superuser, u.created_at";

impl Database {
    // ==================== USERS ====================

    pub fn insert_user(&self, user: &User) -> crate::error::Result<()> {
        let result = self.conn.execute(
            "INSERT INTO users (id, username, phone_number, is_superuser, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                user.id.to_string(),
                user.username,
                user.phone_number,
                user.is_superuser as i32,
                ts(&user.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(CrmError::validation(format!(
                "username or phone already taken: {}",
                user.username
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.query_user(
            &format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS),
            &id.to_string(),
        )
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_user(
            &format!("SELECT {} FROM users u WHERE u.username = ?", USER_COLUMNS),
            username,
        )
    }

    pub fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.query_user(
            &format!("SELECT {} FROM users u WHERE u.phone_number = ?", USER_COLUMNS),
            phone,
        )
    }

    /// Superusers bypass every membership check.
    pub fn is_superuser(&self, user_id: Uuid) -> Result<bool> {
        let result = self.conn.query_row(
            "SELECT is_superuser FROM users WHERE id = ?",
            [user_id.to_string()],
            |row| row.get::<_, bool>(0),
        );

        match result {
            Ok(flag) => Ok(flag),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn query_user(&self, sql: &str, arg: &str) -> Result<Option<User>> {
        let result = self.conn.query_row(sql, [arg], Self::row_to_user);

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==================== PROJECTS ====================

    /// Create a project; its creator becomes the first admin.
    pub fn create_project(&self, name: &str, creator: Uuid) -> crate::error::Result<Project> {
        if name.trim().is_empty() {
            return Err(CrmError::validation("project name cannot be empty"));
        }
        if self.get_user(creator)?.is_none() {
            return Err(CrmError::NotFound(format!("user {}", creator)));
        }

        let project = Project::new(name.trim().to_string(), creator);
        self.immediate(|| {
            self.conn.execute(
                "INSERT INTO projects (id, name, description, status, created_by, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    project.id.to_string(),
                    project.name,
                    project.description,
                    project.status.as_str(),
                    project.created_by.to_string(),
                    ts(&project.created_at),
                    ts(&project.updated_at),
                ],
            )?;
            self.add_member(project.id, creator, Role::Admin)
        })?;

        tracing::info!(project_id = %project.id, creator = %creator, "Project created");
        Ok(project)
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let result = self.conn.query_row(
            "SELECT id, name, description, status, created_by, created_at, updated_at
             FROM projects WHERE id = ?",
            [id.to_string()],
            Self::row_to_project,
        );

        match result {
            Ok(project) => Ok(Some(project)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, status, created_by, created_at, updated_at
             FROM projects ORDER BY created_at DESC",
        )?;

        let projects = stmt
            .query_map([], Self::row_to_project)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(projects)
    }

    // ==================== MEMBERSHIP ====================

    pub fn add_member(&self, project_id: Uuid, user_id: Uuid, role: Role) -> crate::error::Result<()> {
        let membership = Membership::new(project_id, user_id, role);
        let result = self.conn.execute(
            "INSERT INTO project_memberships (project_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                membership.project_id.to_string(),
                membership.user_id.to_string(),
                membership.role.as_str(),
                ts(&membership.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(CrmError::validation(format!(
                "user {} is already a member of project {}",
                user_id, project_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Change an existing member's role. Returns false if the user is not a member.
    pub fn set_role(&self, project_id: Uuid, user_id: Uuid, role: Role) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE project_memberships SET role = ? WHERE project_id = ? AND user_id = ?",
            params![role.as_str(), project_id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    /// Drop a membership. Contacts the user holds keep their caller until
    /// released or reclaimed.
    pub fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM project_memberships WHERE project_id = ? AND user_id = ?",
            params![project_id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    pub fn role_of(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<Role>> {
        let result = self.conn.query_row(
            "SELECT role FROM project_memberships WHERE project_id = ? AND user_id = ?",
            params![project_id.to_string(), user_id.to_string()],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(role) => Ok(Role::parse(&role)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_members(&self, project_id: Uuid) -> Result<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, user_id, role, created_at FROM project_memberships
             WHERE project_id = ? ORDER BY created_at ASC, rowid ASC",
        )?;

        let members = stmt
            .query_map([project_id.to_string()], Self::row_to_membership)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(members)
    }

    /// Assignment candidates for a project, in membership insertion order.
    pub fn eligible_callers(&self, project_id: Uuid, include_admins: bool) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM project_memberships m
             JOIN users u ON u.id = m.user_id
             WHERE m.project_id = ? AND (m.role = 'caller' OR (? AND m.role = 'admin'))
             ORDER BY m.created_at ASC, m.rowid ASC",
            USER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let users = stmt
            .query_map(
                params![project_id.to_string(), include_admins],
                Self::row_to_user,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(users)
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            username: row.get(1)?,
            phone_number: row.get(2)?,
            is_superuser: row.get(3)?,
            created_at: parse_ts(&row.get::<_, String>(4)?)?,
        })
    }

    fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            name: row.get(1)?,
            description: row.get(2)?,
            status: ProjectStatus::parse(&row.get::<_, String>(3)?),
            created_by: parse_uuid(&row.get::<_, String>(4)?)?,
            created_at: parse_ts(&row.get::<_, String>(5)?)?,
            updated_at: parse_ts(&row.get::<_, String>(6)?)?,
        })
    }

    fn row_to_membership(row: &Row) -> rusqlite::Result<Membership> {
        let role: String = row.get(2)?;
        Ok(Membership {
            project_id: parse_uuid(&row.get::<_, String>(0)?)?,
            user_id: parse_uuid(&row.get::<_, String>(1)?)?,
            role: Role::parse(&role).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown role {}", role).into(),
                )
            })?,
            created_at: parse_ts(&row.get::<_, String>(3)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(db: &Database, name: &str) -> User {
        let user = User::new(name.to_string());
        db.insert_user(&user).unwrap();
        user
    }

    #[test]
    fn test_insert_and_find_user() {
        let db = Database::open_memory().unwrap();
        let mut u = User::new("ali".to_string());
        u.phone_number = Some("09121111111".to_string());
        db.insert_user(&u).unwrap();

        assert_eq!(db.get_user(u.id).unwrap().unwrap().username, "ali");
        assert_eq!(db.find_user_by_username("ali").unwrap().unwrap().id, u.id);
        assert_eq!(db.find_user_by_phone("09121111111").unwrap().unwrap().id, u.id);
        assert!(db.find_user_by_username("nobody").unwrap().is_none());
        assert!(!db.is_superuser(u.id).unwrap());
    }

    #[test]
    fn test_duplicate_username_is_validation_error() {
        let db = Database::open_memory().unwrap();
        user(&db, "ali");
        let err = db.insert_user(&User::new("ali".to_string())).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_create_project_makes_creator_admin() {
        let db = Database::open_memory().unwrap();
        let owner = user(&db, "owner");

        let project = db.create_project("Spring campaign", owner.id).unwrap();
        assert_eq!(db.role_of(project.id, owner.id).unwrap(), Some(Role::Admin));
        assert_eq!(db.get_project(project.id).unwrap().unwrap().name, "Spring campaign");
        assert_eq!(db.list_projects().unwrap().len(), 1);
    }

    #[test]
    fn test_create_project_rejects_empty_name() {
        let db = Database::open_memory().unwrap();
        let owner = user(&db, "owner");
        assert!(matches!(
            db.create_project("  ", owner.id),
            Err(CrmError::Validation(_))
        ));
    }

    #[test]
    fn test_membership_roles() {
        let db = Database::open_memory().unwrap();
        let owner = user(&db, "owner");
        let caller = user(&db, "caller");
        let project = db.create_project("P", owner.id).unwrap();

        assert_eq!(db.role_of(project.id, caller.id).unwrap(), None);
        db.add_member(project.id, caller.id, Role::Caller).unwrap();
        assert_eq!(db.role_of(project.id, caller.id).unwrap(), Some(Role::Caller));

        assert!(matches!(
            db.add_member(project.id, caller.id, Role::Admin),
            Err(CrmError::Validation(_))
        ));

        assert!(db.set_role(project.id, caller.id, Role::Contact).unwrap());
        assert_eq!(db.role_of(project.id, caller.id).unwrap(), Some(Role::Contact));

        assert!(db.remove_member(project.id, caller.id).unwrap());
        assert_eq!(db.role_of(project.id, caller.id).unwrap(), None);
        assert_eq!(db.list_members(project.id).unwrap().len(), 1);
    }

    #[test]
    fn test_roles_are_per_project() {
        let db = Database::open_memory().unwrap();
        let owner = user(&db, "owner");
        let u = user(&db, "u");
        let p1 = db.create_project("P1", owner.id).unwrap();
        let p2 = db.create_project("P2", owner.id).unwrap();

        db.add_member(p1.id, u.id, Role::Caller).unwrap();
        db.add_member(p2.id, u.id, Role::Admin).unwrap();

        assert_eq!(db.role_of(p1.id, u.id).unwrap(), Some(Role::Caller));
        assert_eq!(db.role_of(p2.id, u.id).unwrap(), Some(Role::Admin));
    }

    #[test]
    fn test_eligible_callers_order_and_admin_policy() {
        let db = Database::open_memory().unwrap();
        let owner = user(&db, "owner");
        let a = user(&db, "a");
        let b = user(&db, "b");
        let viewer = user(&db, "viewer");
        let project = db.create_project("P", owner.id).unwrap();
        db.add_member(project.id, a.id, Role::Caller).unwrap();
        db.add_member(project.id, b.id, Role::Caller).unwrap();
        db.add_member(project.id, viewer.id, Role::Contact).unwrap();

        let callers: Vec<Uuid> = db
            .eligible_callers(project.id, false)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(callers, vec![a.id, b.id]);

        let with_admins: Vec<Uuid> = db
            .eligible_callers(project.id, true)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(with_admins, vec![owner.id, a.id, b.id]);
    }
}
