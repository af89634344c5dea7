//! Assignment engine: who works which contact.
//!
//! Every caller change goes through a compare-and-swap in the contact
//! ledger together with its audit row, inside one `BEGIN IMMEDIATE`
//! transaction. Caller-initiated claims that lose a race move on to the
//! next candidate; admin bulk assignment overwrites.

mod strategy;

pub use strategy::{pick_uniform, AssignmentStrategy, LoadBalancer};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{CrmError, Result};
use crate::models::*;

/// Candidates fetched per claim round in `request_next`.
const CLAIM_BATCH: u32 = 16;

pub struct AssignmentEngine<'a> {
    db: &'a Database,
    config: &'a Config,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(db: &'a Database, config: &'a Config) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    // ==================== PERMISSIONS ====================

    /// Superuser, or admin/caller member of the project.
    pub fn can_work(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        if self.db.is_superuser(user_id)? {
            return Ok(true);
        }
        Ok(self
            .db
            .role_of(project_id, user_id)?
            .map_or(false, |role| role.can_work_contacts()))
    }

    /// Superuser, or admin member of the project.
    pub fn is_admin(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        if self.db.is_superuser(user_id)? {
            return Ok(true);
        }
        Ok(self.db.role_of(project_id, user_id)? == Some(Role::Admin))
    }

    fn require_admin(&self, project_id: Uuid, user_id: Uuid) -> Result<()> {
        if self.is_admin(project_id, user_id)? {
            Ok(())
        } else {
            Err(CrmError::permission(format!(
                "user {} is not an admin of project {}",
                user_id, project_id
            )))
        }
    }

    pub fn eligible_callers(&self, project_id: Uuid) -> Result<Vec<User>> {
        Ok(self
            .db
            .eligible_callers(project_id, self.config.admins_in_pool)?)
    }

    // ==================== CALLER-INITIATED ====================

    /// Next contact for `caller`: their own oldest open contact if any,
    /// otherwise the oldest unassigned pending contact, claimed atomically.
    /// `None` means no work is available right now.
    pub fn request_next(&self, project_id: Uuid, caller: Uuid) -> Result<Option<Contact>> {
        if !self.can_work(project_id, caller)? {
            return Err(CrmError::permission(format!(
                "user {} cannot work contacts in project {}",
                caller, project_id
            )));
        }

        let backlog = self.db.assigned_to(
            project_id,
            caller,
            &[CallStatus::Pending, CallStatus::FollowUp],
        )?;
        if let Some(contact) = backlog.into_iter().next() {
            tracing::debug!(contact_id = %contact.id, caller = %caller, "Serving own backlog");
            return Ok(Some(contact));
        }

        for round in 0..self.config.claim_retries.max(1) {
            let candidates = self.db.unassigned_pending(project_id, CLAIM_BATCH)?;
            if candidates.is_empty() {
                return Ok(None);
            }

            for candidate in candidates {
                match self.claim(&candidate, caller) {
                    Ok(contact) => {
                        tracing::info!(contact_id = %contact.id, caller = %caller, "Contact claimed");
                        return Ok(Some(contact));
                    }
                    Err(CrmError::Conflict(id)) => {
                        tracing::debug!(contact_id = %id, caller = %caller, round, "Lost claim race");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::warn!(project_id = %project_id, caller = %caller, "Giving up after repeated lost claims");
        Ok(None)
    }

    fn claim(&self, candidate: &Contact, caller: Uuid) -> Result<Contact> {
        let now = Utc::now();
        self.db.immediate(|| {
            let contact = self.db.apply_assignment(candidate.id, None, caller, now)?;
            self.log(
                contact.id,
                format!("Claimed by {}", self.username(caller)?),
                Some(caller),
                now,
            )?;
            Ok(contact)
        })
    }

    /// Return a contact to the pool. Allowed for the holder, project admins
    /// and superusers. Resets the status to pending.
    pub fn release(&self, contact_id: Uuid, user: Uuid) -> Result<Contact> {
        self.with_fresh_contact(contact_id, |contact| {
            if !contact.is_held_by(user) && !self.is_admin(contact.project_id, user)? {
                return Err(CrmError::permission(format!(
                    "user {} may not release contact {}",
                    user, contact_id
                )));
            }

            let now = Utc::now();
            self.db.immediate(|| {
                let released = self.db.release(contact.id, contact.assigned_caller, now)?;
                self.log(
                    contact.id,
                    format!("Released by {}", self.username(user)?),
                    Some(user),
                    now,
                )?;
                Ok(released)
            })
        })
    }

    /// Admin-only: clear the caller without touching the call status, so
    /// the contact can be handed on by hand without restarting its workflow.
    pub fn remove_assigned_caller(&self, contact_id: Uuid, admin: Uuid) -> Result<Contact> {
        self.with_fresh_contact(contact_id, |contact| {
            self.require_admin(contact.project_id, admin)?;

            let now = Utc::now();
            self.db.immediate(|| {
                let cleared = self.db.clear_caller(contact.id, contact.assigned_caller, now)?;
                if let Some(old) = contact.assigned_caller {
                    self.log(
                        contact.id,
                        format!(
                            "Caller {} removed by {}",
                            self.username(old)?,
                            self.username(admin)?
                        ),
                        Some(admin),
                        now,
                    )?;
                }
                Ok(cleared)
            })
        })
    }

    /// Re-read the contact and retry `op` when it loses a race with
    /// another writer.
    fn with_fresh_contact<T>(
        &self,
        contact_id: Uuid,
        op: impl Fn(&Contact) -> Result<T>,
    ) -> Result<T> {
        let attempts = self.config.claim_retries.max(1);
        for _ in 0..attempts {
            let contact = self.get_contact(contact_id)?;
            match op(&contact) {
                Err(CrmError::Conflict(id)) => {
                    tracing::debug!(contact_id = %id, "Contact changed underneath, retrying");
                }
                other => return other,
            }
        }
        Err(CrmError::Conflict(contact_id))
    }

    // ==================== ADMIN / BATCH ====================

    /// Spread `contact_ids` over the eligible callers. Only contacts that
    /// are still unassigned are taken; returns how many were assigned.
    pub fn assign_pool(
        &self,
        project_id: Uuid,
        contact_ids: &[Uuid],
        strategy: AssignmentStrategy,
    ) -> Result<usize> {
        let pool: Vec<Uuid> = self
            .eligible_callers(project_id)?
            .into_iter()
            .map(|u| u.id)
            .collect();
        if pool.is_empty() {
            tracing::info!(project_id = %project_id, "No eligible callers, nothing assigned");
            return Ok(0);
        }

        let mut balancer = match strategy {
            AssignmentStrategy::LoadBalanced => {
                let loads = self.db.caller_loads(project_id, &pool)?;
                Some(LoadBalancer::new(pool.clone(), loads))
            }
            AssignmentStrategy::UniformRandom => None,
        };
        let mut rng = rand::thread_rng();

        let mut assigned = 0;
        for id in contact_ids {
            let Some(contact) = self.db.get_contact(*id)? else {
                continue;
            };
            if contact.project_id != project_id || contact.is_assigned() || !contact.is_active {
                continue;
            }

            let caller = match balancer.as_mut() {
                Some(lb) => lb.next(),
                None => pick_uniform(&pool, &mut rng),
            };
            let Some(caller) = caller else {
                break;
            };

            let now = Utc::now();
            let result = self.db.immediate(|| {
                self.db.apply_assignment(contact.id, None, caller, now)?;
                self.log(
                    contact.id,
                    format!(
                        "Auto-assigned to {} ({})",
                        self.username(caller)?,
                        strategy.as_str()
                    ),
                    None,
                    now,
                )
            });

            match result {
                Ok(()) => assigned += 1,
                Err(CrmError::Conflict(_)) => {
                    if let Some(lb) = balancer.as_mut() {
                        lb.undo(caller);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(project_id = %project_id, assigned, strategy = strategy.as_str(), "Pool assignment done");
        Ok(assigned)
    }

    /// Admin-only: distribute every unassigned pending contact of the project.
    pub fn assign_unassigned(
        &self,
        project_id: Uuid,
        admin: Uuid,
        strategy: AssignmentStrategy,
    ) -> Result<usize> {
        self.require_admin(project_id, admin)?;

        let mut total = 0;
        loop {
            let batch: Vec<Uuid> = self
                .db
                .unassigned_pending(project_id, self.config.sweep_batch_size)?
                .into_iter()
                .map(|c| c.id)
                .collect();
            if batch.is_empty() {
                break;
            }
            let assigned = self.assign_pool(project_id, &batch, strategy)?;
            total += assigned;
            if assigned == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// Admin-only explicit assignment. Overwrites current callers. With a
    /// `target` every contact goes to that caller, otherwise each contact
    /// draws a uniformly random eligible caller.
    pub fn bulk_assign(
        &self,
        project_id: Uuid,
        contact_ids: &[Uuid],
        target: Option<Uuid>,
        admin: Uuid,
    ) -> Result<usize> {
        self.require_admin(project_id, admin)?;
        if contact_ids.is_empty() {
            return Err(CrmError::validation("no contacts given"));
        }

        let pool: Vec<Uuid> = match target {
            Some(caller) => {
                if self.db.role_of(project_id, caller)? != Some(Role::Caller) {
                    return Err(CrmError::validation(format!(
                        "user {} is not a caller in project {}",
                        caller, project_id
                    )));
                }
                vec![caller]
            }
            None => self
                .eligible_callers(project_id)?
                .into_iter()
                .map(|u| u.id)
                .collect(),
        };
        if pool.is_empty() {
            return Err(CrmError::validation(format!(
                "project {} has no callers",
                project_id
            )));
        }

        let mut rng = rand::thread_rng();
        let now = Utc::now();
        let admin_name = self.username(admin)?;

        let updated = self.db.immediate(|| {
            let mut updated = 0;
            for id in contact_ids {
                let Some(contact) = self.db.get_contact(*id)? else {
                    continue;
                };
                if contact.project_id != project_id {
                    continue;
                }
                let Some(caller) = pick_uniform(&pool, &mut rng) else {
                    break;
                };
                if self.db.force_assignment(contact.id, caller, now)? {
                    self.log(
                        contact.id,
                        format!("Assigned to {} by {}", self.username(caller)?, admin_name),
                        Some(admin),
                        now,
                    )?;
                    updated += 1;
                }
            }
            Ok::<_, CrmError>(updated)
        })?;

        tracing::info!(project_id = %project_id, updated, "Bulk assignment done");
        Ok(updated)
    }

    // ==================== RECLAMATION ====================

    /// Move `seen` to a different eligible caller picked uniformly at random.
    /// Returns the new caller, or `None` when nobody else is eligible (the
    /// contact is left as it is). Fails with `Conflict` if the row changed
    /// since `seen` was read.
    pub fn reassign(&self, seen: &Contact, reason: &str, at: DateTime<Utc>) -> Result<Option<Uuid>> {
        let pool: Vec<Uuid> = self
            .eligible_callers(seen.project_id)?
            .into_iter()
            .map(|u| u.id)
            .filter(|id| Some(*id) != seen.assigned_caller)
            .collect();

        let Some(new_caller) = pick_uniform(&pool, &mut rand::thread_rng()) else {
            tracing::warn!(contact_id = %seen.id, "No other eligible caller, leaving contact as is");
            return Ok(None);
        };

        self.db.immediate(|| {
            self.db.apply_reassignment(seen, new_caller, at)?;
            let old = match seen.assigned_caller {
                Some(id) => self.username(id)?,
                None => "nobody".to_string(),
            };
            self.log(
                seen.id,
                format!(
                    "Reassigned from {} to {}: {}",
                    old,
                    self.username(new_caller)?,
                    reason
                ),
                None,
                at,
            )
        })?;

        tracing::info!(
            contact_id = %seen.id,
            old_caller = ?seen.assigned_caller,
            new_caller = %new_caller,
            reason,
            "Contact reassigned"
        );
        Ok(Some(new_caller))
    }

    // ==================== HELPERS ====================

    pub(crate) fn get_contact(&self, contact_id: Uuid) -> Result<Contact> {
        self.db
            .get_contact(contact_id)?
            .ok_or_else(|| CrmError::NotFound(format!("contact {}", contact_id)))
    }

    pub(crate) fn username(&self, user_id: Uuid) -> Result<String> {
        Ok(self
            .db
            .get_user(user_id)?
            .map(|u| u.username)
            .unwrap_or_else(|| user_id.to_string()))
    }

    pub(crate) fn log(
        &self,
        contact_id: Uuid,
        action: String,
        performed_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.db
            .insert_contact_log(&ContactLog::new(contact_id, action, performed_by).at(at))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Fixture {
        db: Database,
        config: Config,
        project: Project,
        admin: User,
        a: User,
        b: User,
    }

    impl Fixture {
        fn engine(&self) -> AssignmentEngine<'_> {
            AssignmentEngine::new(&self.db, &self.config)
        }

        fn contact(&self, phone: &str) -> Contact {
            let c = Contact::new(self.project.id, format!("Lead {}", phone), phone.to_string());
            self.db.insert_contact(&c).unwrap();
            c
        }

        fn user(&self, name: &str) -> User {
            let u = User::new(name.to_string());
            self.db.insert_user(&u).unwrap();
            u
        }
    }

    fn fixture() -> Fixture {
        let db = Database::open_memory().unwrap();
        let admin = User::new("admin".into());
        let a = User::new("a".into());
        let b = User::new("b".into());
        for u in [&admin, &a, &b] {
            db.insert_user(u).unwrap();
        }
        let project = db.create_project("P", admin.id).unwrap();
        db.add_member(project.id, a.id, Role::Caller).unwrap();
        db.add_member(project.id, b.id, Role::Caller).unwrap();
        Fixture {
            db,
            config: Config::default(),
            project,
            admin,
            a,
            b,
        }
    }

    #[test]
    fn test_request_next_requires_membership() {
        let f = fixture();
        let outsider = f.user("outsider");
        f.contact("1");

        let err = f.engine().request_next(f.project.id, outsider.id).unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));

        let viewer = f.user("viewer");
        f.db.add_member(f.project.id, viewer.id, Role::Contact).unwrap();
        let err = f.engine().request_next(f.project.id, viewer.id).unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));
    }

    #[test]
    fn test_superuser_bypasses_membership() {
        let f = fixture();
        let mut root = User::new("root".into());
        root.is_superuser = true;
        f.db.insert_user(&root).unwrap();
        let c = f.contact("1");

        let got = f.engine().request_next(f.project.id, root.id).unwrap().unwrap();
        assert_eq!(got.id, c.id);
        assert_eq!(got.assigned_caller, Some(root.id));
    }

    #[test]
    fn test_two_callers_one_contact() {
        let f = fixture();
        let c1 = f.contact("1");

        let got = f.engine().request_next(f.project.id, f.a.id).unwrap().unwrap();
        assert_eq!(got.id, c1.id);
        assert_eq!(got.assigned_caller, Some(f.a.id));

        assert!(f.engine().request_next(f.project.id, f.b.id).unwrap().is_none());

        let c2 = f.contact("2");
        let got = f.engine().request_next(f.project.id, f.b.id).unwrap().unwrap();
        assert_eq!(got.id, c2.id);
    }

    #[test]
    fn test_own_follow_up_before_new_leads() {
        let f = fixture();
        let mine = f.contact("0");
        f.db.apply_assignment(mine.id, None, f.a.id, Utc::now()).unwrap();
        f.db.set_call_status(mine.id, CallStatus::FollowUp).unwrap();
        for i in 1..=10 {
            f.contact(&i.to_string());
        }

        let got = f.engine().request_next(f.project.id, f.a.id).unwrap().unwrap();
        assert_eq!(got.id, mine.id);
        assert_eq!(f.db.unassigned_pending(f.project.id, 100).unwrap().len(), 10);
    }

    #[test]
    fn test_contacted_contact_does_not_block_new_work() {
        let f = fixture();
        let mine = f.contact("0");
        f.db.apply_assignment(mine.id, None, f.a.id, Utc::now()).unwrap();
        f.db.set_call_status(mine.id, CallStatus::Contacted).unwrap();
        let fresh = f.contact("1");

        let got = f.engine().request_next(f.project.id, f.a.id).unwrap().unwrap();
        assert_eq!(got.id, fresh.id);
    }

    #[test]
    fn test_request_next_is_stable_for_own_contact() {
        let f = fixture();
        f.contact("1");
        f.contact("2");
        let first = f.engine().request_next(f.project.id, f.a.id).unwrap().unwrap();
        let again = f.engine().request_next(f.project.id, f.a.id).unwrap().unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(f.db.unassigned_pending(f.project.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_release_permissions() {
        let f = fixture();
        let c = f.contact("1");
        f.engine().request_next(f.project.id, f.a.id).unwrap();

        let err = f.engine().release(c.id, f.b.id).unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));

        f.db.set_call_status(c.id, CallStatus::FollowUp).unwrap();
        let released = f.engine().release(c.id, f.a.id).unwrap();
        assert!(released.assigned_caller.is_none());
        assert_eq!(released.call_status, CallStatus::Pending);

        f.engine().request_next(f.project.id, f.b.id).unwrap();
        let released = f.engine().release(c.id, f.admin.id).unwrap();
        assert!(released.assigned_caller.is_none());

        let logs = f.db.get_logs_for_contact(c.id).unwrap();
        assert!(logs.iter().any(|l| l.action == "Released by admin"));
    }

    #[test]
    fn test_remove_assigned_caller_is_admin_only_and_keeps_status() {
        let f = fixture();
        let c = f.contact("1");
        f.engine().request_next(f.project.id, f.a.id).unwrap();
        f.db.set_call_status(c.id, CallStatus::FollowUp).unwrap();

        let err = f.engine().remove_assigned_caller(c.id, f.a.id).unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));

        let cleared = f.engine().remove_assigned_caller(c.id, f.admin.id).unwrap();
        assert!(cleared.assigned_caller.is_none());
        assert_eq!(cleared.call_status, CallStatus::FollowUp);
    }

    #[test]
    fn test_release_missing_contact() {
        let f = fixture();
        let err = f.engine().release(Uuid::new_v4(), f.admin.id).unwrap_err();
        assert!(matches!(err, CrmError::NotFound(_)));
    }

    #[test]
    fn test_assign_pool_load_balanced_evens_out() {
        let f = fixture();
        let now = Utc::now();
        for phone in ["x1", "x2", "x3"] {
            let c = f.contact(phone);
            f.db.apply_assignment(c.id, None, f.a.id, now).unwrap();
        }
        let ids: Vec<Uuid> = (0..5).map(|i| f.contact(&i.to_string()).id).collect();

        let assigned = f
            .engine()
            .assign_pool(f.project.id, &ids, AssignmentStrategy::LoadBalanced)
            .unwrap();
        assert_eq!(assigned, 5);

        let loads = f.db.caller_loads(f.project.id, &[f.a.id, f.b.id]).unwrap();
        assert_eq!(loads[&f.a.id], 4);
        assert_eq!(loads[&f.b.id], 4);
    }

    #[test]
    fn test_assign_pool_skips_already_assigned() {
        let f = fixture();
        let taken = f.contact("1");
        f.db.apply_assignment(taken.id, None, f.a.id, Utc::now()).unwrap();
        let free = f.contact("2");

        let assigned = f
            .engine()
            .assign_pool(
                f.project.id,
                &[taken.id, free.id],
                AssignmentStrategy::UniformRandom,
            )
            .unwrap();
        assert_eq!(assigned, 1);
        assert_eq!(
            f.db.get_contact(taken.id).unwrap().unwrap().assigned_caller,
            Some(f.a.id)
        );
        assert!(f.db.get_contact(free.id).unwrap().unwrap().is_assigned());
    }

    #[test]
    fn test_assign_pool_without_callers_is_noop() {
        let db = Database::open_memory().unwrap();
        let admin = User::new("admin".into());
        db.insert_user(&admin).unwrap();
        let project = db.create_project("Empty", admin.id).unwrap();
        let c = Contact::new(project.id, "Lead".into(), "1".into());
        db.insert_contact(&c).unwrap();
        let config = Config::default();

        let engine = AssignmentEngine::new(&db, &config);
        assert_eq!(
            engine
                .assign_pool(project.id, &[c.id], AssignmentStrategy::LoadBalanced)
                .unwrap(),
            0
        );
        assert!(!db.get_contact(c.id).unwrap().unwrap().is_assigned());
    }

    #[test]
    fn test_assign_unassigned_covers_everything() {
        let f = fixture();
        for i in 0..7 {
            f.contact(&i.to_string());
        }
        let assigned = f
            .engine()
            .assign_unassigned(f.project.id, f.admin.id, AssignmentStrategy::LoadBalanced)
            .unwrap();
        assert_eq!(assigned, 7);
        assert!(f.db.unassigned_pending(f.project.id, 10).unwrap().is_empty());

        let err = f
            .engine()
            .assign_unassigned(f.project.id, f.a.id, AssignmentStrategy::LoadBalanced)
            .unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));
    }

    #[test]
    fn test_bulk_assign_overwrites_to_target() {
        let f = fixture();
        let c1 = f.contact("1");
        let c2 = f.contact("2");
        f.db.apply_assignment(c1.id, None, f.a.id, Utc::now()).unwrap();

        let updated = f
            .engine()
            .bulk_assign(f.project.id, &[c1.id, c2.id], Some(f.b.id), f.admin.id)
            .unwrap();
        assert_eq!(updated, 2);
        for id in [c1.id, c2.id] {
            assert_eq!(
                f.db.get_contact(id).unwrap().unwrap().assigned_caller,
                Some(f.b.id)
            );
        }
    }

    #[test]
    fn test_bulk_assign_checks() {
        let f = fixture();
        let c = f.contact("1");

        let err = f
            .engine()
            .bulk_assign(f.project.id, &[c.id], Some(f.b.id), f.a.id)
            .unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));

        let outsider = f.user("outsider");
        let err = f
            .engine()
            .bulk_assign(f.project.id, &[c.id], Some(outsider.id), f.admin.id)
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));

        let err = f
            .engine()
            .bulk_assign(f.project.id, &[], None, f.admin.id)
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_bulk_assign_random_ignores_other_projects() {
        let f = fixture();
        let other = f.db.create_project("Q", f.admin.id).unwrap();
        let foreign = Contact::new(other.id, "Elsewhere".into(), "9".into());
        f.db.insert_contact(&foreign).unwrap();
        let c = f.contact("1");

        let updated = f
            .engine()
            .bulk_assign(f.project.id, &[c.id, foreign.id], None, f.admin.id)
            .unwrap();
        assert_eq!(updated, 1);
        let holder = f.db.get_contact(c.id).unwrap().unwrap().assigned_caller.unwrap();
        assert!(holder == f.a.id || holder == f.b.id);
        assert!(!f.db.get_contact(foreign.id).unwrap().unwrap().is_assigned());
    }

    #[test]
    fn test_reassign_excludes_current_holder() {
        let f = fixture();
        for i in 0..20 {
            let c = f.contact(&i.to_string());
            let seen = f.db.apply_assignment(c.id, None, f.a.id, Utc::now()).unwrap();
            let new_caller = f
                .engine()
                .reassign(&seen, "test", Utc::now() + Duration::seconds(1))
                .unwrap();
            assert_eq!(new_caller, Some(f.b.id));
        }
    }

    #[test]
    fn test_reassign_with_single_caller_is_skipped() {
        let f = fixture();
        f.db.remove_member(f.project.id, f.b.id).unwrap();
        let c = f.contact("1");
        let seen = f.db.apply_assignment(c.id, None, f.a.id, Utc::now()).unwrap();

        assert_eq!(f.engine().reassign(&seen, "test", Utc::now()).unwrap(), None);
        assert_eq!(
            f.db.get_contact(c.id).unwrap().unwrap().assigned_caller,
            Some(f.a.id)
        );
    }

    #[test]
    fn test_reassign_writes_audit_row() {
        let f = fixture();
        let c = f.contact("1");
        let seen = f.db.apply_assignment(c.id, None, f.a.id, Utc::now()).unwrap();

        f.engine().reassign(&seen, "no call in 24h", Utc::now()).unwrap();
        let logs = f.db.get_logs_for_contact(c.id).unwrap();
        assert_eq!(logs[0].action, "Reassigned from a to b: no call in 24h");
        assert_eq!(logs[0].performed_by, None);
    }
}
