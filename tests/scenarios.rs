//! End-to-end flows against a file-backed database.

use chrono::{Duration, Utc};

use leaddesk::assign::AssignmentEngine;
use leaddesk::calls::{submit_call, CallOutcome};
use leaddesk::cli::import::import_contacts;
use leaddesk::config::Config;
use leaddesk::models::{CallResult, CallStatus, Contact, Role, User};
use leaddesk::reclaim::{Reclaimer, Sweep};
use leaddesk::Database;

struct Desk {
    _dir: tempfile::TempDir,
    db: Database,
    config: Config,
    admin: User,
    a: User,
    b: User,
}

fn desk() -> Desk {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(dir.path().join("desk.db")).unwrap();

    let admin = User::new("admin".into());
    let mut a = User::new("a".into());
    a.phone_number = Some("09120000001".into());
    let b = User::new("b".into());
    for u in [&admin, &a, &b] {
        db.insert_user(u).unwrap();
    }

    Desk {
        _dir: dir,
        db,
        config: Config::default(),
        admin,
        a,
        b,
    }
}

#[test]
fn import_work_and_reclaim() {
    let d = desk();
    let project = d.db.create_project("Spring", d.admin.id).unwrap();
    d.db.add_member(project.id, d.a.id, Role::Caller).unwrap();
    d.db.add_member(project.id, d.b.id, Role::Caller).unwrap();

    let csv = "full_name,phone,assigned_caller_phone\n\
               Vip,912 555 0001,09120000001\n\
               One,912 555 0002,\n\
               Two,912 555 0003,\n";
    let stats =
        import_contacts(&d.db, &d.config, project.id, d.admin.id, csv.as_bytes(), false).unwrap();
    assert_eq!(stats.created, 3);
    assert_eq!(stats.special, 1);
    assert_eq!(stats.auto_assigned, 2);

    // Load-balanced: b takes the first free lead, a (already holding the
    // special one) the second.
    let vip = d.db.find_contact_by_phone(project.id, "09125550001").unwrap().unwrap();
    let one = d.db.find_contact_by_phone(project.id, "09125550002").unwrap().unwrap();
    let two = d.db.find_contact_by_phone(project.id, "09125550003").unwrap().unwrap();
    assert!(vip.is_special);
    assert_eq!(vip.assigned_caller, Some(d.a.id));
    assert_eq!(one.assigned_caller, Some(d.b.id));
    assert_eq!(two.assigned_caller, Some(d.a.id));

    let engine = AssignmentEngine::new(&d.db, &d.config);
    let next_for_a = engine.request_next(project.id, d.a.id).unwrap().unwrap();
    assert_eq!(next_for_a.id, vip.id);

    let outcome = CallOutcome {
        result: Some(CallResult::CallbackRequested),
        ..Default::default()
    };
    let (_, contact) = submit_call(&d.db, vip.id, d.a.id, outcome).unwrap();
    assert_eq!(contact.call_status, CallStatus::FollowUp);

    // A day later the unworked regular contacts swap callers; the special
    // contact is exempt.
    let reclaimer = Reclaimer::new(&d.db, &d.config);
    let report = reclaimer
        .run(Sweep::Stale, Utc::now() + Duration::hours(25))
        .unwrap();
    assert_eq!(report.changed, 2);
    assert_eq!(d.db.get_contact(one.id).unwrap().unwrap().assigned_caller, Some(d.a.id));
    assert_eq!(d.db.get_contact(two.id).unwrap().unwrap().assigned_caller, Some(d.b.id));
    assert_eq!(d.db.get_contact(vip.id).unwrap().unwrap().assigned_caller, Some(d.a.id));

    // 72h after its last call the special contact decays for good.
    let report = reclaimer
        .run(Sweep::SpecialDecay, Utc::now() + Duration::hours(73))
        .unwrap();
    assert_eq!(report.changed, 1);
    let vip_after = d.db.get_contact(vip.id).unwrap().unwrap();
    assert!(!vip_after.is_special);
    assert!(vip_after.assigned_caller.is_none());
    assert_eq!(vip_after.call_status, CallStatus::FollowUp);
}

#[test]
fn own_follow_up_comes_before_fresh_leads() {
    let d = desk();
    let project = d.db.create_project("Priority", d.admin.id).unwrap();
    d.db.add_member(project.id, d.a.id, Role::Caller).unwrap();
    let engine = AssignmentEngine::new(&d.db, &d.config);

    let mut follow_up = Contact::new(project.id, "Mine".into(), "0911".into());
    follow_up.assigned_caller = Some(d.a.id);
    follow_up.call_status = CallStatus::FollowUp;
    d.db.insert_contact(&follow_up).unwrap();
    for i in 0..10 {
        let c = Contact::new(project.id, format!("Lead {}", i), format!("09{}", i));
        d.db.insert_contact(&c).unwrap();
    }

    let got = engine.request_next(project.id, d.a.id).unwrap().unwrap();
    assert_eq!(got.id, follow_up.id);
    assert_eq!(d.db.unassigned_pending(project.id, 100).unwrap().len(), 10);
}

#[test]
fn two_callers_one_lead_then_reassignment_after_a_day() {
    let d = desk();
    let project = d.db.create_project("Pair", d.admin.id).unwrap();
    d.db.add_member(project.id, d.a.id, Role::Caller).unwrap();
    d.db.add_member(project.id, d.b.id, Role::Caller).unwrap();
    let engine = AssignmentEngine::new(&d.db, &d.config);

    let c1 = Contact::new(project.id, "Only".into(), "0911".into());
    d.db.insert_contact(&c1).unwrap();

    let got = engine.request_next(project.id, d.a.id).unwrap().unwrap();
    assert_eq!(got.id, c1.id);
    assert!(engine.request_next(project.id, d.b.id).unwrap().is_none());

    let report = Reclaimer::new(&d.db, &d.config)
        .sweep_stale(Utc::now() + Duration::hours(25))
        .unwrap();
    assert_eq!(report.changed, 1);

    let moved = d.db.get_contact(c1.id).unwrap().unwrap();
    assert_eq!(moved.assigned_caller, Some(d.b.id));
    let logs = d.db.get_logs_for_contact(c1.id).unwrap();
    assert!(logs[0].action.starts_with("Reassigned from a to b"));
    assert_eq!(logs[0].performed_by, None);
}
