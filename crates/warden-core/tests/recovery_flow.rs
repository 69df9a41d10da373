//! Recovery gate behavior across lockdown, director responses, and
//! tampering.

use warden_core::audit::AuditLog;
use warden_core::escalation::EscalationStore;
use warden_core::mode::{Mode, ModeAuthority};
use warden_core::recovery::RecoveryGate;
use warden_core::store::{self, bootstrap};
use warden_core::{Context, Role};

fn context() -> (tempfile::TempDir, Context) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ctx = Context::new(tmp.path());
    bootstrap::initialize_all(&ctx).expect("bootstrap");
    (tmp, ctx)
}

#[test]
fn unacknowledged_escalation_blocks_then_ack_unblocks() {
    let (_tmp, ctx) = context();
    let gate = RecoveryGate::new(&ctx);
    let escalations = EscalationStore::new(&ctx);
    let modes = ModeAuthority::new(&ctx);

    gate.trigger_lockdown(Role::Director, "test").unwrap();
    let id = escalations.insert_detected("X", "m").unwrap();
    escalations.mark_notified(id).unwrap();

    let (ok, issues) = gate.verify_recovery_conditions().unwrap();
    assert!(!ok);
    assert_eq!(issues, vec!["1 escalation(s) not acknowledged".to_string()]);
    assert!(gate.confirm_recovery().is_err());
    assert_eq!(modes.get_mode().unwrap().mode, Mode::Lockdown);

    escalations.acknowledge(id).unwrap();
    let (ok, issues) = gate.verify_recovery_conditions().unwrap();
    assert!(ok);
    assert!(issues.is_empty());

    gate.confirm_recovery().unwrap();
    let tail: Vec<Mode> = modes
        .history()
        .unwrap()
        .iter()
        .rev()
        .take(2)
        .rev()
        .map(|r| r.mode)
        .collect();
    assert_eq!(tail, vec![Mode::Recovery, Mode::Normal]);
}

#[test]
fn tampered_audit_row_fails_integrity_and_blocks_the_gate() {
    let (_tmp, ctx) = context();
    let gate = RecoveryGate::new(&ctx);
    let audit = AuditLog::new(&ctx);

    for n in 0..5 {
        audit
            .log(Role::System, "alert_created", Some("X"), Some(&format!("sample {n}")))
            .unwrap();
    }
    assert!(audit.verify_integrity().unwrap());

    let conn = store::open(&ctx.paths.audit_db).unwrap();
    conn.execute("UPDATE log SET details = 'doctored' WHERE id = 2", [])
        .unwrap();

    assert!(!audit.verify_integrity().unwrap());

    gate.trigger_lockdown(Role::Director, "tamper drill").unwrap();
    let (ok, issues) = gate.verify_recovery_conditions().unwrap();
    assert!(!ok);
    assert!(issues.contains(&"Audit log integrity check failed".to_string()));
}

#[test]
fn set_mode_get_mode_round_trip() {
    let (_tmp, ctx) = context();
    let modes = ModeAuthority::new(&ctx);

    modes.set_mode(Mode::Alert, "looking into it").unwrap();
    let record = modes.get_mode().unwrap();
    assert_eq!(record.mode, Mode::Alert);
    assert_eq!(record.reason.as_deref(), Some("looking into it"));
}
