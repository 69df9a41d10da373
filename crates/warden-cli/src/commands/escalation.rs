//! Director escalation commands.

use warden_core::escalation::EscalationStore;
use warden_core::{Result, Role};

use super::Session;

pub fn list(session: &Session) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let records = EscalationStore::new(&session.ctx).all()?;
    if records.is_empty() {
        println!("No escalations.");
        return Ok(());
    }

    println!(
        "{:<6} {:<30} {:<6} {:<15} Created",
        "ID", "Code", "Level", "State"
    );
    println!("{}", "-".repeat(100));
    for record in records {
        let created = record.created_at.chars().take(19).collect::<String>();
        println!(
            "{:<6} {:<30} {:<6} {:<15} {created}",
            record.id,
            record.code,
            record.level.as_str(),
            record.state.as_str()
        );
    }
    Ok(())
}

pub fn acknowledge(session: &Session, escalation_id: i64) -> Result<()> {
    session.enforce_role(Role::Director)?;

    EscalationStore::new(&session.ctx).acknowledge(escalation_id)?;
    session.audit.log(
        session.role,
        "escalation_acknowledged",
        Some(&format!("escalation_{escalation_id}")),
        None,
    )?;

    println!("Escalation {escalation_id} acknowledged.");
    Ok(())
}

pub fn resolve(session: &Session, escalation_id: i64, note: &str) -> Result<()> {
    session.enforce_role(Role::Director)?;

    EscalationStore::new(&session.ctx).resolve(escalation_id, note)?;
    session.audit.log(
        session.role,
        "escalation_resolved",
        Some(&format!("escalation_{escalation_id}")),
        Some(note),
    )?;

    println!("Escalation {escalation_id} resolved.");
    Ok(())
}
