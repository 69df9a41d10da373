//! Director audit-tail command.

use warden_core::{Result, Role};

use super::Session;

pub fn tail(session: &Session, limit: usize) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let entries = session.audit.recent(limit)?;
    println!(
        "{:<20} {:<12} {:<25} {:<20} Details",
        "Timestamp", "Role", "Action", "Target"
    );
    println!("{}", "-".repeat(120));
    for entry in entries {
        let timestamp = entry.timestamp.chars().take(19).collect::<String>();
        let target = entry
            .target
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(20)
            .collect::<String>();
        let details = entry
            .details
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(40)
            .collect::<String>();
        println!(
            "{timestamp:<20} {:<12} {:<25} {target:<20} {details}",
            entry.role, entry.action
        );
    }
    Ok(())
}
