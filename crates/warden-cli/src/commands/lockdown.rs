//! Director lockdown command.

use warden_core::recovery::RecoveryGate;
use warden_core::{Result, Role};

use super::Session;

pub fn trigger(session: &Session, reason: &str) -> Result<()> {
    session.enforce_role(Role::Director)?;

    RecoveryGate::new(&session.ctx).trigger_lockdown(session.role, reason)?;
    println!("System lockdown triggered.");
    println!("Reason: {reason}");
    Ok(())
}
