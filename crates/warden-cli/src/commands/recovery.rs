//! Director recovery commands.

use warden_core::recovery::RecoveryGate;
use warden_core::{Result, Role};

use super::Session;

pub fn verify(session: &Session) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let (ok, issues) = RecoveryGate::new(&session.ctx).verify_recovery_conditions()?;
    if ok {
        println!("All recovery conditions met.");
        println!("Run 'warden --role=director recovery confirm' to complete recovery.");
    } else {
        println!("Recovery blocked by:");
        for issue in issues {
            println!("  - {issue}");
        }
    }
    Ok(())
}

pub fn confirm(session: &Session) -> Result<()> {
    session.enforce_role(Role::Director)?;

    RecoveryGate::new(&session.ctx).confirm_recovery()?;
    println!("Recovery completed. System returned to NORMAL mode.");
    Ok(())
}
