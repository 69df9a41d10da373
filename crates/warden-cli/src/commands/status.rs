//! Director system-status command.

use warden_core::mode::Mode;
use warden_core::recovery::RecoveryGate;
use warden_core::{Result, Role};

use super::Session;

pub fn show(session: &Session) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let status = RecoveryGate::new(&session.ctx).lockdown_status()?;

    println!("System Mode: {}", status.mode.mode);
    println!("Last Updated: {}", status.mode.updated_at);
    if let Some(reason) = &status.mode.reason {
        println!("Reason: {reason}");
    }
    println!();

    println!("Escalations:");
    if status.escalation_counts.is_empty() {
        println!("  none");
    }
    for (state, count) in &status.escalation_counts {
        println!("  {state}: {count}");
    }
    println!();

    if status.mode.mode == Mode::Lockdown {
        println!("Recovery Status:");
        if status.can_recover {
            println!("  System can be recovered");
        } else {
            println!("  Recovery blocked by:");
            for issue in &status.issues {
                println!("    - {issue}");
            }
        }
    }
    Ok(())
}
