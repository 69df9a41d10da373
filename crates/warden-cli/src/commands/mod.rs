//! Command handlers, one module per command group.

pub mod audit;
pub mod config;
pub mod escalation;
pub mod inbox;
pub mod lockdown;
pub mod recovery;
pub mod report;
pub mod status;
pub mod task;

use warden_core::audit::AuditLog;
use warden_core::error::{Error, Result};
use warden_core::mode::ModeAuthority;
use warden_core::{Context, Role};

/// Per-invocation state shared by every handler.
pub struct Session {
    /// Layout and clock.
    pub ctx: Context,
    /// Role asserted on the command line.
    pub role: Role,
    /// Audit writer.
    pub audit: AuditLog,
    /// Mode predicates.
    pub modes: ModeAuthority,
}

impl Session {
    /// Session for one CLI invocation.
    pub fn new(ctx: &Context, role: Role) -> Self {
        Self {
            ctx: ctx.clone(),
            role,
            audit: AuditLog::new(ctx),
            modes: ModeAuthority::new(ctx),
        }
    }

    /// Role-based access control. Audits the violation before denying.
    pub fn enforce_role(&self, required: Role) -> Result<()> {
        if self.role != required {
            self.audit.log(
                self.role,
                "role_violation",
                Some(required.as_str()),
                Some(&format!("Attempted to execute {required} command")),
            )?;
            return Err(Error::PolicyDenied(format!(
                "This command requires '{required}' role. You are logged in as '{}'.",
                self.role
            )));
        }
        Ok(())
    }

    /// Mode gate for researcher commands. Audits the denial.
    pub fn check_lockdown(&self) -> Result<()> {
        if self.role != Role::Researcher {
            return Ok(());
        }
        if self.modes.can_researcher_access()? {
            return Ok(());
        }

        let record = self.modes.get_mode()?;
        let reason = record.reason.clone().unwrap_or_default();
        self.audit.log(
            self.role,
            "lockdown_access_denied",
            None,
            Some(&format!("Mode: {}, Reason: {reason}", record.mode)),
        )?;
        Err(Error::ModeDenied(format!(
            "System is in {} mode. Researcher access is blocked.\nReason: {reason}\nContact the Director for recovery.",
            record.mode
        )))
    }
}
