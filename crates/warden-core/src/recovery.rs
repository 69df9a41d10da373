//! Recovery gate.
//!
//! The only component that writes RECOVERY and the NORMAL that follows
//! it. LOCKDOWN is lifted by a director, and only once every predicate
//! holds: the system is actually locked down, every escalation has been
//! handled, every store verifies, and the audit log verifies.

use crate::audit::AuditLog;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::escalation::EscalationStore;
use crate::mode::{Mode, ModeAuthority, ModeRecord};
use crate::role::Role;
use crate::store;

/// Summary backing the director's `status` command.
#[derive(Debug)]
pub struct LockdownStatus {
    /// Current mode row.
    pub mode: ModeRecord,
    /// Whether `confirm_recovery` would succeed right now.
    pub can_recover: bool,
    /// Ordered human-readable reasons blocking recovery.
    pub issues: Vec<String>,
    /// Escalation counts grouped by state.
    pub escalation_counts: Vec<(String, i64)>,
}

/// Drives LOCKDOWN entry and the LOCKDOWN → RECOVERY → NORMAL exit.
#[derive(Debug)]
pub struct RecoveryGate {
    ctx: Context,
    modes: ModeAuthority,
    escalations: EscalationStore,
    audit: AuditLog,
}

impl RecoveryGate {
    /// Gate over the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            modes: ModeAuthority::new(ctx),
            escalations: EscalationStore::new(ctx),
            audit: AuditLog::new(ctx),
        }
    }

    /// Manual quarantine. Rejects when already in LOCKDOWN.
    pub fn trigger_lockdown(&self, role: Role, reason: &str) -> Result<()> {
        if self.modes.is_lockdown()? {
            return Err(Error::InvariantViolation(
                "System is already in LOCKDOWN mode".to_string(),
            ));
        }
        self.modes.set_mode(Mode::Lockdown, reason)?;
        self.audit.log(role, "lockdown_triggered", None, Some(reason))?;
        Ok(())
    }

    /// Evaluate the recovery predicate without mutating anything.
    ///
    /// Returns `(ok, issues)`; each failing conjunct contributes one
    /// ordered, human-readable issue.
    pub fn verify_recovery_conditions(&self) -> Result<(bool, Vec<String>)> {
        let mut issues = Vec::new();

        let record = self.modes.get_mode()?;
        if record.mode != Mode::Lockdown {
            issues.push(format!(
                "System is not in LOCKDOWN mode (current: {})",
                record.mode
            ));
        }

        let unhandled = self.escalations.unhandled_count()?;
        if unhandled > 0 {
            issues.push(format!("{unhandled} escalation(s) not acknowledged"));
        }

        for (name, ok) in store::verify_all(&self.ctx.paths) {
            if !ok {
                issues.push(format!("Database integrity check failed: {name}.db"));
            }
        }

        if !self.audit.verify_integrity().unwrap_or(false) {
            issues.push("Audit log integrity check failed".to_string());
        }

        Ok((issues.is_empty(), issues))
    }

    /// Lift LOCKDOWN.
    ///
    /// Re-evaluates the predicate, then performs the two sequential mode
    /// writes. RECOVERY is never stable; it exists so an observer
    /// sampling the mode mid-transition sees a well-defined, non-NORMAL
    /// value.
    pub fn confirm_recovery(&self) -> Result<()> {
        let (ok, issues) = self.verify_recovery_conditions()?;
        if !ok {
            return Err(Error::InvariantViolation(format!(
                "Cannot recover: {}",
                issues.join(", ")
            )));
        }

        self.modes.set_mode(Mode::Recovery, "Director confirmed recovery")?;
        self.audit.log(Role::Director, "recovery_initiated", None, None)?;

        self.modes.set_mode(Mode::Normal, "Recovery completed")?;
        self.audit.log(Role::Director, "recovery_completed", None, None)?;
        Ok(())
    }

    /// Snapshot for the `status` command.
    pub fn lockdown_status(&self) -> Result<LockdownStatus> {
        let mode = self.modes.get_mode()?;
        let (can_recover, issues) = self.verify_recovery_conditions()?;
        let escalation_counts = self.escalations.counts_by_state()?;
        Ok(LockdownStatus {
            mode,
            can_recover,
            issues,
            escalation_counts,
        })
    }
}
