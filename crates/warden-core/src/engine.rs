//! Escalation engine.
//!
//! Each tick runs two phases. The ingest phase drains the watchdog's
//! alert files into escalation records, notifying the director on first
//! sight of a code. The promote phase climbs unanswered escalations up
//! the L1..L4 ladder by elapsed time. After a week of silence at the top
//! of the ladder, it quarantines the system.

use tracing::{info, warn};

use crate::alert::{self, Alert};
use crate::audit::AuditLog;
use crate::clock::parse_timestamp;
use crate::context::Context;
use crate::error::Result;
use crate::escalation::{Escalation, EscalationStore, Level};
use crate::mode::{Mode, ModeAuthority};
use crate::notify::Notifier;
use crate::role::Role;
use crate::settings::Settings;

/// Alert consumer and ladder driver.
#[derive(Debug)]
pub struct EscalationEngine {
    ctx: Context,
    escalations: EscalationStore,
    modes: ModeAuthority,
    settings: Settings,
    audit: AuditLog,
    notifier: Notifier,
}

impl EscalationEngine {
    /// Engine over the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            escalations: EscalationStore::new(ctx),
            modes: ModeAuthority::new(ctx),
            settings: Settings::new(ctx),
            audit: AuditLog::new(ctx),
            notifier: Notifier::new(ctx),
        }
    }

    /// One full tick: ingest then promote.
    pub fn tick(&self) -> Result<()> {
        self.ingest_alerts()?;
        self.promote_due()?;
        Ok(())
    }

    /// Drain pending alert files.
    ///
    /// Malformed alerts are audited and left in place for the operator;
    /// ingested alerts are deleted once their escalation write landed.
    pub fn ingest_alerts(&self) -> Result<usize> {
        let mut ingested = 0;
        for path in alert::pending_files(&self.ctx)? {
            let alert = match Alert::load(&path) {
                Ok(alert) => alert,
                Err(err) => {
                    warn!(path = %path.display(), %err, "malformed alert left in place");
                    let _ = self.audit.log(
                        Role::System,
                        "escalation_processing_error",
                        Some(&path.display().to_string()),
                        Some(&err.to_string()),
                    );
                    continue;
                }
            };

            if let Err(err) = self.apply_alert(&alert) {
                warn!(code = %alert.code, %err, "alert ingestion failed");
                let _ = self.audit.log(
                    Role::System,
                    "escalation_processing_error",
                    Some(&alert.code),
                    Some(&err.to_string()),
                );
                continue;
            }

            // A missed delete is retried next tick; re-ingestion is a
            // message update, so this is idempotent.
            if let Err(err) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), %err, "failed to delete ingested alert");
            }
            ingested += 1;
        }
        Ok(ingested)
    }

    fn apply_alert(&self, alert: &Alert) -> Result<()> {
        match self.escalations.get_by_code(&alert.code)? {
            None => {
                let id = self.escalations.insert_detected(&alert.code, &alert.message)?;
                self.notifier.escalation(id, Level::L1, &alert.message)?;
                self.escalations.mark_notified(id)?;
                self.audit.log(
                    Role::System,
                    "escalation_created",
                    Some(&alert.code),
                    Some(&alert.message),
                )?;
                info!(code = %alert.code, id, "new escalation at L1");
            }
            Some(existing) if !existing.state.is_terminal() => {
                // Latest observation wins; no promotion, no re-notify.
                self.escalations.update_message(existing.id, &alert.message)?;
                self.audit.log(
                    Role::System,
                    "escalation_updated",
                    Some(&alert.code),
                    Some(&alert.message),
                )?;
            }
            Some(_) => {
                // Terminal record: the alert is consumed without reopening.
            }
        }
        Ok(())
    }

    /// Promote every unanswered escalation whose threshold has elapsed.
    ///
    /// Promotions are evaluated per escalation, in id order; several can
    /// promote in one tick. A clock that moved backward yields a negative
    /// elapsed time and no promotion.
    pub fn promote_due(&self) -> Result<usize> {
        let mut promoted = 0;
        for escalation in self.escalations.active()? {
            if escalation.state.is_terminal() {
                // ACKNOWLEDGED stays on the active list for the recovery
                // gate but never climbs.
                continue;
            }
            match self.promote_one(&escalation) {
                Ok(true) => promoted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(code = %escalation.code, %err, "escalation check failed");
                    let _ = self.audit.log(
                        Role::System,
                        "escalation_check_error",
                        Some(&escalation.code),
                        Some(&err.to_string()),
                    );
                }
            }
        }
        Ok(promoted)
    }

    fn promote_one(&self, escalation: &Escalation) -> Result<bool> {
        let last_action = escalation
            .reminded_at
            .as_deref()
            .or(escalation.notified_at.as_deref())
            .unwrap_or(&escalation.created_at);
        let Some(last_action) = parse_timestamp(last_action) else {
            warn!(code = %escalation.code, "unparsable escalation timestamp");
            return Ok(false);
        };

        let elapsed = self.ctx.clock.now() - last_action;
        if elapsed < escalation.level.promotion_threshold() {
            return Ok(false);
        }

        if let Some(next) = escalation.level.next() {
            let message = escalation.message.as_deref().unwrap_or("");
            self.escalations.promote(escalation.id, next)?;
            self.notifier.escalation(escalation.id, next, message)?;
            self.audit.log(
                Role::System,
                "escalation_escalated",
                Some(&escalation.code),
                Some(&format!("Escalated to {next}")),
            )?;
            info!(code = %escalation.code, level = %next, "escalation promoted");
            Ok(true)
        } else {
            self.lockdown_from_l4(escalation)?;
            Ok(false)
        }
    }

    /// The safety interlock: an L4 escalation that has drawn no human
    /// response for a week quarantines the system, once.
    fn lockdown_from_l4(&self, escalation: &Escalation) -> Result<()> {
        if !self.settings.auto_lockdown_enabled() {
            return Ok(());
        }
        if self.modes.is_lockdown()? {
            return Ok(());
        }

        let message = escalation.message.as_deref().unwrap_or("");
        self.modes.set_mode(
            Mode::Lockdown,
            &format!(
                "Automatic lockdown triggered by L4 escalation: {}",
                escalation.code
            ),
        )?;
        self.audit.log(
            Role::System,
            "lockdown_triggered",
            Some(&escalation.code),
            Some(message),
        )?;
        self.notifier.lockdown(&escalation.code, message)?;
        warn!(code = %escalation.code, "automatic lockdown triggered by L4 escalation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime};

    use super::*;
    use crate::alert::Severity;
    use crate::clock::Clock;
    use crate::escalation::EscalationState;
    use crate::store::bootstrap;

    fn context() -> (tempfile::TempDir, Context) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let start =
            NaiveDateTime::parse_from_str("2025-06-01T08:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let ctx = Context::with_clock(tmp.path(), Clock::fixed(start));
        bootstrap::initialize_all(&ctx).expect("bootstrap");
        (tmp, ctx)
    }

    fn inject_alert(ctx: &Context, code: &str, message: &str) {
        Alert::new(ctx, Severity::Critical, code, message)
            .write(ctx)
            .expect("alert write");
    }

    #[test]
    fn first_alert_creates_l1_and_notifies() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "m");

        engine.tick().unwrap();

        let record = EscalationStore::new(&ctx).get_by_code("X").unwrap().unwrap();
        assert_eq!(record.level, Level::L1);
        assert_eq!(record.state, EscalationState::Notified);
        assert!(record.notified_at.is_some());

        let inbox: Vec<_> = std::fs::read_dir(&ctx.paths.inbox_director_dir)
            .unwrap()
            .collect();
        assert_eq!(inbox.len(), 1);
        assert!(alert::pending_files(&ctx).unwrap().is_empty(), "alert consumed");
    }

    #[test]
    fn repeat_alert_updates_message_without_promotion() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "first");
        engine.tick().unwrap();

        ctx.clock.advance(Duration::hours(1));
        inject_alert(&ctx, "X", "second");
        engine.tick().unwrap();

        let record = EscalationStore::new(&ctx).get_by_code("X").unwrap().unwrap();
        assert_eq!(record.level, Level::L1);
        assert_eq!(record.message.as_deref(), Some("second"));

        let inbox: Vec<_> = std::fs::read_dir(&ctx.paths.inbox_director_dir)
            .unwrap()
            .collect();
        assert_eq!(inbox.len(), 1, "no re-notification on message update");
    }

    #[test]
    fn malformed_alert_is_retained() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        let path = ctx.paths.system_alerts_dir.join("BAD_20250601_080000.json");
        std::fs::write(&path, "{\"level\": \"WARNING\"}").unwrap();

        engine.tick().unwrap();

        assert!(path.exists(), "malformed alert must stay for inspection");
        let actions: Vec<String> = AuditLog::new(&ctx)
            .recent(10)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert!(actions.contains(&"escalation_processing_error".to_string()));
    }

    #[test]
    fn acknowledged_escalations_never_promote() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "m");
        engine.tick().unwrap();

        let store = EscalationStore::new(&ctx);
        let id = store.get_by_code("X").unwrap().unwrap().id;
        store.acknowledge(id).unwrap();

        ctx.clock.advance(Duration::hours(500));
        engine.tick().unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.level, Level::L1);
        assert_eq!(record.state, EscalationState::Acknowledged);
    }

    #[test]
    fn resolved_code_is_not_reopened_by_new_alert() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "m");
        engine.tick().unwrap();

        let store = EscalationStore::new(&ctx);
        let id = store.get_by_code("X").unwrap().unwrap().id;
        store.resolve(id, "handled").unwrap();

        ctx.clock.advance(Duration::hours(1));
        inject_alert(&ctx, "X", "again");
        engine.tick().unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.state, EscalationState::Resolved);
        assert_eq!(record.message.as_deref(), Some("m"), "terminal record untouched");
        assert!(alert::pending_files(&ctx).unwrap().is_empty(), "alert still consumed");
    }

    #[test]
    fn backward_clock_skew_does_not_promote() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "m");
        engine.tick().unwrap();

        ctx.clock.advance(Duration::hours(-6));
        engine.tick().unwrap();

        let record = EscalationStore::new(&ctx).get_by_code("X").unwrap().unwrap();
        assert_eq!(record.level, Level::L1);
    }

    #[test]
    fn threshold_is_inclusive() {
        let (_tmp, ctx) = context();
        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "m");
        engine.tick().unwrap();

        ctx.clock.advance(Duration::hours(24));
        engine.tick().unwrap();

        let record = EscalationStore::new(&ctx).get_by_code("X").unwrap().unwrap();
        assert_eq!(record.level, Level::L2);
    }

    #[test]
    fn auto_lockdown_respects_the_kill_switch() {
        let (_tmp, ctx) = context();
        Settings::new(&ctx).set(crate::settings::AUTO_LOCKDOWN_ENABLED, "false").unwrap();

        let engine = EscalationEngine::new(&ctx);
        inject_alert(&ctx, "X", "m");
        engine.tick().unwrap();

        // Walk all the way up and past the L4 threshold.
        for hours in [24, 48, 72, 168] {
            ctx.clock.advance(Duration::hours(hours));
            engine.tick().unwrap();
        }

        assert!(!ModeAuthority::new(&ctx).is_lockdown().unwrap());
    }
}
