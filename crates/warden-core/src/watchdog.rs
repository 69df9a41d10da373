//! Watchdog health probes.
//!
//! Each tick runs three probes (disk usage, component heartbeats, store
//! integrity) and writes zero or more alert files for the escalation
//! engine. The watchdog never escalates by itself; it only observes.

use std::path::Path;

use tracing::warn;

use crate::alert::{Alert, Severity};
use crate::audit::AuditLog;
use crate::context::Context;
use crate::error::Result;
use crate::heartbeat::{Heartbeats, TASK_PROCESSOR, WATCHDOG};
use crate::role::Role;
use crate::settings::Settings;
use crate::store;

/// Periodic health prober.
#[derive(Debug)]
pub struct Watchdog {
    ctx: Context,
    settings: Settings,
    audit: AuditLog,
    heartbeats: Heartbeats,
}

impl Watchdog {
    /// Watchdog over the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            settings: Settings::new(ctx),
            audit: AuditLog::new(ctx),
            heartbeats: Heartbeats::new(ctx),
        }
    }

    /// Run all probes once and emit alerts. Returns the number emitted.
    ///
    /// The watchdog's own heartbeat is updated irrespective of alert
    /// emissions; a failing probe must not make the watchdog look dead.
    pub fn tick(&self) -> Result<usize> {
        let mut alerts = Vec::new();
        alerts.extend(self.disk_probe());
        alerts.extend(self.heartbeat_probe());
        alerts.extend(self.integrity_probe());

        let mut emitted = 0;
        for alert in &alerts {
            match alert.write(&self.ctx) {
                Ok(_) => {
                    emitted += 1;
                    self.audit.log(
                        Role::System,
                        "alert_created",
                        Some(&alert.code),
                        Some(&alert.message),
                    )?;
                }
                Err(err) => {
                    warn!(code = %alert.code, %err, "failed to write alert file");
                }
            }
        }

        self.heartbeats.beat_file(WATCHDOG)?;
        self.heartbeats.beat_row(WATCHDOG)?;
        Ok(emitted)
    }

    fn disk_probe(&self) -> Option<Alert> {
        let usage = disk_usage_percent(&self.ctx.paths.base);
        classify_disk_usage(
            usage,
            self.settings.disk_warning_threshold(),
            self.settings.disk_critical_threshold(),
        )
        .map(|(level, code, message)| Alert::new(&self.ctx, level, code, message))
    }

    fn heartbeat_probe(&self) -> Option<Alert> {
        let stale_minutes = self.settings.heartbeat_stale_minutes();
        let age = self.heartbeats.file_age_minutes(TASK_PROCESSOR)?;
        if age > stale_minutes {
            Some(Alert::new(
                &self.ctx,
                Severity::Warning,
                "HEARTBEAT_STALE_TASK_PROCESSOR",
                format!("Task processor heartbeat is {age:.1} minutes old"),
            ))
        } else {
            None
        }
    }

    fn integrity_probe(&self) -> Vec<Alert> {
        store::verify_all(&self.ctx.paths)
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| {
                Alert::new(
                    &self.ctx,
                    Severity::Critical,
                    format!("DB_INTEGRITY_{}", name.to_uppercase()),
                    format!("Database integrity check failed: {name}.db"),
                )
            })
            .collect()
    }
}

/// Classify a disk-usage reading against the two thresholds.
///
/// Exactly at the critical threshold classifies critical; exactly at the
/// warning threshold classifies warning. Critical wins.
fn classify_disk_usage(
    usage: f64,
    warning: f64,
    critical: f64,
) -> Option<(Severity, &'static str, String)> {
    if usage >= critical {
        Some((
            Severity::Critical,
            "DISK_CRITICAL",
            format!("Disk usage at {usage:.1}% (critical threshold: {critical}%)"),
        ))
    } else if usage >= warning {
        Some((
            Severity::Warning,
            "DISK_WARNING",
            format!("Disk usage at {usage:.1}% (warning threshold: {warning}%)"),
        ))
    } else {
        None
    }
}

/// Used-percentage of the filesystem holding `path`. Unreadable
/// filesystems read as 0 so a probe failure cannot page anyone.
#[must_use]
pub fn disk_usage_percent(path: &Path) -> f64 {
    let Ok(stat) = nix::sys::statvfs::statvfs(path) else {
        return 0.0;
    };
    #[allow(clippy::cast_precision_loss)]
    let total = (stat.blocks() as f64) * (stat.fragment_size() as f64);
    #[allow(clippy::cast_precision_loss)]
    let free = (stat.blocks_available() as f64) * (stat.fragment_size() as f64);
    if total <= 0.0 {
        return 0.0;
    }
    (total - free) / total * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bootstrap;

    fn context() -> (tempfile::TempDir, Context) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        bootstrap::initialize_all(&ctx).expect("bootstrap");
        // The disk probe reads the real filesystem; push the thresholds
        // out of reach so test assertions only see the probes under test.
        let tuning = Settings::new(&ctx);
        tuning.set(crate::settings::DISK_WARNING_THRESHOLD, "101").expect("set");
        tuning.set(crate::settings::DISK_CRITICAL_THRESHOLD, "101").expect("set");
        (tmp, ctx)
    }

    #[test]
    fn classification_boundaries_are_inclusive() {
        assert!(classify_disk_usage(79.9, 80.0, 90.0).is_none());

        let (level, code, _) = classify_disk_usage(80.0, 80.0, 90.0).unwrap();
        assert_eq!(level, Severity::Warning);
        assert_eq!(code, "DISK_WARNING");

        let (level, code, _) = classify_disk_usage(90.0, 80.0, 90.0).unwrap();
        assert_eq!(level, Severity::Critical);
        assert_eq!(code, "DISK_CRITICAL");

        // Critical wins above both thresholds.
        let (level, _, _) = classify_disk_usage(95.0, 80.0, 90.0).unwrap();
        assert_eq!(level, Severity::Critical);
    }

    #[test]
    fn disk_usage_reads_the_real_filesystem() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let usage = disk_usage_percent(tmp.path());
        assert!((0.0..=100.0).contains(&usage));
    }

    #[test]
    fn tick_updates_watchdog_heartbeat() {
        let (_tmp, ctx) = context();
        let watchdog = Watchdog::new(&ctx);
        watchdog.tick().unwrap();

        assert!(ctx.paths.heartbeat_file(WATCHDOG).is_file());
        let conn = store::open(&ctx.paths.system_db).unwrap();
        let status: String = conn
            .query_row(
                "SELECT status FROM heartbeats WHERE component = 'watchdog'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "OK");
    }

    #[test]
    fn fresh_heartbeat_emits_no_alert() {
        let (_tmp, ctx) = context();
        Heartbeats::new(&ctx).beat_file(TASK_PROCESSOR).unwrap();

        let watchdog = Watchdog::new(&ctx);
        assert!(watchdog.heartbeat_probe().is_none());
    }

    #[test]
    fn missing_heartbeat_emits_no_alert() {
        let (_tmp, ctx) = context();
        let watchdog = Watchdog::new(&ctx);
        assert!(watchdog.heartbeat_probe().is_none());
    }

    #[test]
    fn corrupted_store_emits_integrity_alert() {
        let (_tmp, ctx) = context();
        // Replacing the store file with garbage fails PRAGMA integrity_check.
        std::fs::write(&ctx.paths.shared_db, "garbage bytes, not a database").unwrap();

        let watchdog = Watchdog::new(&ctx);
        let alerts = watchdog.integrity_probe();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].code, "DB_INTEGRITY_SHARED");
        assert_eq!(alerts[0].level, Severity::Critical);

        let emitted = watchdog.tick().unwrap();
        assert_eq!(emitted, 1);
        let files = crate::alert::pending_files(&ctx).unwrap();
        assert_eq!(files.len(), 1);
    }
}
