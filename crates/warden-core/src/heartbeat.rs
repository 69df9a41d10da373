//! Component liveness attestation.
//!
//! Each daemon publishes a heartbeat file holding its last-liveness
//! timestamp; the watchdog additionally mirrors its own beat into the
//! system store. Staleness is judged by file mtime against the wall
//! clock, since a dead process cannot keep touching its file.

use rusqlite::params;

use crate::context::Context;
use crate::error::Result;
use crate::store;

/// Heartbeat component name for the task processor.
pub const TASK_PROCESSOR: &str = "task_processor";
/// Heartbeat component name for the watchdog.
pub const WATCHDOG: &str = "watchdog";

/// Heartbeat writer/reader over the layout named by `ctx`.
#[derive(Debug, Clone)]
pub struct Heartbeats {
    ctx: Context,
}

impl Heartbeats {
    /// Heartbeats for the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Touch the component's heartbeat file with the current timestamp.
    pub fn beat_file(&self, component: &str) -> Result<()> {
        let path = self.ctx.paths.heartbeat_file(component);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.ctx.clock.timestamp())?;
        Ok(())
    }

    /// Upsert the component's row mirror in the system store.
    pub fn beat_row(&self, component: &str) -> Result<()> {
        let conn = store::open(&self.ctx.paths.system_db)?;
        conn.execute(
            "INSERT OR REPLACE INTO heartbeats (component, last_beat, status) VALUES (?1, ?2, 'OK')",
            params![component, self.ctx.clock.timestamp()],
        )?;
        Ok(())
    }

    /// Age of the component's heartbeat file in minutes, judged by mtime.
    ///
    /// `None` when the file does not exist: a component that never ran is
    /// not the same signal as one that died, and operators tell them
    /// apart.
    #[must_use]
    pub fn file_age_minutes(&self, component: &str) -> Option<f64> {
        let path = self.ctx.paths.heartbeat_file(component);
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        let elapsed = modified.elapsed().unwrap_or_default();
        Some(elapsed.as_secs_f64() / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> (tempfile::TempDir, Context) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        ctx.paths.ensure_directories().expect("dirs");
        (tmp, ctx)
    }

    #[test]
    fn fresh_beat_has_near_zero_age() {
        let (_tmp, ctx) = context();
        let heartbeats = Heartbeats::new(&ctx);
        heartbeats.beat_file(TASK_PROCESSOR).unwrap();

        let age = heartbeats.file_age_minutes(TASK_PROCESSOR).unwrap();
        assert!(age < 1.0, "fresh heartbeat aged {age} minutes");
    }

    #[test]
    fn missing_heartbeat_reads_as_none() {
        let (_tmp, ctx) = context();
        let heartbeats = Heartbeats::new(&ctx);
        assert!(heartbeats.file_age_minutes("never_ran").is_none());
    }

    #[test]
    fn row_mirror_upserts() {
        let (_tmp, ctx) = context();
        crate::store::bootstrap::initialize_all(&ctx).expect("bootstrap");
        let heartbeats = Heartbeats::new(&ctx);
        heartbeats.beat_row(WATCHDOG).unwrap();
        heartbeats.beat_row(WATCHDOG).unwrap();

        let conn = store::open(&ctx.paths.system_db).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM heartbeats WHERE component = ?1",
                params![WATCHDOG],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
