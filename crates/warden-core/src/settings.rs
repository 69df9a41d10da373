//! Runtime-tunable settings stored in the management store.
//!
//! Writes replace by key; daemons read on every tick so operators can
//! live-tune thresholds without restarts.

use rusqlite::{params, OptionalExtension};
use tracing::warn;

use crate::context::Context;
use crate::error::Result;
use crate::store;

/// If "true" (case-insensitive), L4 promotion triggers LOCKDOWN.
pub const AUTO_LOCKDOWN_ENABLED: &str = "auto_lockdown_enabled";
/// Percent of disk used that emits `DISK_WARNING`.
pub const DISK_WARNING_THRESHOLD: &str = "disk_warning_threshold";
/// Percent of disk used that emits `DISK_CRITICAL`.
pub const DISK_CRITICAL_THRESHOLD: &str = "disk_critical_threshold";
/// Heartbeat age in minutes past which a component counts as stale.
pub const HEARTBEAT_STALE_MINUTES: &str = "heartbeat_stale_minutes";

/// Recognized keys and their defaults, seeded by bootstrap.
pub const DEFAULTS: [(&str, &str); 4] = [
    (AUTO_LOCKDOWN_ENABLED, "true"),
    (DISK_WARNING_THRESHOLD, "80"),
    (DISK_CRITICAL_THRESHOLD, "90"),
    (HEARTBEAT_STALE_MINUTES, "30"),
];

/// One configuration row.
#[derive(Debug, Clone)]
pub struct Setting {
    /// Configuration key.
    pub key: String,
    /// Stored value.
    pub value: String,
    /// When the value was last replaced.
    pub updated_at: String,
}

/// Key/value access over the management store.
#[derive(Debug, Clone)]
pub struct Settings {
    ctx: Context,
}

impl Settings {
    /// Settings over the management store named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Read a raw value.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let value = conn
            .query_row("SELECT value FROM config WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Read a value, falling back to `default` when missing or when the
    /// store is unreadable. Probes must not die on a tuning read.
    #[must_use]
    pub fn get_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(err) => {
                warn!(key, %err, "settings read failed, using default");
                default.to_string()
            }
        }
    }

    /// Replace a value by key.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, self.ctx.clock.timestamp()],
        )?;
        Ok(())
    }

    /// Every row, ordered by key.
    pub fn all(&self) -> Result<Vec<Setting>> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM config ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Whether L4 promotion may quarantine the system.
    #[must_use]
    pub fn auto_lockdown_enabled(&self) -> bool {
        self.get_or(AUTO_LOCKDOWN_ENABLED, "true").eq_ignore_ascii_case("true")
    }

    /// Disk warning threshold, percent used.
    #[must_use]
    pub fn disk_warning_threshold(&self) -> f64 {
        self.numeric(DISK_WARNING_THRESHOLD, 80.0)
    }

    /// Disk critical threshold, percent used.
    #[must_use]
    pub fn disk_critical_threshold(&self) -> f64 {
        self.numeric(DISK_CRITICAL_THRESHOLD, 90.0)
    }

    /// Heartbeat staleness threshold, minutes.
    #[must_use]
    pub fn heartbeat_stale_minutes(&self) -> f64 {
        self.numeric(HEARTBEAT_STALE_MINUTES, 30.0)
    }

    fn numeric(&self, key: &str, default: f64) -> f64 {
        let raw = self.get_or(key, "");
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                if !raw.is_empty() {
                    warn!(key, raw, "unparsable setting, using default");
                }
                default
            }
        }
    }
}
