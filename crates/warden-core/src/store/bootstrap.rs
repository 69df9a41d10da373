//! Store and directory bootstrap.
//!
//! Creates the directory tree, the five stores, and their tables, then
//! seeds the initial NORMAL mode row and the recognized configuration
//! defaults. Every step is idempotent; running bootstrap against a live
//! deployment changes nothing.

use rusqlite::params;

use crate::context::Context;
use crate::error::Result;
use crate::mode::Mode;
use crate::settings;
use crate::store;

const SYSTEM_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS system_mode (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    reason TEXT
);
CREATE TABLE IF NOT EXISTS heartbeats (
    component TEXT PRIMARY KEY,
    last_beat TEXT NOT NULL,
    status TEXT NOT NULL
);
";

const RESEARCH_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT,
    completed_at TEXT,
    error_message TEXT
);
";

const MANAGEMENT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS escalations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    level TEXT NOT NULL,
    state TEXT NOT NULL,
    message TEXT,
    created_at TEXT NOT NULL,
    notified_at TEXT,
    reminded_at TEXT,
    acknowledged_at TEXT,
    resolved_at TEXT,
    resolution_note TEXT
);
CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

const SHARED_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    path TEXT NOT NULL,
    generated_at TEXT NOT NULL
);
";

const AUDIT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    role TEXT NOT NULL,
    action TEXT NOT NULL,
    target TEXT,
    details TEXT,
    checksum TEXT NOT NULL
);
";

/// Create directories, stores, tables, and seed rows.
pub fn initialize_all(ctx: &Context) -> Result<()> {
    ctx.paths.ensure_directories()?;

    let schemas = [
        (&ctx.paths.system_db, SYSTEM_SCHEMA),
        (&ctx.paths.research_db, RESEARCH_SCHEMA),
        (&ctx.paths.management_db, MANAGEMENT_SCHEMA),
        (&ctx.paths.shared_db, SHARED_SCHEMA),
        (&ctx.paths.audit_db, AUDIT_SCHEMA),
    ];
    for (path, schema) in schemas {
        let conn = store::open(path)?;
        conn.execute_batch(schema)?;
    }

    seed_initial_mode(ctx)?;
    seed_default_settings(ctx)?;
    Ok(())
}

/// Insert the NORMAL row only when the history is empty.
fn seed_initial_mode(ctx: &Context) -> Result<()> {
    let conn = store::open(&ctx.paths.system_db)?;
    conn.execute(
        "INSERT INTO system_mode (mode, updated_at, reason)
         SELECT ?1, ?2, 'System initialized'
         WHERE NOT EXISTS (SELECT 1 FROM system_mode)",
        params![Mode::Normal.as_str(), ctx.clock.timestamp()],
    )?;
    Ok(())
}

/// Insert defaults for the recognized keys that are not yet present.
fn seed_default_settings(ctx: &Context) -> Result<()> {
    let conn = store::open(&ctx.paths.management_db)?;
    for (key, value) in settings::DEFAULTS {
        conn.execute(
            "INSERT OR IGNORE INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, ctx.clock.timestamp()],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ModeAuthority;

    #[test]
    fn bootstrap_seeds_normal_mode_once() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        initialize_all(&ctx).expect("first bootstrap");
        initialize_all(&ctx).expect("second bootstrap");

        let authority = ModeAuthority::new(&ctx);
        let history = authority.history().expect("history");
        assert_eq!(history.len(), 1, "re-running bootstrap must not reseed");
        assert_eq!(history[0].mode, Mode::Normal);
    }

    #[test]
    fn bootstrap_preserves_operator_overrides() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        initialize_all(&ctx).expect("bootstrap");

        let tuning = settings::Settings::new(&ctx);
        tuning.set(settings::DISK_WARNING_THRESHOLD, "70").expect("set");
        initialize_all(&ctx).expect("re-bootstrap");
        assert_eq!(
            tuning.get(settings::DISK_WARNING_THRESHOLD).expect("get").as_deref(),
            Some("70")
        );
    }
}
