//! SQLite access for the five logical stores.
//!
//! Cross-process coordination happens through these store files plus the
//! directory tree; connections are opened per operation so every read
//! observes the latest committed state from the other processes.

pub mod bootstrap;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;
use crate::paths::Paths;

/// How long a writer waits on SQLite's own file lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection to one store.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Run `PRAGMA integrity_check` against a single store.
///
/// A missing file, an unopenable file, and a failed check all read as
/// `false`; the caller only needs the predicate.
#[must_use]
pub fn verify_integrity(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let Ok(conn) = Connection::open(path) else {
        return false;
    };
    conn.query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0))
        .map(|verdict| verdict == "ok")
        .unwrap_or(false)
}

/// Integrity verdict for every store, in layout order.
#[must_use]
pub fn verify_all(paths: &Paths) -> Vec<(&'static str, bool)> {
    paths
        .stores()
        .into_iter()
        .map(|(name, path)| (name, verify_integrity(path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn missing_store_fails_integrity() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(!verify_integrity(&tmp.path().join("absent.db")));
    }

    #[test]
    fn bootstrapped_stores_pass_integrity() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        bootstrap::initialize_all(&ctx).expect("bootstrap");

        for (name, ok) in verify_all(&ctx.paths) {
            assert!(ok, "store {name} should verify");
        }
    }
}
