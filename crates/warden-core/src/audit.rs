//! Append-only, checksum-chained audit log.
//!
//! Every privileged action from any component lands here. Each row carries
//! an independent SHA-256 checksum over its own fields, so in-place
//! tampering is detectable; the recovery gate refuses to lift LOCKDOWN
//! while any row fails recomputation.

use rusqlite::params;
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::error::Result;
use crate::role::Role;
use crate::store;

/// One audit row as read back from the store.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// When the action happened.
    pub timestamp: String,
    /// Who acted.
    pub role: String,
    /// What happened, e.g. `task_created`.
    pub action: String,
    /// What it happened to.
    pub target: Option<String>,
    /// Free-form context.
    pub details: Option<String>,
}

/// Writer and verifier for the audit store.
#[derive(Debug, Clone)]
pub struct AuditLog {
    ctx: Context,
}

impl AuditLog {
    /// Audit log over the store named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Append one entry.
    pub fn log(
        &self,
        role: Role,
        action: &str,
        target: Option<&str>,
        details: Option<&str>,
    ) -> Result<()> {
        let timestamp = self.ctx.clock.timestamp();
        let checksum = entry_checksum(&timestamp, role.as_str(), action, target, details);

        let conn = store::open(&self.ctx.paths.audit_db)?;
        conn.execute(
            "INSERT INTO log (timestamp, role, action, target, details, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![timestamp, role.as_str(), action, target, details, checksum],
        )?;
        Ok(())
    }

    /// The `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = store::open(&self.ctx.paths.audit_db)?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, role, action, target, details
             FROM log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(AuditEntry {
                timestamp: row.get(0)?,
                role: row.get(1)?,
                action: row.get(2)?,
                target: row.get(3)?,
                details: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Recompute every row's checksum.
    ///
    /// Returns true iff every stored checksum matches. Touches the whole
    /// table; the recovery gate depends on that.
    pub fn verify_integrity(&self) -> Result<bool> {
        let conn = store::open(&self.ctx.paths.audit_db)?;
        let mut stmt =
            conn.prepare("SELECT timestamp, role, action, target, details, checksum FROM log")?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let timestamp: String = row.get(0)?;
            let role: String = row.get(1)?;
            let action: String = row.get(2)?;
            let target: Option<String> = row.get(3)?;
            let details: Option<String> = row.get(4)?;
            let stored: String = row.get(5)?;

            let computed =
                entry_checksum(&timestamp, &role, &action, target.as_deref(), details.as_deref());
            if computed != stored {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Checksum over `timestamp|role|action|target|details`, absent fields
/// hashing as the empty string.
fn entry_checksum(
    timestamp: &str,
    role: &str,
    action: &str,
    target: Option<&str>,
    details: Option<&str>,
) -> String {
    let data = format!(
        "{timestamp}|{role}|{action}|{}|{}",
        target.unwrap_or(""),
        details.unwrap_or("")
    );
    hex::encode(Sha256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bootstrap;

    fn context() -> (tempfile::TempDir, Context) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        bootstrap::initialize_all(&ctx).expect("bootstrap");
        (tmp, ctx)
    }

    #[test]
    fn logged_entries_verify() {
        let (_tmp, ctx) = context();
        let audit = AuditLog::new(&ctx);

        audit
            .log(Role::Researcher, "task_created", Some("task_1"), Some("survey"))
            .unwrap();
        audit.log(Role::System, "watchdog_started", None, None).unwrap();

        assert!(audit.verify_integrity().unwrap());
    }

    #[test]
    fn recent_is_newest_first() {
        let (_tmp, ctx) = context();
        let audit = AuditLog::new(&ctx);
        for n in 0..5 {
            audit
                .log(Role::System, &format!("action_{n}"), None, None)
                .unwrap();
        }

        let entries = audit.recent(3).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "action_4");
        assert_eq!(entries[2].action, "action_2");
    }

    #[test]
    fn in_place_tampering_is_detected() {
        let (_tmp, ctx) = context();
        let audit = AuditLog::new(&ctx);
        for n in 0..5 {
            audit
                .log(Role::Director, "config_updated", Some("key"), Some(&format!("v{n}")))
                .unwrap();
        }
        assert!(audit.verify_integrity().unwrap());

        let conn = store::open(&ctx.paths.audit_db).unwrap();
        conn.execute("UPDATE log SET details = 'doctored' WHERE id = 3", [])
            .unwrap();

        assert!(!audit.verify_integrity().unwrap());
    }

    #[test]
    fn absent_fields_hash_as_empty() {
        let with_none = entry_checksum("t", "system", "a", None, None);
        let with_empty = entry_checksum("t", "system", "a", Some(""), Some(""));
        assert_eq!(with_none, with_empty);
    }
}
