//! Operational mode authority.
//!
//! The mode is stored as an append-only history in the system store; the
//! current mode is the most recent row. History is never deleted or
//! rewritten so operators can reconstruct why and when the system
//! quarantined itself long after the fact.

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, OptionalExtension};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::store;

/// Operational mode of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normal operation.
    Normal,
    /// Anomaly observed, nothing restricted yet.
    Alert,
    /// Task processing suspended; researcher access still allowed.
    PreLockdown,
    /// Full quarantine: no processing, no researcher access.
    Lockdown,
    /// Transient state between LOCKDOWN and NORMAL during recovery.
    Recovery,
}

impl Mode {
    /// Canonical uppercase form stored in the mode history.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Alert => "ALERT",
            Self::PreLockdown => "PRE-LOCKDOWN",
            Self::Lockdown => "LOCKDOWN",
            Self::Recovery => "RECOVERY",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "NORMAL" => Ok(Self::Normal),
            "ALERT" => Ok(Self::Alert),
            "PRE-LOCKDOWN" => Ok(Self::PreLockdown),
            "LOCKDOWN" => Ok(Self::Lockdown),
            "RECOVERY" => Ok(Self::Recovery),
            other => Err(Error::MalformedInput(format!("unknown mode: {other}"))),
        }
    }
}

/// One row of the mode history.
#[derive(Debug, Clone)]
pub struct ModeRecord {
    /// The mode in force.
    pub mode: Mode,
    /// When the row was written.
    pub updated_at: String,
    /// Why the mode was set.
    pub reason: Option<String>,
}

/// Owns the current operational mode and the access predicates.
///
/// This layer does not restrict transitions; policy over who may write
/// which mode lives with the callers (the recovery gate writes RECOVERY
/// and the NORMAL that follows it, the escalation engine writes the
/// automatic LOCKDOWN, directors may write LOCKDOWN manually).
#[derive(Debug, Clone)]
pub struct ModeAuthority {
    ctx: Context,
}

impl ModeAuthority {
    /// Authority over the system store named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Current mode, i.e. the most recent history row.
    ///
    /// An empty history reads as NORMAL; bootstrap seeds the initial row so
    /// this is only reachable against a hand-built store.
    pub fn get_mode(&self) -> Result<ModeRecord> {
        let conn = store::open(&self.ctx.paths.system_db)?;
        let row = conn
            .query_row(
                "SELECT mode, updated_at, reason FROM system_mode ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mode, updated_at, reason)) => Ok(ModeRecord {
                mode: mode.parse()?,
                updated_at,
                reason,
            }),
            None => Ok(ModeRecord {
                mode: Mode::Normal,
                updated_at: self.ctx.clock.timestamp(),
                reason: None,
            }),
        }
    }

    /// Append a new mode row.
    pub fn set_mode(&self, mode: Mode, reason: &str) -> Result<()> {
        let conn = store::open(&self.ctx.paths.system_db)?;
        conn.execute(
            "INSERT INTO system_mode (mode, updated_at, reason) VALUES (?1, ?2, ?3)",
            params![mode.as_str(), self.ctx.clock.timestamp(), reason],
        )?;
        Ok(())
    }

    /// Mode history, oldest first.
    pub fn history(&self) -> Result<Vec<ModeRecord>> {
        let conn = store::open(&self.ctx.paths.system_db)?;
        let mut stmt =
            conn.prepare("SELECT mode, updated_at, reason FROM system_mode ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mode, updated_at, reason) = row?;
            records.push(ModeRecord {
                mode: mode.parse()?,
                updated_at,
                reason,
            });
        }
        Ok(records)
    }

    /// Whether the system is quarantined.
    pub fn is_lockdown(&self) -> Result<bool> {
        Ok(self.get_mode()?.mode == Mode::Lockdown)
    }

    /// Whether the system is in normal operation.
    pub fn is_normal(&self) -> Result<bool> {
        Ok(self.get_mode()?.mode == Mode::Normal)
    }

    /// Whether the task processor may run. False in LOCKDOWN and
    /// PRE-LOCKDOWN.
    pub fn can_process_tasks(&self) -> Result<bool> {
        Ok(!matches!(
            self.get_mode()?.mode,
            Mode::Lockdown | Mode::PreLockdown
        ))
    }

    /// Whether researcher commands may run. False only in LOCKDOWN.
    pub fn can_researcher_access(&self) -> Result<bool> {
        Ok(self.get_mode()?.mode != Mode::Lockdown)
    }
}
