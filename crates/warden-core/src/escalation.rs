//! Escalation records and their store.
//!
//! An escalation is the persistent form of an anomaly, identified by a
//! unique code and climbing the L1..L4 ladder until a director responds
//! or the system quarantines itself.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use rusqlite::{params, OptionalExtension, Row};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::store;

/// Ladder rung. Ordered: L1 < L2 < L3 < L4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// First notification.
    L1,
    /// One unanswered day.
    L2,
    /// Three unanswered days.
    L3,
    /// Most severe rung; expiry here can quarantine the system.
    L4,
}

impl Level {
    /// Canonical form stored in the escalations table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
        }
    }

    /// Next rung up, or `None` at the top.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::L1 => Some(Self::L2),
            Self::L2 => Some(Self::L3),
            Self::L3 => Some(Self::L4),
            Self::L4 => None,
        }
    }

    /// How long an escalation may sit at this rung without a response
    /// before it promotes (or, at L4, quarantines).
    #[must_use]
    pub fn promotion_threshold(self) -> Duration {
        match self {
            Self::L1 => Duration::hours(24),
            Self::L2 => Duration::hours(48),
            Self::L3 => Duration::hours(72),
            Self::L4 => Duration::hours(168),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            "L3" => Ok(Self::L3),
            "L4" => Ok(Self::L4),
            other => Err(Error::MalformedInput(format!("unknown escalation level: {other}"))),
        }
    }
}

/// Lifecycle state of an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    /// Recorded, notification not yet sent.
    Detected,
    /// Director notified at the current level.
    Notified,
    /// Director reminded at the current level.
    Reminded,
    /// Director saw it. Terminal for the ladder.
    Acknowledged,
    /// Director closed it with a note. Terminal.
    Resolved,
    /// Aged out without resolution. Terminal.
    Expired,
}

impl EscalationState {
    /// Canonical uppercase form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "DETECTED",
            Self::Notified => "NOTIFIED",
            Self::Reminded => "REMINDED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Resolved => "RESOLVED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Sticky states: no further automatic promotion.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Acknowledged | Self::Resolved | Self::Expired)
    }

    /// States that count as "handled" for the recovery gate.
    #[must_use]
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Acknowledged | Self::Resolved)
    }
}

impl fmt::Display for EscalationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscalationState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "DETECTED" => Ok(Self::Detected),
            "NOTIFIED" => Ok(Self::Notified),
            "REMINDED" => Ok(Self::Reminded),
            "ACKNOWLEDGED" => Ok(Self::Acknowledged),
            "RESOLVED" => Ok(Self::Resolved),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(Error::MalformedInput(format!("unknown escalation state: {other}"))),
        }
    }
}

/// One escalation row.
#[derive(Debug, Clone)]
pub struct Escalation {
    /// Row id, used in notifications and CLI commands.
    pub id: i64,
    /// Unique anomaly code.
    pub code: String,
    /// Current ladder rung.
    pub level: Level,
    /// Current lifecycle state.
    pub state: EscalationState,
    /// Latest message from the watchdog.
    pub message: Option<String>,
    /// When first recorded.
    pub created_at: String,
    /// When last notified.
    pub notified_at: Option<String>,
    /// When last reminded.
    pub reminded_at: Option<String>,
    /// When acknowledged.
    pub acknowledged_at: Option<String>,
    /// When resolved.
    pub resolved_at: Option<String>,
    /// Director's closing note.
    pub resolution_note: Option<String>,
}

/// CRUD over the escalations table.
///
/// The escalation engine is the only writer of level/state promotions; the
/// CLI writes only the director responses (acknowledge, resolve).
#[derive(Debug, Clone)]
pub struct EscalationStore {
    ctx: Context,
}

impl EscalationStore {
    /// Store over the management database named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Look up by unique code.
    pub fn get_by_code(&self, code: &str) -> Result<Option<Escalation>> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE code = ?1"),
                params![code],
                map_row,
            )
            .optional()?;
        row.map(Escalation::try_from).transpose()
    }

    /// Look up by id.
    pub fn get(&self, id: i64) -> Result<Option<Escalation>> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let row = conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], map_row)
            .optional()?;
        row.map(Escalation::try_from).transpose()
    }

    /// Insert a fresh L1 DETECTED record, returning its id.
    pub fn insert_detected(&self, code: &str, message: &str) -> Result<i64> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        conn.execute(
            "INSERT INTO escalations (code, level, state, message, created_at)
             VALUES (?1, 'L1', 'DETECTED', ?2, ?3)",
            params![code, message, self.ctx.clock.timestamp()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Mark the record notified at its current level.
    pub fn mark_notified(&self, id: i64) -> Result<()> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        conn.execute(
            "UPDATE escalations SET state = 'NOTIFIED', notified_at = ?1 WHERE id = ?2",
            params![self.ctx.clock.timestamp(), id],
        )?;
        Ok(())
    }

    /// Replace the message; latest observation wins.
    pub fn update_message(&self, id: i64, message: &str) -> Result<()> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        conn.execute(
            "UPDATE escalations SET message = ?1 WHERE id = ?2",
            params![message, id],
        )?;
        Ok(())
    }

    /// Promote to `level`, re-entering NOTIFIED with a fresh timestamp.
    pub fn promote(&self, id: i64, level: Level) -> Result<()> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        conn.execute(
            "UPDATE escalations SET level = ?1, state = 'NOTIFIED', notified_at = ?2 WHERE id = ?3",
            params![level.as_str(), self.ctx.clock.timestamp(), id],
        )?;
        Ok(())
    }

    /// Director acknowledgment.
    pub fn acknowledge(&self, id: i64) -> Result<()> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let changed = conn.execute(
            "UPDATE escalations SET state = 'ACKNOWLEDGED', acknowledged_at = ?1 WHERE id = ?2",
            params![self.ctx.clock.timestamp(), id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("escalation {id}")));
        }
        Ok(())
    }

    /// Director resolution with a closing note.
    pub fn resolve(&self, id: i64, note: &str) -> Result<()> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let changed = conn.execute(
            "UPDATE escalations
             SET state = 'RESOLVED', resolved_at = ?1, resolution_note = ?2
             WHERE id = ?3",
            params![self.ctx.clock.timestamp(), note, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("escalation {id}")));
        }
        Ok(())
    }

    /// Records still on the ladder (not RESOLVED, not EXPIRED), in id
    /// order. Promotion is evaluated in this order.
    pub fn active(&self) -> Result<Vec<Escalation>> {
        self.query(&format!(
            "{SELECT_COLUMNS} WHERE state NOT IN ('RESOLVED', 'EXPIRED') ORDER BY id ASC"
        ))
    }

    /// Every record, newest first.
    pub fn all(&self) -> Result<Vec<Escalation>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))
    }

    /// Count of records the recovery gate considers unhandled.
    pub fn unhandled_count(&self) -> Result<i64> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM escalations
             WHERE state NOT IN ('ACKNOWLEDGED', 'RESOLVED', 'EXPIRED')",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Record counts grouped by state.
    pub fn counts_by_state(&self) -> Result<Vec<(String, i64)>> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let mut stmt =
            conn.prepare("SELECT state, COUNT(*) FROM escalations GROUP BY state ORDER BY state")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn query(&self, sql: &str) -> Result<Vec<Escalation>> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], map_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Escalation::try_from(row?)?);
        }
        Ok(records)
    }
}

const SELECT_COLUMNS: &str = "SELECT id, code, level, state, message, created_at, notified_at, \
                              reminded_at, acknowledged_at, resolved_at, resolution_note \
                              FROM escalations";

type RawRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn map_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

impl TryFrom<RawRow> for Escalation {
    type Error = Error;

    fn try_from(raw: RawRow) -> Result<Self> {
        let (
            id,
            code,
            level,
            state,
            message,
            created_at,
            notified_at,
            reminded_at,
            acknowledged_at,
            resolved_at,
            resolution_note,
        ) = raw;
        Ok(Self {
            id,
            code,
            level: level.parse()?,
            state: state.parse()?,
            message,
            created_at,
            notified_at,
            reminded_at,
            acknowledged_at,
            resolved_at,
            resolution_note,
        })
    }
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
    fn ladder_order_and_thresholds() {
        assert!(Level::L1 < Level::L4);
        assert_eq!(Level::L1.next(), Some(Level::L2));
        assert_eq!(Level::L4.next(), None);
        assert_eq!(Level::L4.promotion_threshold(), Duration::hours(168));
    }

    #[test]
    fn insert_and_lookup_by_code() {
        let (_tmp, ctx) = context();
        let escalations = EscalationStore::new(&ctx);
        let id = escalations.insert_detected("DISK_WARNING", "80% used").unwrap();

        let record = escalations.get_by_code("DISK_WARNING").unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.level, Level::L1);
        assert_eq!(record.state, EscalationState::Detected);
        assert!(record.notified_at.is_none());
    }

    #[test]
    fn duplicate_code_is_rejected_by_the_store() {
        let (_tmp, ctx) = context();
        let escalations = EscalationStore::new(&ctx);
        escalations.insert_detected("X", "first").unwrap();
        assert!(escalations.insert_detected("X", "second").is_err());
    }

    #[test]
    fn acknowledge_and_resolve_update_state() {
        let (_tmp, ctx) = context();
        let escalations = EscalationStore::new(&ctx);
        let a = escalations.insert_detected("A", "m").unwrap();
        let b = escalations.insert_detected("B", "m").unwrap();

        escalations.acknowledge(a).unwrap();
        escalations.resolve(b, "replaced the disk").unwrap();

        let a = escalations.get(a).unwrap().unwrap();
        assert_eq!(a.state, EscalationState::Acknowledged);
        assert!(a.acknowledged_at.is_some());

        let b = escalations.get(b).unwrap().unwrap();
        assert_eq!(b.state, EscalationState::Resolved);
        assert_eq!(b.resolution_note.as_deref(), Some("replaced the disk"));

        assert_eq!(escalations.unhandled_count().unwrap(), 0);
    }

    #[test]
    fn acknowledging_a_missing_record_is_not_found() {
        let (_tmp, ctx) = context();
        let escalations = EscalationStore::new(&ctx);
        assert!(matches!(
            escalations.acknowledge(99),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn active_excludes_resolved_but_keeps_acknowledged() {
        let (_tmp, ctx) = context();
        let escalations = EscalationStore::new(&ctx);
        let a = escalations.insert_detected("A", "m").unwrap();
        let b = escalations.insert_detected("B", "m").unwrap();
        escalations.insert_detected("C", "m").unwrap();

        escalations.acknowledge(a).unwrap();
        escalations.resolve(b, "done").unwrap();

        let codes: Vec<_> = escalations.active().unwrap().into_iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["A", "C"]);
    }
}
