//! Daily and weekly status reports.
//!
//! Reports are gathered from the stores, rendered as plain Markdown, and
//! written under `shared/reports/<date>/`; each generation is recorded in
//! the shared store so `report list` can find them later.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Duration;
use rusqlite::params;

use crate::audit::AuditLog;
use crate::context::Context;
use crate::error::Result;
use crate::mode::ModeAuthority;
use crate::role::Role;
use crate::store;

/// One row of the report registry.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    /// Row id.
    pub id: i64,
    /// Report kind: `daily` or `weekly`.
    pub kind: String,
    /// Where the rendered file landed.
    pub path: String,
    /// When it was generated.
    pub generated_at: String,
}

/// Gathers store data and renders the two report kinds.
#[derive(Debug)]
pub struct ReportGenerator {
    ctx: Context,
    modes: ModeAuthority,
    audit: AuditLog,
}

impl ReportGenerator {
    /// Generator over the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            modes: ModeAuthority::new(ctx),
            audit: AuditLog::new(ctx),
        }
    }

    /// Generate the daily status report, returning the file path.
    pub fn generate_daily(&self) -> Result<PathBuf> {
        let today = self.ctx.clock.now().date();
        let date = today.format("%Y-%m-%d").to_string();

        let mode = self.modes.get_mode()?;
        let task_counts = self.task_counts_since(&format!("{date}T00:00:00"))?;
        let pending = self.count_tasks_with_status("pending")?;
        let (active_escalations, by_level) = self.escalation_summary()?;
        let recent = self.audit.recent(20)?;

        let mut body = String::new();
        let _ = writeln!(body, "# Daily Status Report - {date}");
        let _ = writeln!(body);
        let _ = writeln!(body, "Generated: {}", self.ctx.clock.timestamp());
        let _ = writeln!(body);
        let _ = writeln!(body, "## System Mode");
        let _ = writeln!(body);
        let _ = writeln!(body, "- Mode: {}", mode.mode);
        let _ = writeln!(body, "- Since: {}", mode.updated_at);
        if let Some(reason) = &mode.reason {
            let _ = writeln!(body, "- Reason: {reason}");
        }
        let _ = writeln!(body);
        let _ = writeln!(body, "## Tasks Today");
        let _ = writeln!(body);
        if task_counts.is_empty() {
            let _ = writeln!(body, "No tasks submitted today.");
        } else {
            for (status, count) in &task_counts {
                let _ = writeln!(body, "- {status}: {count}");
            }
        }
        let _ = writeln!(body, "- pending backlog: {pending}");
        let _ = writeln!(body);
        let _ = writeln!(body, "## Escalations");
        let _ = writeln!(body);
        let _ = writeln!(body, "- active: {active_escalations}");
        for (level, count) in &by_level {
            let _ = writeln!(body, "- {level}: {count}");
        }
        let _ = writeln!(body);
        let _ = writeln!(body, "## Recent Audit Events");
        let _ = writeln!(body);
        for entry in &recent {
            let _ = writeln!(
                body,
                "- {} {} {} {}",
                entry.timestamp,
                entry.role,
                entry.action,
                entry.target.as_deref().unwrap_or("-")
            );
        }

        self.finish("daily", &date, "daily.md", &body)
    }

    /// Generate the weekly summary report, returning the file path.
    pub fn generate_weekly(&self) -> Result<PathBuf> {
        let now = self.ctx.clock.now();
        let end_date = now.date().format("%Y-%m-%d").to_string();
        let start = now - Duration::days(7);
        let start_stamp = start.format(crate::clock::TIMESTAMP_FORMAT).to_string();
        let start_date = start.date().format("%Y-%m-%d").to_string();

        let mode = self.modes.get_mode()?;
        let task_counts = self.task_counts_since(&start_stamp)?;
        let completed = self.count_completed_since(&start_stamp)?;
        let resolved = self.count_resolved_since(&start_stamp)?;
        let (active_escalations, _) = self.escalation_summary()?;

        let mut body = String::new();
        let _ = writeln!(body, "# Weekly Summary - {start_date} to {end_date}");
        let _ = writeln!(body);
        let _ = writeln!(body, "Generated: {}", self.ctx.clock.timestamp());
        let _ = writeln!(body);
        let _ = writeln!(body, "## System Mode");
        let _ = writeln!(body);
        let _ = writeln!(body, "- Mode: {}", mode.mode);
        let _ = writeln!(body);
        let _ = writeln!(body, "## Tasks This Week");
        let _ = writeln!(body);
        for (status, count) in &task_counts {
            let _ = writeln!(body, "- {status}: {count}");
        }
        let _ = writeln!(body, "- completed this week: {completed}");
        let _ = writeln!(body);
        let _ = writeln!(body, "## Escalations");
        let _ = writeln!(body);
        let _ = writeln!(body, "- resolved this week: {resolved}");
        let _ = writeln!(body, "- still active: {active_escalations}");

        self.finish("weekly", &end_date, "weekly.md", &body)
    }

    /// Report registry, newest first, optionally filtered by kind.
    pub fn list(&self, kind: Option<&str>) -> Result<Vec<ReportRecord>> {
        let conn = store::open(&self.ctx.paths.shared_db)?;
        let mut records = Vec::new();

        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ReportRecord> {
            Ok(ReportRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                path: row.get(2)?,
                generated_at: row.get(3)?,
            })
        };

        if let Some(kind) = kind {
            let mut stmt = conn.prepare(
                "SELECT id, type, path, generated_at FROM reports WHERE type = ?1 ORDER BY id DESC",
            )?;
            for row in stmt.query_map(params![kind], map)? {
                records.push(row?);
            }
        } else {
            let mut stmt =
                conn.prepare("SELECT id, type, path, generated_at FROM reports ORDER BY id DESC")?;
            for row in stmt.query_map([], map)? {
                records.push(row?);
            }
        }
        Ok(records)
    }

    fn finish(&self, kind: &str, date: &str, filename: &str, body: &str) -> Result<PathBuf> {
        let dir = self.ctx.paths.shared_reports_dir.join(date);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(filename);
        std::fs::write(&path, body)?;

        let conn = store::open(&self.ctx.paths.shared_db)?;
        conn.execute(
            "INSERT INTO reports (type, path, generated_at) VALUES (?1, ?2, ?3)",
            params![kind, path.display().to_string(), self.ctx.clock.timestamp()],
        )?;

        self.audit.log(Role::System, "report_generated", Some(kind), Some(date))?;
        Ok(path)
    }

    fn task_counts_since(&self, since: &str) -> Result<Vec<(String, i64)>> {
        let conn = store::open(&self.ctx.paths.research_db)?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM tasks WHERE created_at >= ?1 GROUP BY status ORDER BY status",
        )?;
        let rows = stmt.query_map(params![since], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn count_tasks_with_status(&self, status: &str) -> Result<i64> {
        let conn = store::open(&self.ctx.paths.research_db)?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )?)
    }

    fn count_completed_since(&self, since: &str) -> Result<i64> {
        let conn = store::open(&self.ctx.paths.research_db)?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = 'completed' AND completed_at >= ?1",
            params![since],
            |row| row.get(0),
        )?)
    }

    fn count_resolved_since(&self, since: &str) -> Result<i64> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM escalations WHERE resolved_at >= ?1",
            params![since],
            |row| row.get(0),
        )?)
    }

    fn escalation_summary(&self) -> Result<(i64, Vec<(String, i64)>)> {
        let conn = store::open(&self.ctx.paths.management_db)?;
        let active: i64 = conn.query_row(
            "SELECT COUNT(*) FROM escalations WHERE state NOT IN ('RESOLVED', 'EXPIRED')",
            [],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT level, COUNT(*) FROM escalations
             WHERE state NOT IN ('RESOLVED', 'EXPIRED') GROUP BY level ORDER BY level",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let by_level = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((active, by_level))
    }
}
