//! Task queue engine.
//!
//! Tasks live twice: as a row in the research store (authoritative for
//! status) and as a `<id>.json` file in the directory matching that
//! status (the processor's work-list and the operator's view). The
//! processor realigns the two after a crash; see [`crate::processor`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::store;

/// Task lifecycle state.
///
/// ```text
/// create -- pending --> processing --> completed
///                           |
///                           +--------> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Awaiting the processor.
    Pending,
    /// Being executed.
    Processing,
    /// Finished successfully.
    Completed,
    /// Execution failed.
    Failed,
}

impl TaskStatus {
    /// Lowercase form stored in the tasks table and used as directory
    /// names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::MalformedInput(format!("unknown task status: {other}"))),
        }
    }
}

/// One task row.
#[derive(Debug, Clone)]
pub struct Task {
    /// Monotonic id.
    pub id: i64,
    /// Short name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Authoritative lifecycle state.
    pub status: TaskStatus,
    /// When submitted.
    pub created_at: String,
    /// When last transitioned.
    pub updated_at: Option<String>,
    /// When completed, for completed tasks.
    pub completed_at: Option<String>,
    /// Failure message, for failed tasks.
    pub error_message: Option<String>,
}

/// The file half of the dual representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFile {
    /// Matches the row id.
    pub id: i64,
    /// Task name.
    pub name: String,
    /// Task description.
    pub description: Option<String>,
    /// When submitted.
    pub created_at: String,
}

/// Task lifecycle operations over the research store and queue tree.
#[derive(Debug, Clone)]
pub struct QueueEngine {
    ctx: Context,
}

impl QueueEngine {
    /// Queue engine over the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Insert a pending row and write its pending file, returning the id.
    ///
    /// The row is written first; it is the authoritative half.
    pub fn create_task(&self, name: &str, description: Option<&str>) -> Result<i64> {
        let created_at = self.ctx.clock.timestamp();
        let conn = store::open(&self.ctx.paths.research_db)?;
        conn.execute(
            "INSERT INTO tasks (name, description, status, created_at)
             VALUES (?1, ?2, 'pending', ?3)",
            params![name, description, created_at],
        )?;
        let id = conn.last_insert_rowid();

        let task_file = TaskFile {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at,
        };
        self.write_task_file(TaskStatus::Pending, &task_file)?;
        Ok(id)
    }

    /// Look up one task row.
    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let conn = store::open(&self.ctx.paths.research_db)?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?;
        row.map(Task::try_from).transpose()
    }

    /// Rows newest first, optionally filtered by status.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let conn = store::open(&self.ctx.paths.research_db)?;
        let mut tasks = Vec::new();

        if let Some(status) = status {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY id DESC"))?;
            let rows = stmt.query_map(params![status.as_str()], map_row)?;
            for row in rows {
                tasks.push(Task::try_from(row?)?);
            }
        } else {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;
            let rows = stmt.query_map([], map_row)?;
            for row in rows {
                tasks.push(Task::try_from(row?)?);
            }
        }
        Ok(tasks)
    }

    /// Update the authoritative row status.
    ///
    /// Completed tasks also receive `completed_at`; failed tasks record
    /// the error message.
    pub fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = self.ctx.clock.timestamp();
        let conn = store::open(&self.ctx.paths.research_db)?;
        match status {
            TaskStatus::Completed => {
                conn.execute(
                    "UPDATE tasks SET status = ?1, updated_at = ?2, completed_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now, id],
                )?;
            }
            TaskStatus::Failed => {
                conn.execute(
                    "UPDATE tasks SET status = ?1, updated_at = ?2, error_message = ?3 WHERE id = ?4",
                    params![status.as_str(), now, error_message, id],
                )?;
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                conn.execute(
                    "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now, id],
                )?;
            }
        }
        Ok(())
    }

    /// Move the task file between status directories.
    ///
    /// A missing source is tolerated: the row is authoritative and
    /// reconciliation repairs the tree.
    pub fn move_file(&self, id: i64, from: TaskStatus, to: TaskStatus) -> Result<()> {
        let source = self.status_dir(from).join(format!("{id}.json"));
        let dest = self.status_dir(to).join(format!("{id}.json"));
        if source.exists() {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&source, &dest)?;
        }
        Ok(())
    }

    /// Directory corresponding to a status.
    #[must_use]
    pub fn status_dir(&self, status: TaskStatus) -> &Path {
        match status {
            TaskStatus::Pending => &self.ctx.paths.queue_pending_dir,
            TaskStatus::Processing => &self.ctx.paths.queue_processing_dir,
            TaskStatus::Completed => &self.ctx.paths.queue_completed_dir,
            TaskStatus::Failed => &self.ctx.paths.queue_failed_dir,
        }
    }

    /// Task files in a status directory, sorted by id.
    ///
    /// Non-numeric filenames are skipped; the processor scans only what
    /// the queue engine wrote.
    pub fn files_in(&self, status: TaskStatus) -> Result<Vec<(i64, PathBuf)>> {
        let dir = self.status_dir(status);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = stem.parse::<i64>() {
                files.push((id, path));
            }
        }
        files.sort_by_key(|(id, _)| *id);
        Ok(files)
    }

    /// Parse the file half of a task.
    pub fn read_task_file(&self, path: &Path) -> Result<TaskFile> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body)
            .map_err(|err| Error::MalformedInput(format!("{}: {err}", path.display())))
    }

    fn write_task_file(&self, status: TaskStatus, task: &TaskFile) -> Result<()> {
        let path = self.status_dir(status).join(format!("{}.json", task.id));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(task)
            .map_err(|err| Error::MalformedInput(err.to_string()))?;
        std::fs::write(path, body)?;
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, description, status, created_at, updated_at, \
                              completed_at, error_message FROM tasks";

type RawRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
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
    ))
}

impl TryFrom<RawRow> for Task {
    type Error = Error;

    fn try_from(raw: RawRow) -> Result<Self> {
        let (id, name, description, status, created_at, updated_at, completed_at, error_message) =
            raw;
        Ok(Self {
            id,
            name,
            description,
            status: status.parse()?,
            created_at,
            updated_at,
            completed_at,
            error_message,
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
    fn create_task_writes_row_and_pending_file() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        let id = queue.create_task("survey", Some("collect samples")).unwrap();
        assert_eq!(id, 1);

        let task = queue.get_task(id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.name, "survey");

        let pending = ctx.paths.queue_pending_dir.join("1.json");
        assert!(pending.is_file());
        let file = queue.read_task_file(&pending).unwrap();
        assert_eq!(file.id, 1);
        assert_eq!(file.description.as_deref(), Some("collect samples"));
    }

    #[test]
    fn ids_are_monotonic() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        let first = queue.create_task("a", None).unwrap();
        let second = queue.create_task("b", None).unwrap();
        assert!(second > first);
    }

    #[test]
    fn list_is_newest_first_and_filterable() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        queue.create_task("a", None).unwrap();
        let b = queue.create_task("b", None).unwrap();
        queue.update_status(b, TaskStatus::Completed, None).unwrap();

        let all = queue.list_tasks(None).unwrap();
        assert_eq!(all[0].name, "b");
        assert_eq!(all[1].name, "a");

        let completed = queue.list_tasks(Some(TaskStatus::Completed)).unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].completed_at.is_some());
    }

    #[test]
    fn failed_status_records_error_message() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        let id = queue.create_task("doomed", None).unwrap();
        queue
            .update_status(id, TaskStatus::Failed, Some("script exited 2"))
            .unwrap();

        let task = queue.get_task(id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("script exited 2"));
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn move_file_relocates_between_status_dirs() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        let id = queue.create_task("t", None).unwrap();

        queue.move_file(id, TaskStatus::Pending, TaskStatus::Processing).unwrap();
        assert!(!ctx.paths.queue_pending_dir.join("1.json").exists());
        assert!(ctx.paths.queue_processing_dir.join("1.json").exists());

        // Missing source tolerated.
        queue.move_file(id, TaskStatus::Pending, TaskStatus::Failed).unwrap();
        assert!(ctx.paths.queue_processing_dir.join("1.json").exists());
    }

    #[test]
    fn files_in_sorts_by_id_and_skips_noise() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        for name in ["10.json", "2.json", "README.json", "9.txt"] {
            std::fs::write(ctx.paths.queue_pending_dir.join(name), "{}").unwrap();
        }

        let ids: Vec<i64> = queue
            .files_in(TaskStatus::Pending)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![2, 10]);
    }
}
