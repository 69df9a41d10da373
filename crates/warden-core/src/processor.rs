//! Task processor.
//!
//! Drains the pending queue under the single-processor lock, gated by the
//! mode authority. Execution of a task body is an external collaborator
//! behind the [`TaskExecutor`] trait; the control plane only owns the
//! lifecycle around it.

use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::context::Context;
use crate::error::Result;
use crate::heartbeat::{Heartbeats, TASK_PROCESSOR};
use crate::lock::PidLock;
use crate::mode::ModeAuthority;
use crate::queue::{QueueEngine, TaskFile, TaskStatus};
use crate::role::Role;

/// Executes the body of one task.
///
/// Implementations are assumed idempotent: a crash mid-task leads to a
/// retry on the next run. A body that cannot be idempotent must return an
/// error so the task moves to `failed` instead of re-running.
pub trait TaskExecutor {
    /// Run the task. `Err` carries the failure message recorded on the
    /// task row.
    fn execute(&self, task: &TaskFile) -> std::result::Result<(), String>;
}

/// Placeholder executor that succeeds without doing work.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl TaskExecutor for NoopExecutor {
    fn execute(&self, _task: &TaskFile) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Single-writer pending-queue drain.
#[derive(Debug)]
pub struct TaskProcessor<E> {
    ctx: Context,
    queue: QueueEngine,
    modes: ModeAuthority,
    audit: AuditLog,
    heartbeats: Heartbeats,
    executor: E,
}

impl<E: TaskExecutor> TaskProcessor<E> {
    /// Processor over the layout named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context, executor: E) -> Self {
        Self {
            ctx: ctx.clone(),
            queue: QueueEngine::new(ctx),
            modes: ModeAuthority::new(ctx),
            audit: AuditLog::new(ctx),
            heartbeats: Heartbeats::new(ctx),
            executor,
        }
    }

    /// Drain the pending queue once. Returns the number of tasks moved to
    /// a terminal state.
    ///
    /// Returns 0 without touching tasks when the mode forbids processing
    /// or a live peer holds the lock; both outcomes are audited.
    pub fn process_pending(&self) -> Result<usize> {
        if !self.modes.can_process_tasks()? {
            let record = self.modes.get_mode()?;
            self.audit.log(
                Role::System,
                "task_processing_blocked",
                None,
                Some(&format!(
                    "Mode: {}, Reason: {}",
                    record.mode,
                    record.reason.as_deref().unwrap_or("")
                )),
            )?;
            return Ok(0);
        }

        let lock = PidLock::new(self.ctx.paths.task_processor_lock.clone());
        if !lock.acquire()? {
            self.audit
                .log(Role::System, "task_processor_lock_failed", None, None)?;
            return Ok(0);
        }

        let result = self.run_locked();
        lock.release();
        result
    }

    fn run_locked(&self) -> Result<usize> {
        self.reconcile()?;

        let mut processed = 0;
        for (id, path) in self.queue.files_in(TaskStatus::Pending)? {
            match self.process_one(id, &path) {
                Ok(()) => processed += 1,
                Err(err) => {
                    warn!(id, %err, "task processing error");
                    let _ = self.audit.log(
                        Role::System,
                        "task_processing_error",
                        Some(&path.display().to_string()),
                        Some(&err.to_string()),
                    );
                }
            }
            // Liveness between tasks; a long drain must not look stale.
            self.heartbeats.beat_file(TASK_PROCESSOR)?;
        }

        self.heartbeats.beat_file(TASK_PROCESSOR)?;
        Ok(processed)
    }

    fn process_one(&self, id: i64, path: &std::path::Path) -> Result<()> {
        let task = self.queue.read_task_file(path)?;

        self.queue.move_file(id, TaskStatus::Pending, TaskStatus::Processing)?;
        self.queue.update_status(id, TaskStatus::Processing, None)?;
        self.audit.log(
            Role::System,
            "task_started",
            Some(&format!("task_{id}")),
            Some(&task.name),
        )?;

        match self.executor.execute(&task) {
            Ok(()) => {
                self.queue.move_file(id, TaskStatus::Processing, TaskStatus::Completed)?;
                self.queue.update_status(id, TaskStatus::Completed, None)?;
                self.audit
                    .log(Role::System, "task_completed", Some(&format!("task_{id}")), None)?;
            }
            Err(message) => {
                self.queue.move_file(id, TaskStatus::Processing, TaskStatus::Failed)?;
                self.queue.update_status(id, TaskStatus::Failed, Some(&message))?;
                self.audit
                    .log(Role::System, "task_failed", Some(&format!("task_{id}")), None)?;
            }
        }
        Ok(())
    }

    /// Realign the dual representation after a crash.
    ///
    /// Files in `processing/` whose rows read processing go back to
    /// `pending/` for a retry; rows reading processing whose files still
    /// sit in `pending/` are reset to pending. The row is authoritative
    /// for status, the file location for the processor's work-list.
    fn reconcile(&self) -> Result<()> {
        for (id, _path) in self.queue.files_in(TaskStatus::Processing)? {
            let Some(task) = self.queue.get_task(id)? else {
                continue;
            };
            if task.status == TaskStatus::Processing {
                debug!(id, "requeueing task interrupted mid-processing");
                self.queue.move_file(id, TaskStatus::Processing, TaskStatus::Pending)?;
                self.queue.update_status(id, TaskStatus::Pending, None)?;
            }
        }

        for (id, _path) in self.queue.files_in(TaskStatus::Pending)? {
            let Some(task) = self.queue.get_task(id)? else {
                continue;
            };
            if task.status == TaskStatus::Processing {
                debug!(id, "realigning row status to pending file");
                self.queue.update_status(id, TaskStatus::Pending, None)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::store::bootstrap;

    /// Fails tasks whose name contains "fail".
    struct SelectiveExecutor;

    impl TaskExecutor for SelectiveExecutor {
        fn execute(&self, task: &TaskFile) -> std::result::Result<(), String> {
            if task.name.contains("fail") {
                Err("Task execution failed".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn context() -> (tempfile::TempDir, Context) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(tmp.path());
        bootstrap::initialize_all(&ctx).expect("bootstrap");
        (tmp, ctx)
    }

    fn audited_actions(ctx: &Context) -> Vec<String> {
        AuditLog::new(ctx)
            .recent(100)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    #[test]
    fn drains_pending_to_completed() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        queue.create_task("one", None).unwrap();
        queue.create_task("two", None).unwrap();

        let processor = TaskProcessor::new(&ctx, NoopExecutor);
        assert_eq!(processor.process_pending().unwrap(), 2);

        for id in [1, 2] {
            let task = queue.get_task(id).unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
            assert!(task.completed_at.is_some());
            assert!(ctx.paths.queue_completed_dir.join(format!("{id}.json")).is_file());
        }
        assert!(ctx.paths.heartbeat_file(TASK_PROCESSOR).is_file());

        let actions = audited_actions(&ctx);
        assert!(actions.contains(&"task_started".to_string()));
        assert!(actions.contains(&"task_completed".to_string()));
    }

    #[test]
    fn failed_execution_lands_in_failed() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        let id = queue.create_task("will fail", None).unwrap();

        let processor = TaskProcessor::new(&ctx, SelectiveExecutor);
        assert_eq!(processor.process_pending().unwrap(), 1);

        let task = queue.get_task(id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("Task execution failed"));
        assert!(ctx.paths.queue_failed_dir.join(format!("{id}.json")).is_file());
        assert!(audited_actions(&ctx).contains(&"task_failed".to_string()));
    }

    #[test]
    fn lockdown_blocks_processing() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        queue.create_task("held", None).unwrap();
        ModeAuthority::new(&ctx).set_mode(Mode::Lockdown, "quarantine").unwrap();

        let processor = TaskProcessor::new(&ctx, NoopExecutor);
        assert_eq!(processor.process_pending().unwrap(), 0);

        let task = queue.get_task(1).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(ctx.paths.queue_pending_dir.join("1.json").is_file());
        assert!(audited_actions(&ctx).contains(&"task_processing_blocked".to_string()));
    }

    #[test]
    fn live_peer_lock_short_circuits() {
        let (_tmp, ctx) = context();
        QueueEngine::new(&ctx).create_task("held", None).unwrap();
        std::fs::write(&ctx.paths.task_processor_lock, std::process::id().to_string()).unwrap();

        let processor = TaskProcessor::new(&ctx, NoopExecutor);
        assert_eq!(processor.process_pending().unwrap(), 0);
        assert!(audited_actions(&ctx).contains(&"task_processor_lock_failed".to_string()));
    }

    #[test]
    fn crash_mid_transition_is_reconciled_and_retried() {
        let (_tmp, ctx) = context();
        let queue = QueueEngine::new(&ctx);
        let id = queue.create_task("interrupted", None).unwrap();

        // Simulate a crash after the file move and row update but before
        // execution finished: file in processing/, row processing.
        queue.move_file(id, TaskStatus::Pending, TaskStatus::Processing).unwrap();
        queue.update_status(id, TaskStatus::Processing, None).unwrap();

        let processor = TaskProcessor::new(&ctx, NoopExecutor);
        assert_eq!(processor.process_pending().unwrap(), 1);

        let task = queue.get_task(id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(ctx.paths.queue_completed_dir.join(format!("{id}.json")).is_file());
    }

    #[test]
    fn malformed_task_file_is_skipped_and_audited() {
        let (_tmp, ctx) = context();
        std::fs::write(ctx.paths.queue_pending_dir.join("7.json"), "not json").unwrap();

        let processor = TaskProcessor::new(&ctx, NoopExecutor);
        assert_eq!(processor.process_pending().unwrap(), 0);
        assert!(audited_actions(&ctx).contains(&"task_processing_error".to_string()));
    }
}
