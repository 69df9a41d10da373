//! Filesystem layout under the configurable base path.

use std::io;
use std::path::{Path, PathBuf};

/// Default base path for a production deployment.
pub const DEFAULT_BASE: &str = "/institute";

/// Every directory and store location the control plane touches.
///
/// The layout is fixed relative to the base path; only the base itself is
/// configurable (`--base-path` in the binaries, a tempdir in tests).
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root of the tree.
    pub base: PathBuf,

    /// Researcher working area.
    pub research_dir: PathBuf,
    /// Director working area.
    pub management_dir: PathBuf,
    /// Reports shared between the roles.
    pub shared_reports_dir: PathBuf,
    /// Report templates.
    pub shared_templates_dir: PathBuf,
    /// System executables.
    pub system_bin_dir: PathBuf,
    /// Component liveness files.
    pub system_heartbeat_dir: PathBuf,
    /// Watchdog-to-escalation-engine alert handoff.
    pub system_alerts_dir: PathBuf,
    /// Free-form process logs.
    pub logs_dir: PathBuf,
    /// Researcher inbox.
    pub inbox_researcher_dir: PathBuf,
    /// Director inbox (escalation and lockdown notifications land here).
    pub inbox_director_dir: PathBuf,
    /// Research queue: tasks awaiting the processor.
    pub queue_pending_dir: PathBuf,
    /// Research queue: task currently being executed.
    pub queue_processing_dir: PathBuf,
    /// Research queue: successfully finished tasks.
    pub queue_completed_dir: PathBuf,
    /// Research queue: failed tasks.
    pub queue_failed_dir: PathBuf,
    /// Management queue: pending items.
    pub queue_management_pending_dir: PathBuf,
    /// Management queue: escalation worksheets.
    pub queue_management_escalations_dir: PathBuf,

    /// Mode history and heartbeat mirror store.
    pub system_db: PathBuf,
    /// Task store.
    pub research_db: PathBuf,
    /// Escalation and configuration store.
    pub management_db: PathBuf,
    /// Report registry store.
    pub shared_db: PathBuf,
    /// Append-only audit store.
    pub audit_db: PathBuf,

    /// Single-processor advisory lock.
    pub task_processor_lock: PathBuf,
}

impl Paths {
    /// Build the layout rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let shared = base.join("shared");
        let system = base.join("system");
        let inbox = base.join("inbox");
        let queues_research = base.join("queues").join("research");
        let queues_management = base.join("queues").join("management");
        let db = base.join("db");

        Self {
            research_dir: base.join("research"),
            management_dir: base.join("management"),
            shared_reports_dir: shared.join("reports"),
            shared_templates_dir: shared.join("templates"),
            system_bin_dir: system.join("bin"),
            system_heartbeat_dir: system.join("heartbeat"),
            system_alerts_dir: system.join("alerts"),
            logs_dir: base.join("logs"),
            inbox_researcher_dir: inbox.join("researcher"),
            inbox_director_dir: inbox.join("director"),
            queue_pending_dir: queues_research.join("pending"),
            queue_processing_dir: queues_research.join("processing"),
            queue_completed_dir: queues_research.join("completed"),
            queue_failed_dir: queues_research.join("failed"),
            queue_management_pending_dir: queues_management.join("pending"),
            queue_management_escalations_dir: queues_management.join("escalations"),
            system_db: db.join("system.db"),
            research_db: db.join("research.db"),
            management_db: db.join("management.db"),
            shared_db: db.join("shared.db"),
            audit_db: db.join("audit.db"),
            task_processor_lock: system.join("task_processor.lock"),
            base,
        }
    }

    /// Create every directory in the layout.
    pub fn ensure_directories(&self) -> io::Result<()> {
        let directories = [
            &self.research_dir,
            &self.management_dir,
            &self.shared_reports_dir,
            &self.shared_templates_dir,
            &self.system_bin_dir,
            &self.system_heartbeat_dir,
            &self.system_alerts_dir,
            &self.logs_dir,
            &self.inbox_researcher_dir,
            &self.inbox_director_dir,
            &self.queue_pending_dir,
            &self.queue_processing_dir,
            &self.queue_completed_dir,
            &self.queue_failed_dir,
            &self.queue_management_pending_dir,
            &self.queue_management_escalations_dir,
        ];
        for dir in directories {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::create_dir_all(self.db_dir())?;
        Ok(())
    }

    /// Directory holding the five store files.
    #[must_use]
    pub fn db_dir(&self) -> &Path {
        self.system_db.parent().unwrap_or(&self.base)
    }

    /// Liveness file for a named component.
    #[must_use]
    pub fn heartbeat_file(&self, component: &str) -> PathBuf {
        self.system_heartbeat_dir.join(component)
    }

    /// The five stores, keyed by logical name.
    #[must_use]
    pub fn stores(&self) -> [(&'static str, &Path); 5] {
        [
            ("system", self.system_db.as_path()),
            ("research", self.research_db.as_path()),
            ("management", self.management_db.as_path()),
            ("shared", self.shared_db.as_path()),
            ("audit", self.audit_db.as_path()),
        ]
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(DEFAULT_BASE)
    }
}
