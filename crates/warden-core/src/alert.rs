//! Watchdog alert records.
//!
//! An alert is a one-shot JSON file written into the alerts directory by
//! the watchdog and consumed exactly once by the escalation engine. The
//! escalation record is the persistent form; ingested alert files are
//! deleted, malformed ones are left in place for operator inspection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Degradation worth a look.
    Warning,
    /// Condition that threatens the system.
    Critical,
}

impl Severity {
    /// Uppercase wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// One alert as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Severity class.
    pub level: Severity,
    /// Stable code, e.g. `DISK_CRITICAL`. Doubles as the escalation key.
    pub code: String,
    /// Human-readable condition.
    pub message: String,
    /// When the watchdog observed the condition.
    pub created_at: String,
}

impl Alert {
    /// Build an alert stamped with the context clock.
    #[must_use]
    pub fn new(ctx: &Context, level: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            created_at: ctx.clock.timestamp(),
        }
    }

    /// Write the alert into the alerts directory as
    /// `<code>_<YYYYMMDD_HHMMSS>.json`.
    pub fn write(&self, ctx: &Context) -> Result<PathBuf> {
        let filename = format!("{}_{}.json", self.code, ctx.clock.file_stamp());
        let path = ctx.paths.system_alerts_dir.join(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self)
            .map_err(|err| Error::MalformedInput(err.to_string()))?;
        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Parse one alert file. Missing required fields or bad JSON surface
    /// as malformed input.
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(|err| {
            Error::MalformedInput(format!("{}: {err}", path.display()))
        })
    }
}

/// Alert files awaiting ingestion, in sorted filename order.
pub fn pending_files(ctx: &Context) -> Result<Vec<PathBuf>> {
    let dir = &ctx.paths.system_alerts_dir;
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
