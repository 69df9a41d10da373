//! Crash-safe single-processor lock.
//!
//! A lock file holds the PID of its owner. Acquisition is an atomic
//! exclusive create; on collision the caller probes the recorded PID with
//! signal 0 and removes the file if the owner is gone, retrying once. The
//! lock therefore survives a crash of its holder but refuses to run
//! alongside a live peer.

use std::io::ErrorKind;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::debug;

use crate::error::Result;

/// Advisory PID-file lock.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Lock backed by the file at `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Try to take the lock. Returns `false` when a live peer holds it.
    pub fn acquire(&self) -> Result<bool> {
        if self.try_create()? {
            return Ok(true);
        }

        // Collision: probe the recorded holder.
        let holder = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|body| body.trim().parse::<i32>().ok());
        let Some(pid) = holder else {
            // Unreadable owner; leave the file for the operator.
            return Ok(false);
        };

        if is_pid_alive(pid) {
            return Ok(false);
        }

        debug!(pid, path = %self.path.display(), "removing stale processor lock");
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        // One retry; a racing peer that re-created the file wins.
        self.try_create()
    }

    /// Release the lock, tolerating a missing file.
    pub fn release(&self) {
        let _ = std::fs::remove_file(&self.path);
    }

    fn try_create(&self) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => {
                use std::io::Write;
                let mut file = file;
                file.write_all(std::process::id().to_string().as_bytes())?;
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Signal-0 liveness probe. EPERM means the process exists but belongs to
/// someone else, which still counts as alive.
fn is_pid_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
