//! Director inbox notifications.
//!
//! Notifications are plain-text files dropped into the director inbox;
//! nothing in the control plane assumes the director reads them through
//! this software.

use std::path::PathBuf;

use crate::context::Context;
use crate::error::Result;
use crate::escalation::Level;

/// Writes notification files into the director inbox.
#[derive(Debug, Clone)]
pub struct Notifier {
    ctx: Context,
}

impl Notifier {
    /// Notifier over the inbox named by `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Escalation notification: `escalation_<id>_<YYYYMMDD_HHMMSS>.txt`.
    pub fn escalation(&self, id: i64, level: Level, message: &str) -> Result<PathBuf> {
        let filename = format!("escalation_{id}_{}.txt", self.ctx.clock.file_stamp());
        let content = format!(
            "ESCALATION ALERT - {level}\n\
             \n\
             Escalation ID: {id}\n\
             Level: {level}\n\
             Time: {time}\n\
             \n\
             Message:\n\
             {message}\n\
             \n\
             To acknowledge: warden --role=director escalation ack {id}\n\
             To resolve: warden --role=director escalation resolve {id} --note \"resolution details\"\n",
            time = self.ctx.clock.timestamp(),
        );
        self.deliver(&filename, &content)
    }

    /// Lockdown notification: `LOCKDOWN_<YYYYMMDD_HHMMSS>.txt`.
    pub fn lockdown(&self, code: &str, message: &str) -> Result<PathBuf> {
        let filename = format!("LOCKDOWN_{}.txt", self.ctx.clock.file_stamp());
        let content = format!(
            "SYSTEM LOCKDOWN TRIGGERED\n\
             \n\
             Time: {time}\n\
             Trigger: {code}\n\
             \n\
             Message:\n\
             {message}\n\
             \n\
             The system has entered LOCKDOWN mode due to an unacknowledged L4 escalation.\n\
             \n\
             To recover:\n\
             1. warden --role=director escalation list\n\
             2. warden --role=director escalation ack <id> (for all escalations)\n\
             3. warden --role=director recovery verify\n\
             4. warden --role=director recovery confirm\n",
            time = self.ctx.clock.timestamp(),
        );
        self.deliver(&filename, &content)
    }

    fn deliver(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let path = self.ctx.paths.inbox_director_dir.join(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
