//! Researcher inbox commands.

use std::path::PathBuf;

use warden_core::{Result, Role};

use super::Session;

fn sorted_messages(session: &Session) -> Result<Vec<PathBuf>> {
    let dir = &session.ctx.paths.inbox_researcher_dir;
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut messages: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    messages.sort();
    Ok(messages)
}

pub fn list(session: &Session) -> Result<()> {
    session.enforce_role(Role::Researcher)?;
    session.check_lockdown()?;

    let messages = sorted_messages(session)?;
    if messages.is_empty() {
        println!("Inbox is empty.");
        return Ok(());
    }

    println!("Inbox messages:");
    for (index, message) in messages.iter().enumerate() {
        println!(
            "{}. {}",
            index + 1,
            message.file_name().unwrap_or_default().to_string_lossy()
        );
    }
    Ok(())
}

pub fn read(session: &Session, message_id: usize) -> Result<()> {
    session.enforce_role(Role::Researcher)?;
    session.check_lockdown()?;

    let messages = sorted_messages(session)?;
    let Some(path) = message_id.checked_sub(1).and_then(|i| messages.get(i)) else {
        println!("Invalid message ID: {message_id}");
        return Ok(());
    };

    print!("{}", std::fs::read_to_string(path)?);
    Ok(())
}
