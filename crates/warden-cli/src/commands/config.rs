//! Director configuration commands.

use warden_core::settings::Settings;
use warden_core::{Result, Role};

use super::Session;

pub fn show(session: &Session) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let rows = Settings::new(&session.ctx).all()?;
    println!("{:<35} {:<20} Updated", "Key", "Value");
    println!("{}", "-".repeat(80));
    for row in rows {
        let updated = row.updated_at.chars().take(19).collect::<String>();
        println!("{:<35} {:<20} {updated}", row.key, row.value);
    }
    Ok(())
}

pub fn set(session: &Session, key: &str, value: &str) -> Result<()> {
    session.enforce_role(Role::Director)?;

    Settings::new(&session.ctx).set(key, value)?;
    session
        .audit
        .log(session.role, "config_updated", Some(key), Some(value))?;

    println!("Configuration updated: {key} = {value}");
    Ok(())
}
