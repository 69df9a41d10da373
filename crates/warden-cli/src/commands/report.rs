//! Director report commands.

use warden_core::report::ReportGenerator;
use warden_core::{Result, Role};

use super::Session;

pub fn generate(session: &Session, weekly: bool) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let reports = ReportGenerator::new(&session.ctx);
    let path = if weekly {
        reports.generate_weekly()?
    } else {
        reports.generate_daily()?
    };

    println!("Report generated: {}", path.display());
    Ok(())
}

pub fn list(session: &Session) -> Result<()> {
    session.enforce_role(Role::Director)?;

    let records = ReportGenerator::new(&session.ctx).list(None)?;
    if records.is_empty() {
        println!("No reports found.");
        return Ok(());
    }

    println!("{:<6} {:<10} {:<20} Path", "ID", "Type", "Generated");
    println!("{}", "-".repeat(100));
    for record in records.iter().take(20) {
        let generated = record.generated_at.chars().take(19).collect::<String>();
        println!("{:<6} {:<10} {generated:<20} {}", record.id, record.kind, record.path);
    }
    Ok(())
}
