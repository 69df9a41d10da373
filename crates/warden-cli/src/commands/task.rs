//! Researcher task commands.

use warden_core::queue::{QueueEngine, TaskStatus};
use warden_core::{Result, Role};

use super::Session;

pub fn create(session: &Session, name: &str, description: Option<&str>) -> Result<()> {
    session.enforce_role(Role::Researcher)?;
    session.check_lockdown()?;

    let queue = QueueEngine::new(&session.ctx);
    let task_id = queue.create_task(name, description)?;

    session.audit.log(
        session.role,
        "task_created",
        Some(&format!("task_{task_id}")),
        Some(name),
    )?;

    println!("Task created: {task_id}");
    println!("Name: {name}");
    if let Some(description) = description {
        println!("Description: {description}");
    }
    Ok(())
}

pub fn list(session: &Session, status: Option<TaskStatus>) -> Result<()> {
    session.enforce_role(Role::Researcher)?;
    session.check_lockdown()?;

    let tasks = QueueEngine::new(&session.ctx).list_tasks(status)?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("{:<6} {:<12} {:<20} Name", "ID", "Status", "Created");
    println!("{}", "-".repeat(80));
    for task in tasks {
        let created = task.created_at.chars().take(19).collect::<String>();
        println!("{:<6} {:<12} {created:<20} {}", task.id, task.status.as_str(), task.name);
    }
    Ok(())
}

pub fn status(session: &Session, task_id: i64) -> Result<()> {
    session.enforce_role(Role::Researcher)?;
    session.check_lockdown()?;

    let Some(task) = QueueEngine::new(&session.ctx).get_task(task_id)? else {
        println!("Task not found: {task_id}");
        return Ok(());
    };

    println!("Task ID: {}", task.id);
    println!("Name: {}", task.name);
    if let Some(description) = &task.description {
        println!("Description: {description}");
    }
    println!("Status: {}", task.status);
    println!("Created: {}", task.created_at);
    if let Some(updated) = &task.updated_at {
        println!("Updated: {updated}");
    }
    if let Some(completed) = &task.completed_at {
        println!("Completed: {completed}");
    }
    if let Some(error) = &task.error_message {
        println!("Error: {error}");
    }
    Ok(())
}
