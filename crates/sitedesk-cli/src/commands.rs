//! One-shot CLI commands

use anyhow::{bail, Context, Result};
use chrono::Local;
use sitedesk_client::TaskQuery;
use sitedesk_core::{
    Board, Credentials, Dashboard, Priority, PurgeNotifier, SignUpRequest, Task, TaskDraft,
    TaskFilter, TaskStatus, TaskUpdate, UserIdentity,
};
use tracing::warn;
use uuid::Uuid;

use crate::config::SitedeskConfig;

pub async fn sign_in(config: &SitedeskConfig, email: String, password: String) -> Result<()> {
    let backend = config.backend()?;
    let identity = backend
        .sign_in(&Credentials::new(email, password))
        .await
        .context("Sign-in failed")?;
    config.identity_store()?.save(&identity)?;
    println!("Signed in as {} <{}>", identity.display_name(), identity.email);
    Ok(())
}

pub async fn sign_up(
    config: &SitedeskConfig,
    name: String,
    email: String,
    password: String,
) -> Result<()> {
    let backend = config.backend()?;
    let request = SignUpRequest {
        name,
        email,
        password,
    };
    let identity = backend.sign_up(&request).await.context("Sign-up failed")?;
    config.identity_store()?.save(&identity)?;
    println!("Account created for {} <{}>", identity.display_name(), identity.email);
    Ok(())
}

/// Drop the stored identity, then tell the backend. The backend call is
/// best-effort.
pub async fn sign_out(config: &SitedeskConfig) -> Result<()> {
    let store = config.identity_store()?;
    let Some(identity) = store.load()? else {
        println!("Not signed in");
        return Ok(());
    };
    store.clear()?;

    let backend = config.backend()?;
    if let Err(e) = backend.notify_purge(&identity).await {
        warn!("Backend was not notified of sign-out: {}", e);
    }
    println!("Signed out {}", identity.email);
    Ok(())
}

pub fn whoami(config: &SitedeskConfig) -> Result<()> {
    match config.identity_store()?.load()? {
        Some(identity) => {
            println!("{}", identity.display_name());
            println!("  Email:   {}", identity.email);
            println!("  User ID: {}", identity.user_id);
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

/// Load the signed-in identity or fail with a hint
pub fn require_identity(config: &SitedeskConfig) -> Result<UserIdentity> {
    match config.identity_store()?.load()? {
        Some(identity) => Ok(identity),
        None => bail!("Not signed in. Run `sitedesk sign-in` first."),
    }
}

pub async fn tasks(
    config: &SitedeskConfig,
    query: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    board: bool,
) -> Result<()> {
    let identity = require_identity(config)?;
    let backend = config.backend()?.authenticated(&identity);

    let mut server_query = TaskQuery::new();
    server_query.status = status;
    server_query.priority = priority;
    let fetched = backend.list_tasks(&server_query).await?;

    let filter = TaskFilter {
        query: query.unwrap_or_default(),
        status,
        priority,
    };
    let tasks: Vec<&Task> = fetched.iter().filter(|t| filter.matches(t)).collect();

    if board {
        print_board(&Board::from_tasks(tasks));
    } else {
        print_tasks(&tasks);
    }
    Ok(())
}

pub async fn add_task(config: &SitedeskConfig, draft: TaskDraft) -> Result<()> {
    draft.validate()?;
    let identity = require_identity(config)?;
    let backend = config.backend()?.authenticated(&identity);
    let task = backend.create_task(&draft).await.context("Could not create task")?;
    println!("Created {}", task.id);
    println!("{}", task_line(&task));
    Ok(())
}

pub async fn edit_task(config: &SitedeskConfig, id: Uuid, update: TaskUpdate) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to change. Pass at least one field, e.g. --status done.");
    }
    update.validate()?;
    let identity = require_identity(config)?;
    let backend = config.backend()?.authenticated(&identity);
    let task = backend
        .update_task(id, &update)
        .await
        .context("Could not update task")?;
    println!("{}", task_line(&task));
    Ok(())
}

pub async fn remove_task(config: &SitedeskConfig, id: Uuid) -> Result<()> {
    let identity = require_identity(config)?;
    let backend = config.backend()?.authenticated(&identity);
    backend.delete_task(id).await.context("Could not delete task")?;
    println!("Deleted {}", id);
    Ok(())
}

pub async fn toggle_task(config: &SitedeskConfig, id: Uuid) -> Result<()> {
    let identity = require_identity(config)?;
    let backend = config.backend()?.authenticated(&identity);
    let task = backend
        .toggle_complete(id)
        .await
        .context("Could not update task")?;
    println!("{}", task_line(&task));
    Ok(())
}

pub async fn dashboard(config: &SitedeskConfig) -> Result<()> {
    let identity = require_identity(config)?;
    let backend = config.backend()?.authenticated(&identity);
    let dashboard = backend.dashboard().await?;
    print_dashboard(&dashboard);
    Ok(())
}

pub fn config_show(config: &SitedeskConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

pub fn task_line(task: &Task) -> String {
    let today = Local::now().date_naive();
    let due = match task.due_date {
        Some(due) if task.is_overdue(today) => format!("  due {} (overdue)", due),
        Some(due) => format!("  due {}", due),
        None => String::new(),
    };
    let trade = task
        .trade
        .as_deref()
        .map(|t| format!(" / {}", t))
        .unwrap_or_default();
    format!(
        "[{:<11}] {:<6} {}  ({}{}){}",
        task.status.label(),
        task.priority.as_str(),
        task.title,
        task.category,
        trade,
        due
    )
}

pub fn print_tasks(tasks: &[&Task]) {
    if tasks.is_empty() {
        println!("No tasks");
        return;
    }
    for task in tasks {
        println!("{}", task_line(task));
    }
    println!("{} task(s)", tasks.len());
}

pub fn print_board(board: &Board) {
    for status in TaskStatus::ALL {
        let column = board.column(status);
        println!("== {} ({}) ==", status.label(), column.len());
        for task in column {
            println!("  {} [{}]", task.title, task.priority.as_str());
        }
    }
}

pub fn print_dashboard(dashboard: &Dashboard) {
    println!("Total tasks:     {}", dashboard.total_tasks);
    println!("Completion rate: {:.1}%", dashboard.completion_rate);
    println!(
        "By status:       {} to do, {} in progress, {} completed",
        dashboard.status_breakdown.todo,
        dashboard.status_breakdown.in_progress,
        dashboard.status_breakdown.completed
    );
    println!(
        "By priority:     {} high, {} medium, {} low",
        dashboard.priority_breakdown.high,
        dashboard.priority_breakdown.medium,
        dashboard.priority_breakdown.low
    );
    println!("Overdue:         {}", dashboard.overdue_count);
    for task in &dashboard.overdue_tasks {
        println!("  {}", task_line(task));
    }
    if !dashboard.categories.is_empty() {
        println!("Categories:");
        for (category, count) in &dashboard.categories {
            println!("  {:<16} {}", category, count);
        }
    }
}
