//! Interactive guarded session
//!
//! Every input line counts as keyboard activity. The guard's events drive the
//! warning banner, the countdown and the terminal notice.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sitedesk_client::{BackendClient, TaskQuery};
use sitedesk_core::{ClientWorkspace, TaskFilter};
use sitedesk_guard::{
    format_countdown, ActivitySignal, ActivitySource, GuardEvent, PurgeExecutor, SessionGuard,
    SessionState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::{print_board, print_tasks, require_identity, task_line};
use crate::config::SitedeskConfig;

const HELP: &str = "\
Commands:
  keep            stay signed in (dismisses the expiry warning)
  logout          sign out and clear all session data
  tasks [query]   list cached tasks, optionally filtered
  board           show tasks by status
  projects        list projects
  select <id>     choose the current project
  done <id>       toggle a task between completed and to-do
  refresh         reload data from the backend
  status          show session state
  help            show this help";

/// One line of session input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Keep,
    Logout,
    Tasks(String),
    Board,
    Projects,
    Select(Uuid),
    Done(Uuid),
    Refresh,
    Status,
    Help,
    /// Blank line; still counts as activity
    Empty,
}

impl SessionCommand {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Ok(SessionCommand::Empty),
            "keep" => Ok(SessionCommand::Keep),
            "logout" | "sign-out" => Ok(SessionCommand::Logout),
            "tasks" => Ok(SessionCommand::Tasks(rest.to_string())),
            "board" => Ok(SessionCommand::Board),
            "projects" => Ok(SessionCommand::Projects),
            "select" => Uuid::parse_str(rest)
                .map(SessionCommand::Select)
                .map_err(|_| format!("'{}' is not a project id", rest)),
            "done" => Uuid::parse_str(rest)
                .map(SessionCommand::Done)
                .map_err(|_| format!("'{}' is not a task id", rest)),
            "refresh" => Ok(SessionCommand::Refresh),
            "status" => Ok(SessionCommand::Status),
            "help" | "?" => Ok(SessionCommand::Help),
            other => Err(format!("Unknown command '{}'. Type `help`.", other)),
        }
    }
}

/// Whether a countdown tick is worth printing
fn announce_tick(remaining: Duration) -> bool {
    let secs = remaining.as_secs();
    secs <= 10 || secs % 30 == 0
}

enum Exit {
    Purged,
    InputClosed,
    Interrupted,
}

pub async fn run(config: &SitedeskConfig) -> Result<()> {
    let identity = require_identity(config)?;
    let store = config.identity_store()?;
    let backend = config.backend()?.authenticated(&identity);

    let workspace = Arc::new(RwLock::new(ClientWorkspace::for_identity(identity.clone())));
    refresh(&backend, &workspace).await;

    let source = ActivitySource::new();
    let executor = PurgeExecutor::new(Arc::clone(&workspace), Arc::new(backend.clone()))
        .with_identity_store(store);
    let guard = SessionGuard::spawn(
        identity.clone(),
        config.guard,
        source.subscribe(),
        executor.clone(),
    )?;
    let mut events = guard.subscribe();

    println!(
        "Signed in as {}. You will be signed out after {} without activity.",
        identity.display_name(),
        format_countdown(config.guard.purge_offset)
    );
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let exit = loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    source.emit(ActivitySignal::Keyboard);
                    handle_line(&line, &guard, &backend, &workspace).await;
                }
                None => break Exit::InputClosed,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if render_event(&event) {
                        break Exit::Purged;
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} guard events", skipped),
                Err(RecvError::Closed) => break Exit::Purged,
            },
            _ = tokio::signal::ctrl_c() => break Exit::Interrupted,
        }
    };

    match exit {
        Exit::Purged => {
            if let Some(notice) = guard.join().await {
                println!();
                println!("{}", notice.message);
            }
            let limit = Duration::from_secs(config.request_timeout_secs);
            if !executor.settle(limit).await {
                warn!("Backend was not told about the purge before exit");
            }
        }
        Exit::InputClosed | Exit::Interrupted => {
            info!("Session closed; identity kept for next time");
            guard.shutdown().await;
        }
    }
    Ok(())
}

/// Print a guard event; true once the session is purged
fn render_event(event: &GuardEvent) -> bool {
    match event {
        GuardEvent::Warned { remaining } => {
            println!();
            println!("*** Your session is about to expire due to inactivity. ***");
            println!(
                "*** All session data will be cleared in {}. Type `keep` to stay signed in. ***",
                format_countdown(*remaining)
            );
            false
        }
        GuardEvent::Tick { remaining } => {
            if announce_tick(*remaining) && !remaining.is_zero() {
                println!("Session expires in {}", format_countdown(*remaining));
            }
            false
        }
        GuardEvent::Dismissed => {
            println!("Session kept active.");
            false
        }
        GuardEvent::Purged { .. } => true,
    }
}

async fn handle_line(
    line: &str,
    guard: &SessionGuard,
    backend: &BackendClient,
    workspace: &RwLock<ClientWorkspace>,
) {
    let command = match SessionCommand::parse(line) {
        Ok(command) => command,
        Err(message) => {
            println!("{}", message);
            remind_if_warned(guard);
            return;
        }
    };

    let is_keep = command == SessionCommand::Keep;
    match command {
        SessionCommand::Keep => {
            guard.keep_active();
        }
        SessionCommand::Logout => {
            guard.purge_now();
            return;
        }
        SessionCommand::Tasks(query) => {
            let ws = workspace.read().await;
            let filter = TaskFilter {
                query,
                ..Default::default()
            };
            print_tasks(&ws.filter_tasks(&filter));
        }
        SessionCommand::Board => print_board(&workspace.read().await.board()),
        SessionCommand::Projects => {
            let ws = workspace.read().await;
            if ws.projects().is_empty() {
                println!("No projects");
            }
            let current = ws.current_project().map(|p| p.id);
            for project in ws.projects() {
                let marker = if Some(project.id) == current { "*" } else { " " };
                let trade = project.trade.as_deref().unwrap_or("-");
                println!("{} {}  {}  ({})", marker, project.id, project.name, trade);
            }
        }
        SessionCommand::Select(id) => match workspace.write().await.select_project(id) {
            Ok(project) => println!("Current project: {}", project.name),
            Err(e) => println!("{}", e),
        },
        SessionCommand::Done(id) => match backend.toggle_complete(id).await {
            Ok(task) => {
                println!("{}", task_line(&task));
                let mut ws = workspace.write().await;
                if ws.is_signed_in() {
                    ws.upsert_task(task);
                }
            }
            Err(e) => println!("Could not update task: {}", e),
        },
        SessionCommand::Refresh => {
            refresh(backend, workspace).await;
            let ws = workspace.read().await;
            println!(
                "Loaded {} task(s) and {} project(s)",
                ws.tasks().len(),
                ws.projects().len()
            );
        }
        SessionCommand::Status => {
            let snapshot = guard.snapshot();
            let ws = workspace.read().await;
            match ws.identity() {
                Some(identity) => println!("Signed in as {}", identity.email),
                None => println!("Not signed in"),
            }
            println!("Session: {:?}", snapshot.state);
            if let Some(millis) = snapshot.remaining_millis {
                println!("Expires in {}", format_countdown(Duration::from_millis(millis)));
            }
            println!("Categories: {}", ws.categories().join(", "));
        }
        SessionCommand::Help => println!("{}", HELP),
        SessionCommand::Empty => {}
    }

    if !is_keep {
        remind_if_warned(guard);
    }
}

/// Activity does not postpone an expiry that is already counting down
fn remind_if_warned(guard: &SessionGuard) {
    let snapshot = guard.snapshot();
    if snapshot.state == SessionState::Warned {
        if let Some(millis) = snapshot.remaining_millis {
            println!(
                "Session still expires in {}. Type `keep` to stay signed in.",
                format_countdown(Duration::from_millis(millis))
            );
        }
    }
}

/// Reload session data. Failures leave the previous data in place.
async fn refresh(backend: &BackendClient, workspace: &RwLock<ClientWorkspace>) {
    let projects = backend.list_projects().await;
    let tasks = backend.list_tasks(&TaskQuery::new()).await;
    let dashboard = backend.dashboard().await;
    let categories = backend.categories().await;

    let mut ws = workspace.write().await;
    // purged while loading
    if !ws.is_signed_in() {
        return;
    }

    match projects {
        Ok(projects) => ws.set_projects(projects),
        Err(e) => warn!("Could not load projects: {}", e),
    }
    match tasks {
        Ok(tasks) => ws.set_tasks(tasks),
        Err(e) => warn!("Could not load tasks: {}", e),
    }
    match dashboard {
        Ok(dashboard) => ws.set_dashboard(dashboard),
        Err(e) => warn!("Could not load dashboard: {}", e),
    }
    match categories {
        Ok(categories) => ws.merge_categories(categories),
        Err(e) => warn!("Could not load categories: {}", e),
    }
}
