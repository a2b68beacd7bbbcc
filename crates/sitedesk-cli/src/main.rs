//! Sitedesk CLI - task board client with idle-session protection
//!
//! Signed-in sessions are guarded: after a period without input the user is
//! warned, and if they do not respond all session data is cleared.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sitedesk_cli::{commands, session, SitedeskConfig};
use sitedesk_core::{Priority, TaskDraft, TaskStatus, TaskUpdate};
use uuid::Uuid;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sitedesk")]
#[command(about = "Task board and material takeoff client", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: $SITEDESK_CONFIG or <config dir>/sitedesk/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the identity
    SignIn {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and sign in
    SignUp {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored identity and end the backend session
    SignOut,

    /// Show who is signed in
    Whoami,

    /// List tasks, or change one
    #[command(args_conflicts_with_subcommands = true)]
    Tasks {
        #[command(subcommand)]
        action: Option<TaskCommands>,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Show task statistics
    Dashboard,

    /// Interactive session with idle timeout
    Session,

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct ListArgs {
    /// Text to look for in title or description
    #[arg(short, long)]
    query: Option<String>,

    /// todo, in_progress or completed
    #[arg(short, long)]
    status: Option<TaskStatus>,

    /// low, medium or high
    #[arg(long)]
    priority: Option<Priority>,

    /// Group by status
    #[arg(short, long)]
    board: bool,
}

/// Task fields; on `edit` only the given ones change
#[derive(Args)]
struct TaskFields {
    #[arg(short, long)]
    description: Option<String>,

    /// todo, in_progress or completed
    #[arg(short, long)]
    status: Option<TaskStatus>,

    /// low, medium or high
    #[arg(long)]
    priority: Option<Priority>,

    #[arg(long)]
    category: Option<String>,

    /// Drywall, HVAC, Painting, Electrical, Plumbing, General, ...
    #[arg(long)]
    trade: Option<String>,

    /// Due date, YYYY-MM-DD
    #[arg(long)]
    due: Option<NaiveDate>,

    /// Trade measurements as JSON, e.g. '{"length_ft": 40}'
    #[arg(long)]
    measurements: Option<serde_json::Value>,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks
    List(ListArgs),

    /// Create a task
    Add {
        title: String,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Change a task
    Edit {
        id: Uuid,

        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Delete a task
    Rm { id: Uuid },

    /// Toggle a task between completed and to-do
    Done { id: Uuid },
}

impl TaskFields {
    fn into_draft(self, title: String) -> TaskDraft {
        let mut draft = TaskDraft::new(title);
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(priority) = self.priority {
            draft.priority = priority;
        }
        if let Some(category) = self.category {
            draft.category = category;
        }
        draft.trade = self.trade;
        draft.due_date = self.due;
        draft.measurements = self.measurements;
        draft
    }

    fn into_update(self, title: Option<String>) -> TaskUpdate {
        TaskUpdate {
            title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            category: self.category,
            trade: self.trade,
            due_date: self.due,
            measurements: self.measurements,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitedesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(SitedeskConfig::default_path);

    if let Commands::Config(ConfigCommands::Init { force }) = cli.command {
        if config_path.exists() && !force {
            anyhow::bail!(
                "Config already exists at {} (use --force to overwrite)",
                config_path.display()
            );
        }
        SitedeskConfig::default().save(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let config = SitedeskConfig::load_or_create(&config_path)?.with_env_overrides();
    config.validate()?;
    debug!("Using backend {}", config.backend_url);

    match cli.command {
        Commands::SignIn { email, password } => commands::sign_in(&config, email, password).await,
        Commands::SignUp {
            name,
            email,
            password,
        } => commands::sign_up(&config, name, email, password).await,
        Commands::SignOut => commands::sign_out(&config).await,
        Commands::Whoami => commands::whoami(&config),
        Commands::Tasks { action, list } => match action {
            None => list_tasks(&config, list).await,
            Some(TaskCommands::List(list)) => list_tasks(&config, list).await,
            Some(TaskCommands::Add { title, fields }) => {
                commands::add_task(&config, fields.into_draft(title)).await
            }
            Some(TaskCommands::Edit { id, title, fields }) => {
                commands::edit_task(&config, id, fields.into_update(title)).await
            }
            Some(TaskCommands::Rm { id }) => commands::remove_task(&config, id).await,
            Some(TaskCommands::Done { id }) => commands::toggle_task(&config, id).await,
        },
        Commands::Dashboard => commands::dashboard(&config).await,
        Commands::Session => session::run(&config).await,
        Commands::Config(ConfigCommands::Show) => commands::config_show(&config),
        Commands::Config(ConfigCommands::Init { .. }) => Ok(()),
    }
}

async fn list_tasks(config: &SitedeskConfig, list: ListArgs) -> Result<()> {
    commands::tasks(config, list.query, list.status, list.priority, list.board).await
}
