//! warden - operator CLI for the warden control plane.
//!
//! Role is asserted by the caller with `--role`; researcher commands are
//! additionally gated by the operational mode. Exit code 0 on success, 1
//! on permission failure, mode-gated denial, or unexpected error.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use warden_core::queue::TaskStatus;
use warden_core::store::bootstrap;
use warden_core::{Context, Role};

use crate::commands::Session;

/// warden - research environment control plane
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Acting role
    #[arg(long, value_enum)]
    role: RoleArg,

    /// Base path of the deployment tree
    #[arg(long, default_value = warden_core::paths::DEFAULT_BASE)]
    base_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RoleArg {
    Researcher,
    Director,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Researcher => Self::Researcher,
            RoleArg::Director => Self::Director,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum StatusArg {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<StatusArg> for TaskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Processing => Self::Processing,
            StatusArg::Completed => Self::Completed,
            StatusArg::Failed => Self::Failed,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ReportKind {
    Daily,
    Weekly,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Task management (researcher)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Inbox management (researcher)
    #[command(subcommand)]
    Inbox(InboxCommands),

    /// Show system status (director)
    Status,

    /// Escalation management (director)
    #[command(subcommand)]
    Escalation(EscalationCommands),

    /// Report management (director)
    #[command(subcommand)]
    Report(ReportCommands),

    /// Configuration management (director)
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Recovery management (director)
    #[command(subcommand)]
    Recovery(RecoveryCommands),

    /// Lockdown management (director)
    #[command(subcommand)]
    Lockdown(LockdownCommands),

    /// Audit log management (director)
    #[command(subcommand)]
    Audit(AuditCommands),
}

#[derive(Subcommand, Debug)]
enum TaskCommands {
    /// Create a task
    Create {
        /// Task name
        #[arg(long)]
        name: String,

        /// Task description
        #[arg(long)]
        description: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Show task status
    Status {
        /// Task ID
        task_id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum InboxCommands {
    /// List inbox messages
    List,

    /// Read a message by its listed number
    Read {
        /// Message number from `inbox list`
        message_id: usize,
    },
}

#[derive(Subcommand, Debug)]
enum EscalationCommands {
    /// List escalations
    List,

    /// Acknowledge an escalation
    Ack {
        /// Escalation ID
        escalation_id: i64,
    },

    /// Resolve an escalation
    Resolve {
        /// Escalation ID
        escalation_id: i64,

        /// Resolution note
        #[arg(long)]
        note: String,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    /// Generate a report
    Generate {
        /// Report kind
        #[arg(value_enum)]
        report_type: ReportKind,
    },

    /// List generated reports
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand, Debug)]
enum RecoveryCommands {
    /// Verify recovery conditions
    Verify,

    /// Confirm recovery from lockdown
    Confirm,
}

#[derive(Subcommand, Debug)]
enum LockdownCommands {
    /// Trigger system lockdown
    Trigger {
        /// Lockdown reason
        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommands {
    /// Show recent audit log entries
    Tail {
        /// Number of entries
        n: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> warden_core::Result<()> {
    let ctx = Context::new(&cli.base_path);
    bootstrap::initialize_all(&ctx)?;
    let session = Session::new(&ctx, cli.role.into());

    match cli.command {
        Commands::Task(command) => match command {
            TaskCommands::Create { name, description } => {
                commands::task::create(&session, &name, description.as_deref())
            }
            TaskCommands::List { status } => {
                commands::task::list(&session, status.map(Into::into))
            }
            TaskCommands::Status { task_id } => commands::task::status(&session, task_id),
        },
        Commands::Inbox(command) => match command {
            InboxCommands::List => commands::inbox::list(&session),
            InboxCommands::Read { message_id } => commands::inbox::read(&session, message_id),
        },
        Commands::Status => commands::status::show(&session),
        Commands::Escalation(command) => match command {
            EscalationCommands::List => commands::escalation::list(&session),
            EscalationCommands::Ack { escalation_id } => {
                commands::escalation::acknowledge(&session, escalation_id)
            }
            EscalationCommands::Resolve {
                escalation_id,
                note,
            } => commands::escalation::resolve(&session, escalation_id, &note),
        },
        Commands::Report(command) => match command {
            ReportCommands::Generate { report_type } => {
                commands::report::generate(&session, matches!(report_type, ReportKind::Weekly))
            }
            ReportCommands::List => commands::report::list(&session),
        },
        Commands::Config(command) => match command {
            ConfigCommands::Show => commands::config::show(&session),
            ConfigCommands::Set { key, value } => commands::config::set(&session, &key, &value),
        },
        Commands::Recovery(command) => match command {
            RecoveryCommands::Verify => commands::recovery::verify(&session),
            RecoveryCommands::Confirm => commands::recovery::confirm(&session),
        },
        Commands::Lockdown(command) => match command {
            LockdownCommands::Trigger { reason } => {
                commands::lockdown::trigger(&session, &reason)
            }
        },
        Commands::Audit(command) => match command {
            AuditCommands::Tail { n } => commands::audit::tail(&session, n.unwrap_or(50)),
        },
    }
}
