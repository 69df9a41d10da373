//! warden-daemon - long-lived monitors for the warden control plane.
//!
//! Three subcommands, one per process: `watchdog` probes health and emits
//! alerts, `escalation` drives the ladder, `processor` drains the task
//! queue. Each runs a single-threaded tick loop with a cooperative sleep;
//! SIGINT/SIGTERM let the current tick finish, audit the stop, and exit.
//!
//! Any error inside a tick is contained: it is audited, the loop sleeps,
//! and the next tick re-runs the work. The interval is the only backoff.

mod shutdown;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use warden_core::audit::AuditLog;
use warden_core::engine::EscalationEngine;
use warden_core::processor::{NoopExecutor, TaskProcessor};
use warden_core::store::bootstrap;
use warden_core::watchdog::Watchdog;
use warden_core::{Context, Role};

use crate::shutdown::ShutdownFlag;

/// warden-daemon - control plane monitors
#[derive(Parser, Debug)]
#[command(name = "warden-daemon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base path of the deployment tree
    #[arg(long, default_value = warden_core::paths::DEFAULT_BASE)]
    base_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the health watchdog
    Watchdog {
        /// Seconds between ticks
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },

    /// Run the escalation engine
    Escalation {
        /// Seconds between ticks
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },

    /// Run the task processor
    Processor {
        /// Seconds between ticks
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Drain the queue once and exit
        #[arg(long)]
        once: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let ctx = Context::new(&cli.base_path);
    bootstrap::initialize_all(&ctx)
        .with_context(|| format!("bootstrapping {}", cli.base_path.display()))?;

    let flag = ShutdownFlag::install()?;
    let audit = AuditLog::new(&ctx);

    match cli.command {
        Command::Watchdog { interval } => {
            let watchdog = Watchdog::new(&ctx);
            run_loop(&audit, "watchdog", interval, flag, || {
                watchdog.tick().map(|emitted| {
                    if emitted > 0 {
                        info!(emitted, "watchdog emitted alerts");
                    }
                })
            })
        }
        Command::Escalation { interval } => {
            let engine = EscalationEngine::new(&ctx);
            run_loop(&audit, "escalation_engine", interval, flag, || engine.tick())
        }
        Command::Processor { interval, once } => {
            let processor = TaskProcessor::new(&ctx, NoopExecutor);
            if once {
                let processed = processor.process_pending()?;
                if processed > 0 {
                    info!(processed, "processed task(s)");
                }
                return Ok(());
            }
            run_loop(&audit, "task_processor", interval, flag, || {
                processor.process_pending().map(|processed| {
                    if processed > 0 {
                        info!(processed, "processed task(s)");
                    }
                })
            })
        }
    }
}

/// Shared tick loop: audit the start, contain per-tick errors, audit the
/// stop on cooperative shutdown.
fn run_loop<F>(
    audit: &AuditLog,
    name: &str,
    interval: u64,
    flag: ShutdownFlag,
    mut tick: F,
) -> Result<()>
where
    F: FnMut() -> warden_core::Result<()>,
{
    info!(name, interval, "starting");
    audit
        .log(Role::System, &format!("{name}_started"), None, None)
        .with_context(|| format!("auditing {name} start"))?;

    while !flag.is_set() {
        if let Err(err) = tick() {
            error!(name, %err, "tick failed");
            if let Err(audit_err) =
                audit.log(Role::System, &format!("{name}_error"), None, Some(&err.to_string()))
            {
                error!(name, %audit_err, "failed to audit tick error");
            }
        }
        flag.sleep(Duration::from_secs(interval));
    }

    info!(name, "stopping");
    // Best effort: a broken audit store must not block the exit path.
    if let Err(err) = audit.log(Role::System, &format!("{name}_stopped"), None, None) {
        error!(name, %err, "failed to audit stop");
    }
    Ok(())
}
