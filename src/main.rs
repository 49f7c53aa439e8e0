mod config;
mod errlog;
mod inventory;
mod launcher;
mod spawn;
mod watchdog;

use clap::{Parser, Subcommand};
use config::WatchdogConfig;
use inventory::{Inventory, Presence};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use watchdog::{Outcome, Watchdog};

/// Keeps the Backup Manager alive: run with no command from a scheduler to
/// check the process and restart it if missing.
#[derive(Parser, Debug)]
#[command(name = "backup-watchdog", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "watchdog.toml")]
    config: PathBuf,

    /// Interpreter used to start the launcher (overrides config)
    #[arg(long)]
    interpreter: Option<PathBuf>,

    /// Launcher script (overrides config)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Print resolved settings and current presence, don't restart anything
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (inventory output, probe decisions)
    #[arg(short, long)]
    verbose: bool,

    /// Only errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Backup Manager without a console window and wait for it
    Launch {
        /// Manager directory holding main.py (default: the launcher script's directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Printed by `--dry-run`.
#[derive(Serialize)]
struct DryRunReport<'a> {
    config: &'a WatchdogConfig,
    error_log: PathBuf,
    presence: Presence,
}

/// Resolve settings and probe presence. Never spawns.
async fn dry_run_report<'a, P, F>(
    watchdog: &Watchdog<P, F>,
    config: &'a WatchdogConfig,
) -> DryRunReport<'a>
where
    P: Inventory,
    F: Inventory,
{
    DryRunReport {
        config,
        error_log: config.error_log_path(),
        presence: watchdog.presence().await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn resolve_config(cli: &Cli) -> WatchdogConfig {
    let mut config = WatchdogConfig::load_or_default(&cli.config);
    if let Some(ref interpreter) = cli.interpreter {
        config.target.interpreter = interpreter.clone();
    }
    if let Some(ref script) = cli.script {
        config.target.script = script.clone();
    }
    config
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    let config = resolve_config(&cli);
    let watchdog = Watchdog::from_config(&config);

    // Checked before any command so `--dry-run launch` starts nothing either.
    if cli.dry_run {
        let report = dry_run_report(&watchdog, &config).await;
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "failed to render dry-run report"),
        }
        return;
    }

    if let Some(Command::Launch { ref dir }) = cli.command {
        let manager_dir = dir.clone().unwrap_or_else(|| config.script_dir());
        let code = match launcher::launch(&config.target.interpreter, &manager_dir).await {
            Ok(code) => code.unwrap_or(0),
            Err(e) => {
                tracing::error!(error = %e, "launch failed");
                1
            }
        };
        std::process::exit(code);
    }

    match watchdog.run_once().await {
        Outcome::AlreadyRunning => {}
        Outcome::Restarted { presence, pid } => {
            tracing::info!(pid, ?presence, "backup manager restarted")
        }
        Outcome::RestartFailed { error, logged } => {
            tracing::debug!(%error, logged, "restart failure recorded")
        }
    }
}
