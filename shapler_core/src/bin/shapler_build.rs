//! `shapler-build`: capture build errors before a fix attempt and diff them after.
//!
//! - `run` builds the project and snapshots every file a diagnostic points at
//! - `finalize` rebuilds and closes the most recent snapshot with diffs
//!
//! Exactly one JSON status document is printed to stdout; logs go to stderr.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::Level;

use shapler_core::telemetry::init_tracing;
use shapler_core::{BuildRunner, Config, Error, FsLedgerStore, Pipeline, RunOutcome};
use shapler_runners::{GradleRunner, LogFileRunner};

#[derive(Parser)]
#[command(name = "shapler-build")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Capture compiler errors and diff the files that carried them", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for snapshots, diffs and build logs (default: $SHAPLER_WORK_DIR or cwd)
    #[arg(long, global = true)]
    work_dir: Option<Utf8PathBuf>,

    /// Build timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the project and snapshot every file with a reported error
    Run(BuildArgs),
    /// Rebuild the project and close the most recent snapshot
    Finalize(BuildArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Project root containing the Gradle build
    #[arg(short, long)]
    project: Utf8PathBuf,

    /// Gradle task to run
    #[arg(short, long)]
    task: String,

    /// Replay a captured build log instead of invoking Gradle
    #[arg(long)]
    from_log: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { Level::DEBUG } else { Level::INFO });

    let (status, code) = match execute(&cli) {
        Ok(status) => (status, ExitCode::SUCCESS),
        Err(err) => (failure_status(&err), ExitCode::FAILURE),
    };
    println!("{status}");
    code
}

fn execute(cli: &Cli) -> Result<Value> {
    let config = config_for(cli);
    let store = FsLedgerStore::new(config.snapshot_dir());

    match &cli.command {
        Command::Run(args) => {
            let pipeline = Pipeline::new(config.clone(), runner_for(&config, args), &store);
            let outcome = pipeline
                .run(args.project.as_std_path(), &args.task)
                .with_context(|| format!("run of `{}` in {} failed", args.task, args.project))?;

            Ok(match outcome {
                RunOutcome::NoErrors => json!({
                    "status": "success",
                    "message": "no errors detected",
                }),
                RunOutcome::SnapshotCreated { ledger, count } => json!({
                    "status": "snapshot_created",
                    "count": count,
                    "marker": store.path_of(&ledger).display().to_string(),
                }),
            })
        }
        Command::Finalize(args) => {
            let pipeline = Pipeline::new(config.clone(), runner_for(&config, args), &store);
            let outcome = pipeline
                .finalize(args.project.as_std_path(), &args.task)
                .with_context(|| format!("finalize of `{}` in {} failed", args.task, args.project))?;

            Ok(json!({
                "status": "finalize_complete",
                "error_count": outcome.error_count,
                "marker": store.path_of(&outcome.ledger).display().to_string(),
            }))
        }
    }
}

fn config_for(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(work_dir) = &cli.work_dir {
        config.work_dir = work_dir.clone().into_std_path_buf();
    }
    if let Some(secs) = cli.timeout {
        config.build_timeout = Duration::from_secs(secs);
    }
    config
}

fn runner_for(config: &Config, args: &BuildArgs) -> Box<dyn BuildRunner> {
    match &args.from_log {
        Some(log) => Box::new(LogFileRunner::new(log.as_std_path())),
        None => Box::new(
            GradleRunner::new()
                .with_timeout(config.build_timeout)
                .with_log_dir(config.log_dir()),
        ),
    }
}

fn failure_status(err: &anyhow::Error) -> Value {
    let message = match err.downcast_ref::<Error>() {
        Some(Error::NoLedger { .. }) => "no snapshot found".to_owned(),
        _ => format!("{err:#}"),
    };
    json!({ "status": "error", "message": message })
}
