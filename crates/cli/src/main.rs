//! The deputy command-line entry point.
//!
//! Commands:
//! - `run`     Run a task through the main agent
//! - `check`   Run the type-check, test and lint feedback checks
//! - `roles`   Show each agent role's tools and iteration cap

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod render;

#[derive(Parser)]
#[command(
    name = "deputy",
    about = "deputy: multi-agent coding orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task with the main agent
    Run {
        /// The task, in plain language
        task: String,

        /// Run the feedback checks after the agent finishes
        #[arg(long)]
        verify: bool,
    },

    /// Run the feedback checks only (exit code 1 when any check fails)
    Check,

    /// Show the role capability table
    Roles,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Run { task, verify } => commands::run::run(&task, dir, verify).await,
        Commands::Check => commands::check::run(dir).await,
        Commands::Roles => {
            commands::roles::run();
            Ok(ExitCode::SUCCESS)
        }
    }
}
