//! `deputy run`: Run one task through the main agent.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use deputy_agent::Orchestrator;
use deputy_config::AppConfig;
use deputy_core::event::Termination;
use tracing::warn;

use crate::commands::check;
use crate::render;

pub async fn run(task: &str, dir: PathBuf, verify: bool) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load().context("Failed to load config")?;

    // Check for an API key early to give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured for '{}'!", config.default_provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DEPUTY_API_KEY      (any provider)");
        eprintln!("    ANTHROPIC_API_KEY   (anthropic)");
        eprintln!("    OPENAI_API_KEY      (openai-compatible)");
        eprintln!("    GEMINI_API_KEY      (gemini)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    }

    let orchestrator = Orchestrator::from_config(&config, dir.clone());
    let renderer = render::spawn(orchestrator.events());

    let stop = orchestrator.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Stopping after the current step...");
            stop.request();
        }
    });

    let outcome = orchestrator.run(task).await;
    renderer.abort();
    let outcome = outcome.context("Main agent failed")?;

    match outcome.termination {
        Termination::Converged => {}
        Termination::Exhausted => {
            warn!(iterations = outcome.iterations, "Main agent hit its iteration ceiling");
        }
        Termination::Interrupted => eprintln!("  Interrupted."),
    }
    println!("{}", outcome.text);

    if verify {
        let results = check::verify(&config, dir).await;
        return Ok(check::exit_code(&results));
    }

    Ok(if outcome.converged() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
