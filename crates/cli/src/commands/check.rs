//! `deputy check`: Run the feedback checks and print the summary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use deputy_config::AppConfig;
use deputy_feedback::{FeedbackAggregator, FeedbackLoopResults};

pub async fn run(dir: PathBuf) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load().context("Failed to load config")?;
    let results = verify(&config, dir).await;
    Ok(exit_code(&results))
}

/// Run every enabled check in `dir` and print the report.
pub async fn verify(config: &AppConfig, dir: PathBuf) -> FeedbackLoopResults {
    eprintln!("  Running feedback checks...");
    let results = FeedbackAggregator::new(config.feedback.clone(), dir)
        .run_all()
        .await;
    println!("{}", results.report());
    results
}

pub fn exit_code(results: &FeedbackLoopResults) -> ExitCode {
    if results.all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
