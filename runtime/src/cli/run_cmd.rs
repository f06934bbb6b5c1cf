//! One pipeline run from the command line.

use crate::config::Config;
use crate::pipeline::{Pipeline, RunOptions};
use anyhow::Result;

/// Run once and print the report. The browser is shut down afterwards
/// whether or not the run succeeded.
pub async fn run(config: Config, dry_run: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline.run(RunOptions { dry_run }).await;
    pipeline.sessions().dispose().await;

    let report = result?;
    super::print_json(&report)
}
