use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::{
    application::{CheckOptions, CheckOutcome, UpdateOrchestrator},
    config::Config,
    runtime::Runtime,
};

use super::{BusyError, format_report, nix_cli};

/// Run an update check and print the report
#[tracing::instrument(skip(runtime, cache_dir))]
pub async fn check<R: Runtime>(
    runtime: R,
    cache_dir: Option<PathBuf>,
    options: CheckOptions,
    json: bool,
) -> Result<()> {
    let config = Config::load(&runtime, cache_dir)?;
    let source = nix_cli(&config);
    let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);

    let report = match orchestrator.check_updates(options).await? {
        CheckOutcome::Busy { holder } => return Err(BusyError { holder }.into()),
        CheckOutcome::Cached(report) => {
            debug!("Report served from cache");
            report
        }
        CheckOutcome::Completed(report) => report,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_report(&report));
    }
    Ok(())
}
