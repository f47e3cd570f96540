//! Read-only views of the cached report. None of these take the lock.

use anyhow::Result;
use log::debug;
use serde::Serialize;
use std::path::PathBuf;

use crate::{
    cache::{CacheStore, ExecutionLock, LOCK_FILE, StatusChannel, StatusSnapshot, UPDATES_FILE},
    config::Config,
    package::UpdateReport,
    runtime::Runtime,
};

use super::format_report;

/// Print the number of available updates, or `?` when no check has run
#[tracing::instrument(skip(runtime, cache_dir))]
pub fn count<R: Runtime>(runtime: R, cache_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load(&runtime, cache_dir)?;
    let store = CacheStore::new(&runtime, config.cache_dir);
    match store.load::<UpdateReport>(UPDATES_FILE) {
        Some(report) => println!("{}", report.count),
        None => println!("?"),
    }
    Ok(())
}

/// Print the cached report
#[tracing::instrument(skip(runtime, cache_dir))]
pub fn list<R: Runtime>(runtime: R, cache_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load(&runtime, cache_dir)?;
    let store = CacheStore::new(&runtime, config.cache_dir);
    match store.load::<UpdateReport>(UPDATES_FILE) {
        Some(report) => println!("{}", format_report(&report)),
        None => println!("No update check has run yet. Run `nixup check` first."),
    }
    Ok(())
}

/// Print one line of status-bar JSON
#[tracing::instrument(skip(runtime, cache_dir))]
pub fn status<R: Runtime>(runtime: R, cache_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load(&runtime, cache_dir)?;
    let store = CacheStore::new(&runtime, config.cache_dir.clone());
    let running = ExecutionLock::new(&runtime, store.path(LOCK_FILE)).is_held();
    debug!("Check running: {}", running);

    let progress = if running {
        StatusChannel::new(&store).read()
    } else {
        None
    };
    let report = store.load::<UpdateReport>(UPDATES_FILE);
    let line = StatusLine::new(running, progress.as_ref(), report.as_ref());
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

/// Status-bar payload: `{"text", "tooltip", "class"}`.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub(crate) struct StatusLine {
    pub text: String,
    pub tooltip: String,
    pub class: &'static str,
}

impl StatusLine {
    pub(crate) fn new(
        running: bool,
        progress: Option<&StatusSnapshot>,
        report: Option<&UpdateReport>,
    ) -> Self {
        if running {
            let (text, tooltip) = match progress {
                Some(p) if p.total > 0 => (
                    format!("{}/{}", p.progress, p.total),
                    p.message.clone(),
                ),
                Some(p) => ("...".to_string(), p.message.clone()),
                None => ("...".to_string(), "Checking for updates".to_string()),
            };
            return Self {
                text,
                tooltip,
                class: "checking",
            };
        }

        match report {
            Some(report) if report.count > 0 => Self {
                text: report.count.to_string(),
                tooltip: format_report(report),
                class: "updates",
            },
            Some(report) => Self {
                text: "0".to_string(),
                tooltip: format_report(report),
                class: "up-to-date",
            },
            None => Self {
                text: "?".to_string(),
                tooltip: "No update check has run yet".to_string(),
                class: "unknown",
            },
        }
    }
}
