use std::fmt;

use crate::{config::Config, package::UpdateReport, source::NixCli};

mod check;
mod installed;
mod report;

pub use check::check;
pub use installed::installed;
pub use report::{count, list, status};

/// Another process is already running an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyError {
    pub holder: u32,
}

impl fmt::Display for BusyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "An update check is already running (pid {}). Try again when it has finished.",
            self.holder
        )
    }
}

impl std::error::Error for BusyError {}

fn nix_cli(config: &Config) -> NixCli {
    NixCli::new(
        config.nix_bin.clone(),
        config.nix_store_bin.clone(),
        config.command_timeout,
    )
}

/// Human-readable rendering of a report, one update per line.
pub(crate) fn format_report(report: &UpdateReport) -> String {
    if report.updates.is_empty() {
        return format!("All {} checked packages are up to date.", report.checked);
    }

    let width = report
        .updates
        .iter()
        .map(|u| u.name.len())
        .max()
        .unwrap_or_default();
    let mut out = format!(
        "{} update{} available:\n",
        report.count,
        if report.count == 1 { "" } else { "s" }
    );
    for update in &report.updates {
        out.push_str(&format!(
            "  {:<width$}  {} -> {}\n",
            update.name,
            update.installed,
            update.latest,
            width = width
        ));
    }
    out.truncate(out.trim_end().len());
    out
}
