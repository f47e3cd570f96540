use anyhow::Result;
use std::path::PathBuf;

use crate::{application::InstalledScanner, config::Config, runtime::Runtime};

use super::nix_cli;

/// Print the installed package list, one `name version` per line
#[tracing::instrument(skip(runtime, cache_dir))]
pub async fn installed<R: Runtime>(
    runtime: R,
    cache_dir: Option<PathBuf>,
    rescan: bool,
) -> Result<()> {
    let config = Config::load(&runtime, cache_dir)?;
    let source = nix_cli(&config);
    let packages = InstalledScanner::new(&runtime, &source, &config)
        .get_installed(rescan)
        .await;

    if packages.is_empty() {
        println!("No installed packages found.");
        return Ok(());
    }
    for pkg in packages {
        println!("{} {}", pkg.name, pkg.version);
    }
    Ok(())
}
