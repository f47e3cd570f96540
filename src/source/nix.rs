//! Nix command line implementation of [`PackageSource`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{AttrPath, PackageSource, RepositoryEntry};

/// `nix search --json` response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct SearchHit {
        #[serde(default)]
        pub version: String,
    }
}

/// Runs `nix search` and `nix-store` with a hard timeout.
pub struct NixCli {
    nix_bin: String,
    nix_store_bin: String,
    timeout: Duration,
}

impl NixCli {
    pub fn new(
        nix_bin: impl Into<String>,
        nix_store_bin: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            nix_bin: nix_bin.into(),
            nix_store_bin: nix_store_bin.into(),
            timeout,
        }
    }

    /// Run a program to completion and return its stdout.
    ///
    /// The child is killed when the timeout elapses.
    #[tracing::instrument(skip(self, args))]
    async fn run<I, S>(&self, program: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!("{} timed out after {}s", program, self.timeout.as_secs())
            })?
            .with_context(|| format!("Failed to run {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} exited with {}: {}", program, output.status, stderr.trim());
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("{} printed invalid UTF-8", program))
    }
}

#[async_trait]
impl PackageSource for NixCli {
    async fn query_repository(&self, reference: &str) -> Result<Vec<RepositoryEntry>> {
        let stdout = self
            .run(
                &self.nix_bin,
                [
                    "--extra-experimental-features",
                    "nix-command flakes",
                    "search",
                    reference,
                    "^",
                    "--json",
                ],
            )
            .await?;
        parse_search_output(&stdout)
    }

    async fn query_closure(&self, root: &Path) -> Result<Vec<String>> {
        let stdout = self
            .run(&self.nix_store_bin, [OsStr::new("-qR"), root.as_os_str()])
            .await?;
        Ok(parse_closure_output(&stdout))
    }
}

/// Parse `nix search --json` output into repository entries.
///
/// Entries with unusable attribute paths or no version are dropped.
pub fn parse_search_output(json: &str) -> Result<Vec<RepositoryEntry>> {
    if json.trim().is_empty() {
        return Ok(vec![]);
    }
    let hits: HashMap<String, api::SearchHit> =
        serde_json::from_str(json).context("Failed to parse nix search output")?;

    let mut entries = Vec::with_capacity(hits.len());
    for (key, hit) in hits {
        if hit.version.is_empty() {
            continue;
        }
        match key.parse::<AttrPath>() {
            Ok(attr) => entries.push(RepositoryEntry {
                attr,
                version: hit.version,
            }),
            Err(e) => debug!("Skipping search result: {}", e),
        }
    }
    Ok(entries)
}

/// One store path per non-empty line.
pub fn parse_closure_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
