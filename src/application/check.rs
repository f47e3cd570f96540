//! Update check - joins the installed list against the repository index.

use anyhow::Result;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use super::{InstalledScanner, RepositoryIndexer};
use crate::cache::{
    Acquire, CacheStore, ExecutionLock, LOCK_FILE, STATUS_FILE, StatusChannel, UPDATES_FILE,
};
use crate::cleanup::{self, SharedCleanupContext};
use crate::config::Config;
use crate::package::{
    InstalledPackage, RepositoryIndex, UpdateRecord, UpdateReport, VariantReconciler,
    VersionComparator,
};
use crate::runtime::Runtime;
use crate::source::PackageSource;

/// Cache bypass flags for one check.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Rescan the installed closure
    pub rescan: bool,
    /// Recompute the report even if a fresh one is cached
    pub recheck: bool,
    /// Re-query the repository index
    pub fetch: bool,
}

/// Result of [`UpdateOrchestrator::check_updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A new report was computed
    Completed(UpdateReport),
    /// The cached report was still valid and returned unchanged
    Cached(UpdateReport),
    /// Another live process is running a check
    Busy { holder: u32 },
}

impl CheckOutcome {
    pub fn report(&self) -> Option<&UpdateReport> {
        match self {
            CheckOutcome::Completed(report) | CheckOutcome::Cached(report) => Some(report),
            CheckOutcome::Busy { .. } => None,
        }
    }
}

/// Runs a complete update check under the execution lock.
pub struct UpdateOrchestrator<'a, R: Runtime, S: PackageSource> {
    runtime: &'a R,
    source: &'a S,
    config: &'a Config,
    store: CacheStore<'a, R>,
}

impl<'a, R: Runtime, S: PackageSource> UpdateOrchestrator<'a, R, S> {
    pub fn new(runtime: &'a R, source: &'a S, config: &'a Config) -> Self {
        Self {
            runtime,
            source,
            config,
            store: CacheStore::new(runtime, config.cache_dir.clone()),
        }
    }

    /// Run a check, or report `Busy` without touching any file when another
    /// process holds the lock.
    #[tracing::instrument(skip(self))]
    pub async fn check_updates(&self, options: CheckOptions) -> Result<CheckOutcome> {
        let lock = ExecutionLock::new(self.runtime, self.store.path(LOCK_FILE));
        let guard = match lock.acquire()? {
            Acquire::Acquired(guard) => guard,
            Acquire::Busy { holder } => {
                info!("Update check already running (pid {})", holder);
                return Ok(CheckOutcome::Busy { holder });
            }
        };

        // Only registered once the lock is ours, so an interrupt never
        // removes another process's lock.
        let cleanup_ctx = cleanup::new_shared();
        register(&cleanup_ctx, &[
            guard.path().to_path_buf(),
            self.store.path(STATUS_FILE),
        ]);
        let interrupt_handler = cleanup::spawn_interrupt_handler(Arc::clone(&cleanup_ctx));

        let outcome = self.run_locked(options).await;

        interrupt_handler.abort();
        StatusChannel::new(&self.store).clear();
        guard.release();
        Ok(outcome)
    }

    async fn run_locked(&self, options: CheckOptions) -> CheckOutcome {
        let index = RepositoryIndexer::new(self.runtime, self.source, self.config)
            .with_progress()
            .get_index(options.fetch)
            .await;
        let installed = InstalledScanner::new(self.runtime, self.source, self.config)
            .with_progress()
            .get_installed(options.rescan)
            .await;

        if let Some(cached) = self.store.load_fresh::<UpdateReport>(
            UPDATES_FILE,
            self.config.max_age,
            options.recheck,
        ) {
            if cached.total == installed.len() {
                debug!("Using cached update report ({} updates)", cached.count);
                return CheckOutcome::Cached(cached);
            }
            debug!(
                "Cached report covers {} packages, {} installed; recomputing",
                cached.total,
                installed.len()
            );
        }

        let report = self.compute_report(&index, &installed);
        info!(
            "{} updates available ({} of {} packages checked)",
            report.count, report.checked, report.total
        );

        if index.is_empty() || installed.is_empty() {
            warn!("Incomplete data; keeping the previous update report");
        } else if let Err(e) = self.store.save(UPDATES_FILE, &report) {
            warn!("Failed to cache update report: {:#}", e);
        }
        CheckOutcome::Completed(report)
    }

    fn compute_report(
        &self,
        index: &RepositoryIndex,
        installed: &[InstalledPackage],
    ) -> UpdateReport {
        let status = StatusChannel::new(&self.store);
        let reconciler = VariantReconciler::new(self.config.variant_prefixes.clone());
        let interval = self.config.progress_interval.max(1);
        let total = installed.len();

        let mut seen = HashSet::with_capacity(total);
        let mut updates = Vec::new();
        let mut checked = 0;

        for (i, pkg) in installed.iter().enumerate() {
            if i % interval == 0 {
                status.report(
                    "checking",
                    &format!("Checking {} of {} packages", i, total),
                    i,
                    total,
                );
            }
            if !seen.insert(pkg.name.as_str()) {
                continue;
            }
            let Some(latest) = index.get(&pkg.name) else {
                continue;
            };
            checked += 1;

            if !VersionComparator::is_older(&pkg.version, latest) {
                continue;
            }
            if reconciler.is_variant(index, &pkg.name, &pkg.version, latest) {
                debug!(
                    "{} {} is a pinned variant, not an update to {}",
                    pkg.name, pkg.version, latest
                );
                continue;
            }
            updates.push(UpdateRecord {
                name: pkg.name.clone(),
                installed: pkg.version.clone(),
                latest: latest.clone(),
            });
        }

        let timestamp = self
            .runtime
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        UpdateReport::new(updates, checked, total, timestamp)
    }

    /// Last persisted report, regardless of age.
    pub fn cached_report(&self) -> Option<UpdateReport> {
        self.store.load(UPDATES_FILE)
    }
}

fn register(ctx: &SharedCleanupContext, paths: &[std::path::PathBuf]) {
    if let Ok(mut ctx) = ctx.lock() {
        for path in paths {
            ctx.add(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::INDEX_FILE;
    use crate::runtime::RealRuntime;
    use crate::source::{MockPackageSource, RepositoryEntry};
    use tempfile::tempdir;

    const HASH: &str = "/nix/store/0123456789abcdfghijklmnpqrsvwxyz-";

    fn entries(items: &[(&str, &str)]) -> Vec<RepositoryEntry> {
        items
            .iter()
            .map(|(attr, version)| RepositoryEntry {
                attr: attr.parse().unwrap(),
                version: version.to_string(),
            })
            .collect()
    }

    fn closure(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("{}{}", HASH, n)).collect()
    }

    fn source(repo: &'static [(&str, &str)], installed: &'static [&str]) -> MockPackageSource {
        let mut source = MockPackageSource::new();
        source
            .expect_query_repository()
            .returning(move |_| Ok(entries(repo)));
        source
            .expect_query_closure()
            .returning(move |_| Ok(closure(installed)));
        source
    }

    fn completed(outcome: CheckOutcome) -> UpdateReport {
        match outcome {
            CheckOutcome::Completed(report) => report,
            other => panic!("expected a computed report, got {:?}", other),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_check_reports_outdated_packages() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = source(
            &[("curl", "8.17.0"), ("systemd", "258.2")],
            &["curl-8.16.0", "systemd-258.1"],
        );

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());

        assert_eq!(report.count, 2);
        assert_eq!(report.checked, 2);
        assert_eq!(report.total, 2);
        assert_eq!(
            report.updates,
            vec![
                UpdateRecord {
                    name: "curl".into(),
                    installed: "8.16.0".into(),
                    latest: "8.17.0".into(),
                },
                UpdateRecord {
                    name: "systemd".into(),
                    installed: "258.1".into(),
                    latest: "258.2".into(),
                },
            ]
        );
        assert!(report.timestamp > 0);

        // Persisted, and the transient files are gone
        assert_eq!(orchestrator.cached_report(), Some(report));
        assert!(!dir.path().join(STATUS_FILE).exists());
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_untracked_packages_are_not_checked() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = source(
            &[("curl", "8.17.0"), ("jq", "1.7.1")],
            &["curl-8.17.0", "my-local-tool-0.1"],
        );

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.count, 0);
        assert_eq!(report.checked, 1);
        assert_eq!(report.total, 2);
    }

    #[tokio::test]
    async fn test_check_skips_pinned_variant() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = source(
            &[("tesseract", "5.0.0"), ("tesseract4", "4.2.0")],
            &["tesseract-4.2.0"],
        );

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.count, 0);
        assert_eq!(report.checked, 1);
    }

    #[tokio::test]
    async fn test_check_reports_variant_without_exact_match() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = source(
            &[("tesseract", "5.0.0"), ("tesseract4", "4.3.0")],
            &["tesseract-4.2.0"],
        );

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.count, 1);
        assert_eq!(report.updates[0].latest, "5.0.0");
    }

    #[tokio::test]
    async fn test_check_uses_shallowest_repository_entry() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = source(
            &[("python312Packages.requests", "2.32.3"), ("requests", "2.31.0")],
            &["requests-2.31.0"],
        );

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.count, 0);
    }

    #[tokio::test]
    async fn test_fresh_cached_report_is_returned_verbatim() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = source(&[("curl", "8.17.0")], &["curl-8.16.0"]);
        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);

        completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());

        // Hand-edited report proves nothing was recomputed
        let doctored = UpdateReport::new(
            vec![UpdateRecord {
                name: "curl".into(),
                installed: "8.16.0".into(),
                latest: "99.0".into(),
            }],
            1,
            1,
            42,
        );
        std::fs::write(
            dir.path().join(UPDATES_FILE),
            serde_json::to_string(&doctored).unwrap(),
        )
        .unwrap();

        let outcome = orchestrator.check_updates(CheckOptions::default()).await.unwrap();
        assert_eq!(outcome, CheckOutcome::Cached(doctored));

        let recheck = CheckOptions {
            recheck: true,
            ..Default::default()
        };
        let report = completed(orchestrator.check_updates(recheck).await.unwrap());
        assert_eq!(report.updates[0].latest, "8.17.0");
    }

    #[tokio::test]
    async fn test_cached_report_with_wrong_total_is_recomputed() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let stale = UpdateReport::new(vec![], 5, 5, 42);
        std::fs::write(
            dir.path().join(UPDATES_FILE),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let source = source(&[("curl", "8.17.0")], &["curl-8.16.0"]);
        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.total, 1);
        assert_eq!(report.count, 1);
    }

    #[tokio::test]
    async fn test_busy_when_live_process_holds_lock() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());

        // A live process other than ours
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), child.id().to_string()).unwrap();

        let mut source = MockPackageSource::new();
        source.expect_query_repository().never();
        source.expect_query_closure().never();

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let outcome = orchestrator.check_updates(CheckOptions::default()).await.unwrap();
        let holder = child.id();
        child.kill().unwrap();
        child.wait().unwrap();

        assert_eq!(outcome, CheckOutcome::Busy { holder });
        assert!(outcome.report().is_none());
        assert!(!dir.path().join(UPDATES_FILE).exists());
        assert!(!dir.path().join(STATUS_FILE).exists());
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_recovered() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), dead_pid.to_string()).unwrap();

        let source = source(&[("curl", "8.17.0")], &["curl-8.16.0"]);
        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.count, 1);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_report() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let previous = UpdateReport::new(vec![], 1, 7, 42);
        std::fs::write(
            dir.path().join(UPDATES_FILE),
            serde_json::to_string(&previous).unwrap(),
        )
        .unwrap();

        let mut source = MockPackageSource::new();
        source
            .expect_query_repository()
            .returning(|_| Err(anyhow::anyhow!("timed out after 300s")));
        source
            .expect_query_closure()
            .returning(|_| Ok(closure(&["curl-8.16.0"])));

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let report = completed(orchestrator.check_updates(CheckOptions::default()).await.unwrap());
        assert_eq!(report.count, 0);
        assert_eq!(report.checked, 0);
        assert_eq!(report.total, 1);

        assert!(!dir.path().join(INDEX_FILE).exists());
        assert_eq!(orchestrator.cached_report(), Some(previous));
    }

    #[tokio::test]
    async fn test_progress_is_reported_while_checking() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let mut config = Config::with_cache_dir(dir.path().to_path_buf());
        config.progress_interval = 1;
        let store = CacheStore::new(&runtime, dir.path().to_path_buf());
        let source = MockPackageSource::new();

        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);
        let index: RepositoryIndex = [("curl".to_string(), "8.17.0".to_string())].into();
        let installed = vec![
            InstalledPackage::new("curl", "8.16.0"),
            InstalledPackage::new("jq", "1.7.1"),
        ];
        orchestrator.compute_report(&index, &installed);

        let status = StatusChannel::new(&store).read().unwrap();
        assert_eq!(status.status, "checking");
        assert_eq!(status.progress, 1);
        assert_eq!(status.total, 2);
    }

    #[tokio::test]
    async fn test_duplicate_names_are_checked_once() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path().to_path_buf());
        let source = MockPackageSource::new();
        let orchestrator = UpdateOrchestrator::new(&runtime, &source, &config);

        let index: RepositoryIndex = [("curl".to_string(), "8.17.0".to_string())].into();
        let installed = vec![
            InstalledPackage::new("curl", "8.15.0"),
            InstalledPackage::new("curl", "8.16.0"),
        ];
        let report = orchestrator.compute_report(&index, &installed);
        assert_eq!(report.count, 1);
        assert_eq!(report.checked, 1);
        assert_eq!(report.updates[0].installed, "8.15.0");
    }
}
