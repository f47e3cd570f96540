//! Installed scan - parsed, filtered and deduplicated system closure.

use log::{debug, info, warn};

use crate::cache::{CacheStore, INSTALLED_FILE, StatusChannel};
use crate::config::Config;
use crate::package::{ExclusionFilter, InstalledPackage, StorePathParser};
use crate::runtime::Runtime;
use crate::source::PackageSource;

/// Builds and caches the list of installed packages.
pub struct InstalledScanner<'a, R: Runtime, S: PackageSource> {
    config: &'a Config,
    store: CacheStore<'a, R>,
    source: &'a S,
    progress: bool,
}

impl<'a, R: Runtime, S: PackageSource> InstalledScanner<'a, R, S> {
    pub fn new(runtime: &'a R, source: &'a S, config: &'a Config) -> Self {
        Self {
            config,
            store: CacheStore::new(runtime, config.cache_dir.clone()),
            source,
            progress: false,
        }
    }

    /// Publish progress to the status file. Only for callers holding the
    /// execution lock, which also clear the file afterwards.
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    /// Return the cached installed list while it is fresh, otherwise rescan
    /// the system closure.
    ///
    /// A failed scan yields an empty list, which is not cached.
    #[tracing::instrument(skip(self))]
    pub async fn get_installed(&self, force_rescan: bool) -> Vec<InstalledPackage> {
        if let Some(installed) = self.store.load_fresh::<Vec<InstalledPackage>>(
            INSTALLED_FILE,
            self.config.max_age,
            force_rescan,
        ) {
            debug!("Using cached installed list ({} packages)", installed.len());
            return installed;
        }

        if self.progress {
            StatusChannel::new(&self.store).report(
                "scanning",
                "Scanning installed packages",
                0,
                0,
            );
        }

        let root = &self.config.system_root;
        let paths = match self.source.query_closure(root).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Failed to read closure of {:?}: {:#}", root, e);
                return vec![];
            }
        };

        let parser = StorePathParser::new(self.config.strip_suffixes.clone());
        let filter = ExclusionFilter::new(&self.config.exclude_patterns);
        let installed = build_installed(&paths, &parser, &filter, self.config.min_name_len);
        info!(
            "Found {} installed packages in {} store paths",
            installed.len(),
            paths.len()
        );

        if installed.is_empty() {
            warn!("Closure scan found no packages; not caching");
        } else if let Err(e) = self.store.save(INSTALLED_FILE, &installed) {
            warn!("Failed to cache installed list: {:#}", e);
        }
        installed
    }
}

/// Turn raw store paths into the installed package list.
///
/// Unversioned paths, excluded names and names shorter than `min_name_len`
/// are dropped. The result is sorted by name then version and holds at most
/// one entry per name (the first in that order).
pub fn build_installed(
    paths: &[String],
    parser: &StorePathParser,
    filter: &ExclusionFilter,
    min_name_len: usize,
) -> Vec<InstalledPackage> {
    let mut installed: Vec<InstalledPackage> = paths
        .iter()
        .map(|path| parser.parse(path))
        .filter(|pkg| {
            !pkg.version.is_empty()
                && pkg.name.chars().count() >= min_name_len
                && !filter.is_excluded(&pkg.name)
        })
        .collect();

    installed.sort();
    installed.dedup_by(|later, first| later.name == first.name);
    installed
}
