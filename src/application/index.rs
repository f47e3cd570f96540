//! Repository index - flattened `name -> latest version` map of nixpkgs.

use log::{debug, info, warn};
use std::collections::HashMap;

use crate::cache::{CacheStore, INDEX_FILE, StatusChannel};
use crate::config::Config;
use crate::package::RepositoryIndex;
use crate::runtime::Runtime;
use crate::source::{PackageSource, RepositoryEntry};

/// Builds and caches the repository index.
pub struct RepositoryIndexer<'a, R: Runtime, S: PackageSource> {
    config: &'a Config,
    store: CacheStore<'a, R>,
    source: &'a S,
    progress: bool,
}

impl<'a, R: Runtime, S: PackageSource> RepositoryIndexer<'a, R, S> {
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

    /// Return the cached index while it is fresh, otherwise query the
    /// repository and rebuild it.
    ///
    /// A failed query yields an empty index, which is not cached.
    #[tracing::instrument(skip(self))]
    pub async fn get_index(&self, force_refresh: bool) -> RepositoryIndex {
        if let Some(index) =
            self.store
                .load_fresh::<RepositoryIndex>(INDEX_FILE, self.config.max_age, force_refresh)
        {
            debug!("Using cached repository index ({} entries)", index.len());
            return index;
        }

        if self.progress {
            StatusChannel::new(&self.store).report(
                "fetching",
                &format!("Fetching package index from {}", self.config.nixpkgs_ref),
                0,
                0,
            );
        }

        let entries = match self.source.query_repository(&self.config.nixpkgs_ref).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to query {}: {:#}", self.config.nixpkgs_ref, e);
                return RepositoryIndex::new();
            }
        };

        let index = flatten_index(entries);
        info!("Indexed {} packages from {}", index.len(), self.config.nixpkgs_ref);

        if index.is_empty() {
            warn!("Repository query returned no packages; not caching");
        } else if let Err(e) = self.store.save(INDEX_FILE, &index) {
            warn!("Failed to cache repository index: {:#}", e);
        }
        index
    }
}

/// Collapse attribute paths into flat package names.
///
/// A leaf name reachable at several depths resolves to the shallowest entry
/// (ties broken by attribute path so the result never depends on input
/// order). Nested entries are additionally kept under their full dotted
/// path so namespaced variants such as `qt5.qtbase` stay addressable.
pub fn flatten_index(entries: Vec<RepositoryEntry>) -> RepositoryIndex {
    // leaf -> (depth, attr path, version)
    let mut best: HashMap<String, (usize, String, String)> = HashMap::new();
    let mut index = RepositoryIndex::with_capacity(entries.len());

    for entry in entries {
        let qualified = entry.attr.to_string();
        if entry.attr.is_nested() {
            index.insert(qualified.clone(), entry.version.clone());
        }

        let candidate = (entry.attr.depth(), qualified, entry.version);
        match best.get(entry.attr.leaf()) {
            Some(current) if (current.0, &current.1) <= (candidate.0, &candidate.1) => {}
            _ => {
                best.insert(entry.attr.leaf().to_string(), candidate);
            }
        }
    }

    for (leaf, (_, _, version)) in best {
        index.insert(leaf, version);
    }
    index
}
