//! On-disk state shared between invocations.
//!
//! Every file lives directly in the cache directory:
//! - `nixpkgs-versions.json` - repository index
//! - `installed.json` - parsed installed closure
//! - `updates.json` - last update report
//! - `status.json` - progress of a running check (transient)
//! - `nixup.lock` - pid of the process running a check

mod lock;
mod status;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::Runtime;

pub use lock::{Acquire, ExecutionLock, LockGuard};
pub use status::{StatusChannel, StatusSnapshot};

pub const INDEX_FILE: &str = "nixpkgs-versions.json";
pub const INSTALLED_FILE: &str = "installed.json";
pub const UPDATES_FILE: &str = "updates.json";
pub const STATUS_FILE: &str = "status.json";
pub const LOCK_FILE: &str = "nixup.lock";

/// Typed JSON files in the cache directory with atomic writes and
/// modification-time based staleness.
pub struct CacheStore<'a, R: Runtime> {
    runtime: &'a R,
    dir: PathBuf,
}

impl<'a, R: Runtime> CacheStore<'a, R> {
    pub fn new(runtime: &'a R, dir: PathBuf) -> Self {
        Self { runtime, dir }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// A cache file is fresh while its age is below `max_age`.
    /// Modification times in the future count as age zero.
    pub fn is_fresh(&self, file: &str, max_age: Duration) -> bool {
        let path = self.path(file);
        if !self.runtime.exists(&path) {
            return false;
        }
        match self.runtime.modified(&path) {
            Ok(mtime) => {
                let age = self
                    .runtime
                    .now()
                    .duration_since(mtime)
                    .unwrap_or_default();
                age < max_age
            }
            Err(e) => {
                debug!("Cannot stat {:?}: {}", path, e);
                false
            }
        }
    }

    /// Load a cache file regardless of its age.
    ///
    /// Missing and unreadable files are cache misses; corrupt JSON is logged
    /// and also treated as a miss.
    pub fn load<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        if !self.runtime.exists(&path) {
            return None;
        }
        let content = match self.runtime.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Cannot read {:?}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring corrupt cache file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Load a cache file unless it is stale or `force` is set.
    pub fn load_fresh<T: DeserializeOwned>(
        &self,
        file: &str,
        max_age: Duration,
        force: bool,
    ) -> Option<T> {
        if force {
            debug!("Cache {} bypassed by force flag", file);
            return None;
        }
        if !self.is_fresh(file, max_age) {
            debug!("Cache {} is missing or stale", file);
            return None;
        }
        self.load(file)
    }

    /// Write a cache file atomically: readers see either the previous or the
    /// new content, never a partial write.
    #[tracing::instrument(skip(self, value))]
    pub fn save<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value)?;
        self.write_atomic(file, content.as_bytes())
    }

    fn write_atomic(&self, file: &str, contents: &[u8]) -> Result<()> {
        if !self.runtime.exists(&self.dir) {
            self.runtime.create_dir_all(&self.dir)?;
        }
        let target = self.path(file);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", file, self.runtime.process_id()));

        self.runtime.write(&tmp, contents)?;
        if let Err(e) = self.runtime.rename(&tmp, &target) {
            let _ = self.runtime.remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to replace {:?}", target));
        }
        Ok(())
    }

    /// Remove a cache file if present.
    pub fn remove(&self, file: &str) -> Result<()> {
        let path = self.path(file);
        if self.runtime.exists(&path) {
            self.runtime.remove_file(&path)?;
        }
        Ok(())
    }
}
