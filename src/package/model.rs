use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A package found in the installed system closure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Flattened `name -> latest version` map of the package repository.
pub type RepositoryIndex = HashMap<String, String>;

/// An installed package with a newer version available.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub name: String,
    pub installed: String,
    pub latest: String,
}

/// Outcome of one full update check, as persisted to `updates.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateReport {
    /// Number of available updates
    pub count: usize,
    /// Installed packages that had a repository entry to compare against
    pub checked: usize,
    /// Installed packages considered
    pub total: usize,
    /// Unix seconds when the check finished
    pub timestamp: u64,
    pub updates: Vec<UpdateRecord>,
}

impl UpdateReport {
    pub fn new(updates: Vec<UpdateRecord>, checked: usize, total: usize, timestamp: u64) -> Self {
        Self {
            count: updates.len(),
            checked,
            total,
            timestamp,
            updates,
        }
    }
}
