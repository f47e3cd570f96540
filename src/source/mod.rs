//! Source abstraction for the package repository and the installed system.
//!
//! The update check needs exactly two things from the outside world: every
//! package the repository knows about, and every store path in the running
//! system's closure. Both are behind [`PackageSource`] so the pipeline can be
//! exercised without a Nix installation.

mod nix;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use nix::{NixCli, parse_closure_output, parse_search_output};

/// Attribute path of a package inside the package set,
/// e.g. `python312Packages.requests`.
///
/// Flake output prefixes (`legacyPackages.<system>.`, `packages.<system>.`)
/// are not part of the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    /// Last segment, the name a package is usually known by.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Number of namespaces above the leaf; top-level packages have depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    pub fn is_nested(&self) -> bool {
        self.depth() > 0
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for AttrPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments: Vec<&str> = s.split('.').collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            anyhow::bail!("Invalid attribute path: {:?}", s);
        }
        if matches!(segments.first(), Some(&"legacyPackages") | Some(&"packages")) {
            if segments.len() < 3 {
                anyhow::bail!("Attribute path has no package below the system: {:?}", s);
            }
            segments.drain(..2);
        }
        Ok(AttrPath {
            segments: segments.into_iter().map(String::from).collect(),
        })
    }
}

/// One package as reported by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry {
    pub attr: AttrPath,
    pub version: String,
}

/// Access to the package repository and the installed system closure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Every package in the repository identified by `reference`.
    async fn query_repository(&self, reference: &str) -> Result<Vec<RepositoryEntry>>;

    /// Every store path transitively required by `root`.
    async fn query_closure(&self, root: &Path) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_path_parse() {
        let attr: AttrPath = "python312Packages.requests".parse().unwrap();
        assert_eq!(attr.leaf(), "requests");
        assert_eq!(attr.depth(), 1);
        assert!(attr.is_nested());
        assert_eq!(attr.to_string(), "python312Packages.requests");
    }

    #[test]
    fn test_attr_path_strips_flake_prefix() {
        let attr: AttrPath = "legacyPackages.x86_64-linux.curl".parse().unwrap();
        assert_eq!(attr.leaf(), "curl");
        assert_eq!(attr.depth(), 0);
        assert_eq!(attr.to_string(), "curl");

        let attr: AttrPath = "packages.aarch64-linux.qt5.qtbase".parse().unwrap();
        assert_eq!(attr.to_string(), "qt5.qtbase");
        assert_eq!(attr.depth(), 1);
    }

    #[test]
    fn test_attr_path_invalid() {
        assert!("".parse::<AttrPath>().is_err());
        assert!("foo..bar".parse::<AttrPath>().is_err());
        assert!("legacyPackages.x86_64-linux".parse::<AttrPath>().is_err());
    }
}
