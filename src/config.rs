//! Runtime configuration.
//!
//! All tunables are resolved once at startup into an immutable [`Config`]
//! which is then passed by reference to every component.

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::runtime::Runtime;

pub const ENV_CACHE_DIR: &str = "NIXUP_CACHE_DIR";
pub const ENV_CACHE_MAX_AGE: &str = "NIXUP_CACHE_MAX_AGE";
pub const ENV_NIXPKGS_REF: &str = "NIXUP_NIXPKGS_REF";
pub const ENV_SYSTEM_ROOT: &str = "NIXUP_SYSTEM_ROOT";
pub const ENV_MIN_NAME_LEN: &str = "NIXUP_MIN_NAME_LEN";
pub const ENV_EXCLUDE: &str = "NIXUP_EXCLUDE";
pub const ENV_STRIP_SUFFIXES: &str = "NIXUP_STRIP_SUFFIXES";
pub const ENV_VARIANT_PREFIXES: &str = "NIXUP_VARIANT_PREFIXES";
pub const ENV_COMMAND_TIMEOUT: &str = "NIXUP_COMMAND_TIMEOUT";
pub const ENV_NIX: &str = "NIXUP_NIX";
pub const ENV_NIX_STORE: &str = "NIXUP_NIX_STORE";
pub const ENV_PROGRESS_INTERVAL: &str = "NIXUP_PROGRESS_INTERVAL";

const DEFAULT_MAX_AGE_SECS: u64 = 3600;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MIN_NAME_LEN: usize = 2;
const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// Toolchain and build-support packages that never make useful update reports.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "gcc*",
    "clang*",
    "llvm*",
    "binutils*",
    "ld-wrapper*",
    "*-wrapper",
    "patchelf*",
    "patch",
    "gnumake",
    "gnum4",
    "autoconf*",
    "automake*",
    "libtool",
    "pkg-config*",
    "stdenv*",
    "bootstrap-*",
    "*-hook",
    "*-dev",
    "*-doc",
    "*-man",
    "*-info",
    "*-debug",
    "*-headers",
];

/// Nix output names that end up glued to the version in store path names.
pub const DEFAULT_STRIP_SUFFIXES: &[&str] = &[
    "bin", "lib", "dev", "doc", "devdoc", "man", "info", "debug", "out", "static", "dist", "data",
    "modules", "terminfo",
];

/// Namespace templates checked for pinned major-version variants.
/// `{major}` is replaced by the installed major version.
pub const DEFAULT_VARIANT_PREFIXES: &[&str] = &[
    "qt{major}",
    "python{major}Packages",
    "lua{major}Packages",
    "php{major}Packages",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub max_age: Duration,
    pub nixpkgs_ref: String,
    pub system_root: PathBuf,
    pub min_name_len: usize,
    pub exclude_patterns: Vec<String>,
    pub strip_suffixes: Vec<String>,
    pub variant_prefixes: Vec<String>,
    pub command_timeout: Duration,
    pub nix_bin: String,
    pub nix_store_bin: String,
    pub progress_interval: usize,
}

impl Config {
    /// Resolve configuration from the environment.
    ///
    /// `cache_dir` takes precedence over `NIXUP_CACHE_DIR` and the platform
    /// cache directory.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(path) => path,
            None => match non_empty(runtime, ENV_CACHE_DIR) {
                Some(path) => PathBuf::from(path),
                None => runtime
                    .cache_dir()
                    .context("Could not find cache directory")?
                    .join("nixup"),
            },
        };
        debug!("Using cache directory: {:?}", cache_dir);

        let progress_interval: usize =
            parse_var(runtime, ENV_PROGRESS_INTERVAL)?.unwrap_or(DEFAULT_PROGRESS_INTERVAL);

        Ok(Self {
            cache_dir,
            max_age: Duration::from_secs(
                parse_var(runtime, ENV_CACHE_MAX_AGE)?.unwrap_or(DEFAULT_MAX_AGE_SECS),
            ),
            nixpkgs_ref: non_empty(runtime, ENV_NIXPKGS_REF).unwrap_or_else(|| "nixpkgs".into()),
            system_root: non_empty(runtime, ENV_SYSTEM_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/run/current-system")),
            min_name_len: parse_var(runtime, ENV_MIN_NAME_LEN)?.unwrap_or(DEFAULT_MIN_NAME_LEN),
            exclude_patterns: list_var(runtime, ENV_EXCLUDE, DEFAULT_EXCLUDE_PATTERNS),
            strip_suffixes: list_var(runtime, ENV_STRIP_SUFFIXES, DEFAULT_STRIP_SUFFIXES),
            variant_prefixes: list_var(runtime, ENV_VARIANT_PREFIXES, DEFAULT_VARIANT_PREFIXES),
            command_timeout: Duration::from_secs(
                parse_var(runtime, ENV_COMMAND_TIMEOUT)?.unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
            ),
            nix_bin: non_empty(runtime, ENV_NIX).unwrap_or_else(|| "nix".into()),
            nix_store_bin: non_empty(runtime, ENV_NIX_STORE).unwrap_or_else(|| "nix-store".into()),
            progress_interval: progress_interval.max(1),
        })
    }

    /// Defaults rooted at `cache_dir`, ignoring the environment.
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            nixpkgs_ref: "nixpkgs".into(),
            system_root: PathBuf::from("/run/current-system"),
            min_name_len: DEFAULT_MIN_NAME_LEN,
            exclude_patterns: to_strings(DEFAULT_EXCLUDE_PATTERNS),
            strip_suffixes: to_strings(DEFAULT_STRIP_SUFFIXES),
            variant_prefixes: to_strings(DEFAULT_VARIANT_PREFIXES),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            nix_bin: "nix".into(),
            nix_store_bin: "nix-store".into(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

fn non_empty<R: Runtime>(runtime: &R, key: &str) -> Option<String> {
    runtime
        .env_var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<R: Runtime, T>(runtime: &R, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty(runtime, key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}

/// Lists are separated by whitespace or commas, matching how they are
/// usually written in shell profiles.
fn list_var<R: Runtime>(runtime: &R, key: &str, defaults: &[&str]) -> Vec<String> {
    match non_empty(runtime, key) {
        Some(raw) => raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => to_strings(defaults),
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
