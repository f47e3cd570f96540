//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over system operations,
//! enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `env` - Environment variables, well-known directories and the clock
//! - `fs` - File system operations (read, write, rename, metadata)
//! - `process` - Process identity and liveness

mod env;
mod fs;
mod process;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Create `path` with `contents` only if it does not exist yet.
    /// Returns `Ok(false)` when the file already exists.
    fn write_new(&self, path: &Path, contents: &[u8]) -> Result<bool>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;

    /// Last modification time of a file.
    fn modified(&self, path: &Path) -> Result<SystemTime>;

    // Clock
    fn now(&self) -> SystemTime;

    // Directories
    fn cache_dir(&self) -> Option<PathBuf>;

    // Processes
    fn process_id(&self) -> u32;

    /// Whether a process with the given id currently exists.
    /// A process owned by another user still counts as alive.
    fn is_process_alive(&self, pid: u32) -> bool;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> Result<bool> {
        self.write_new_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        self.modified_impl(path)
    }

    fn now(&self) -> SystemTime {
        self.now_impl()
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir_impl()
    }

    fn process_id(&self) -> u32 {
        self.process_id_impl()
    }

    fn is_process_alive(&self, pid: u32) -> bool {
        self.is_process_alive_impl(pid)
    }
}
