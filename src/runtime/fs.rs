//! File system operations (read, write, rename, metadata).

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).context("Failed to write to file")?;
        Ok(())
    }

    /// The file is fully written under a temporary name and then hard-linked
    /// into place, so other processes never observe it empty.
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_new_impl(&self, path: &Path, contents: &[u8]) -> Result<bool> {
        let file_name = path
            .file_name()
            .context("Path has no file name")?
            .to_string_lossy();
        let tmp = path.with_file_name(format!(".{}.{}.new", file_name, std::process::id()));
        fs::write(&tmp, contents).context("Failed to write to file")?;

        let linked = match fs::hard_link(&tmp, path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).context("Failed to create file"),
        };
        let _ = fs::remove_file(&tmp);
        linked
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn rename_impl(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).context("Failed to rename file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).context("Failed to remove file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn modified_impl(&self, path: &Path) -> Result<SystemTime> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .context("Failed to read file modification time")
    }
}
