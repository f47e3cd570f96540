use anyhow::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Pid-file lock allowing one update check per cache directory.
///
/// The lock is only valid while the recorded process is alive, so a lock
/// left behind by a killed process is discarded by the next acquirer.
pub struct ExecutionLock<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

/// Result of [`ExecutionLock::acquire`].
pub enum Acquire<'a, R: Runtime> {
    Acquired(LockGuard<'a, R>),
    Busy { holder: u32 },
}

impl<'a, R: Runtime> ExecutionLock<'a, R> {
    pub fn new(runtime: &'a R, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pid recorded in the lock file, if any.
    pub fn holder(&self) -> Option<u32> {
        if !self.runtime.exists(&self.path) {
            return None;
        }
        self.runtime
            .read_to_string(&self.path)
            .ok()
            .and_then(|content| parse_pid(&content))
    }

    /// Whether a live process currently holds the lock. Never modifies state.
    pub fn is_held(&self) -> bool {
        self.holder()
            .is_some_and(|pid| self.runtime.is_process_alive(pid))
    }

    #[tracing::instrument(skip(self))]
    pub fn acquire(&self) -> Result<Acquire<'a, R>> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        let pid = self.runtime.process_id();
        // Retried only after a stale lock has been moved out of the way.
        for _ in 0..3 {
            if self.runtime.write_new(&self.path, pid.to_string().as_bytes())? {
                debug!("Acquired lock {:?} as pid {}", self.path, pid);
                return Ok(Acquire::Acquired(LockGuard {
                    runtime: self.runtime,
                    path: self.path.clone(),
                    pid,
                }));
            }

            let Ok(content) = self.runtime.read_to_string(&self.path) else {
                // Released in between
                continue;
            };
            match parse_pid(&content) {
                Some(holder) if self.runtime.is_process_alive(holder) => {
                    return Ok(Acquire::Busy { holder });
                }
                stale => {
                    info!("Removing stale lock {:?} (holder {:?})", self.path, stale);
                    if let Some(holder) = self.discard_stale(&content, pid)? {
                        return Ok(Acquire::Busy { holder });
                    }
                }
            }
        }

        // Lost the race against other acquirers every time.
        Ok(Acquire::Busy {
            holder: self.holder().unwrap_or_default(),
        })
    }

    /// Move a lock judged stale out of the way.
    ///
    /// The file is renamed aside and only deleted if it still holds `observed`.
    /// If another process replaced it after the liveness check, it is put back
    /// and that holder is returned.
    fn discard_stale(&self, observed: &str, pid: u32) -> Result<Option<u32>> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let aside = self.path.with_file_name(format!(".{}.{}.stale", name, pid));

        if self.runtime.rename(&self.path, &aside).is_err() {
            // Someone else already moved it
            return Ok(None);
        }
        let content = self.runtime.read_to_string(&aside).unwrap_or_default();
        if content == observed {
            self.runtime.remove_file(&aside)?;
            return Ok(None);
        }

        debug!("Lock {:?} was taken over, putting it back", self.path);
        let restored = self.runtime.write_new(&self.path, content.as_bytes())?;
        self.runtime.remove_file(&aside)?;
        let holder = if restored {
            parse_pid(&content)
        } else {
            self.holder()
        };
        Ok(Some(holder.unwrap_or_default()))
    }
}

fn parse_pid(content: &str) -> Option<u32> {
    content.trim().parse().ok()
}

/// Held lock; the lock file is removed when the guard is dropped.
pub struct LockGuard<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    pid: u32,
}

impl<R: Runtime> LockGuard<'_, R> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl<R: Runtime> Drop for LockGuard<'_, R> {
    fn drop(&mut self) {
        let still_ours = self
            .runtime
            .read_to_string(&self.path)
            .ok()
            .and_then(|content| parse_pid(&content))
            == Some(self.pid);
        if still_ours {
            debug!("Releasing lock {:?}", self.path);
            let _ = self.runtime.remove_file(&self.path);
        }
    }
}
