use log::debug;
use serde::{Deserialize, Serialize};

use super::{CacheStore, STATUS_FILE};
use crate::runtime::Runtime;

/// Progress of a running update check, as written to `status.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    /// Phase name: `fetching`, `scanning` or `checking`
    pub status: String,
    pub message: String,
    pub progress: usize,
    pub total: usize,
}

/// Fire-and-forget progress reporting through the shared status file.
///
/// Write failures are logged and otherwise ignored; readers treat a
/// missing or unparseable file as "no data yet".
pub struct StatusChannel<'s, 'a, R: Runtime> {
    store: &'s CacheStore<'a, R>,
}

impl<'s, 'a, R: Runtime> StatusChannel<'s, 'a, R> {
    pub fn new(store: &'s CacheStore<'a, R>) -> Self {
        Self { store }
    }

    pub fn report(&self, status: &str, message: &str, progress: usize, total: usize) {
        let snapshot = StatusSnapshot {
            status: status.to_string(),
            message: message.to_string(),
            progress,
            total,
        };
        if let Err(e) = self.store.save(STATUS_FILE, &snapshot) {
            debug!("Failed to write status: {}", e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(STATUS_FILE) {
            debug!("Failed to clear status: {}", e);
        }
    }

    pub fn read(&self) -> Option<StatusSnapshot> {
        self.store.load(STATUS_FILE)
    }
}
