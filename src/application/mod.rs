//! Application layer - Use cases that coordinate domain services.
//!
//! Each stage reads through its own cache file in the cache directory and
//! only the orchestrator takes the execution lock.

mod check;
mod index;
mod scan;

pub use check::{CheckOptions, CheckOutcome, UpdateOrchestrator};
pub use index::{RepositoryIndexer, flatten_index};
pub use scan::{InstalledScanner, build_installed};
