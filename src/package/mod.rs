//! Package model and the pure heuristics applied to it.
//!
//! Nothing in this module touches the filesystem or spawns processes:
//! - `store_path` - store path basename to (name, version)
//! - `exclusion` - glob based noise filter
//! - `version` - version ordering with date/hash guards
//! - `variant` - major-version variant false positive detection

mod exclusion;
mod model;
mod store_path;
mod variant;
mod version;

pub use exclusion::ExclusionFilter;
pub use model::{InstalledPackage, RepositoryIndex, UpdateRecord, UpdateReport};
pub use store_path::{HASH_PREFIX_LEN, StorePathParser};
pub use variant::VariantReconciler;
pub use version::VersionComparator;
