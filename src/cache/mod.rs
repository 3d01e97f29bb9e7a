//! Cache plumbing shared by the analyzer and the pipeline

pub mod paths;
pub mod traits;

pub use paths::{get_backup_dir, get_cache_dir};
pub use traits::{CacheCoordinator, CacheLayer};
