//! Core type system and error handling for stagecopy
//!
//! This crate provides the foundational types shared by every stagecopy crate:
//!
//! - **Error handling**: structured error types with kinds and severity levels
//! - **Categories**: the source-tree classification and how each category is enumerated
//! - **Traits**: the async file transfer seam used by workers
//! - **Configuration primitives**: validated worker counts, retry and drain policies
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use stagecopy_types::{Category, Error, Result, WorkerCount};
//!
//! fn pick_workers(requested: usize) -> Result<WorkerCount> {
//!     WorkerCount::new(requested).map_err(Error::config)
//! }
//!
//! assert_eq!(Category::NcBranch.source_dir_name(), "NC Branches");
//! assert!(pick_workers(0).is_err());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{DrainPolicy, RetryPolicy, RunMode, WorkerCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::FileTransfer;
pub use types::{Category, EnumerationScope, TransferOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let io_error = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "test"));
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let config_error = Error::config("invalid config");
        assert_eq!(config_error.severity(), ErrorSeverity::High);
        assert!(!config_error.is_recoverable());
    }

    #[test]
    fn test_worker_count_validation() {
        assert!(WorkerCount::new(1).is_ok());
        assert!(WorkerCount::new(16).is_ok());
        assert!(WorkerCount::new(0).is_err());
        assert!(WorkerCount::new(WorkerCount::MAX + 1).is_err());
    }

    #[test]
    fn test_every_category_has_a_distinct_source_dir() {
        let mut names: Vec<_> = Category::ALL.iter().map(|c| c.source_dir_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Category::ALL.len());
    }
}
