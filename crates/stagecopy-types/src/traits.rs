//! Trait definitions for stagecopy components

use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// Filesystem operations a worker performs for one task.
///
/// Implementations must be safe to share between every worker of a pool.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Create `dir` and its parents if it does not exist.
    ///
    /// Returns `true` when the directory was created by this call.
    async fn ensure_directory(&self, dir: &Path) -> Result<bool>;

    /// Copy `source` to `destination`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64>;
}
