//! Result type alias for stagecopy operations

use crate::Error;

/// Result type alias for stagecopy operations
pub type Result<T> = std::result::Result<T, Error>;
