//! Validated configuration primitives
//!
//! These are the small value types the config crate deserializes into and the
//! engine consumes. Constructors validate; `Default` picks the production values.

use std::fmt;

/// Number of concurrent transfer workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// Minimum worker count
    pub const MIN: usize = 1;
    /// Maximum worker count
    pub const MAX: usize = 256;

    /// Create a new worker count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Worker count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Worker count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the worker count value
    pub fn get(self) -> usize {
        self.0
    }

    /// One worker per available core, capped at [`Self::MAX`]
    pub fn per_core() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self(cpu_count.clamp(Self::MIN, Self::MAX))
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self::per_core()
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bounded retry budget for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Attempts allowed per file unless configured otherwise
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Create a retry policy allowing `max_attempts` tries in total
    pub fn new(max_attempts: u32) -> Result<Self, String> {
        if max_attempts == 0 {
            return Err("Maximum attempts must be at least 1".to_string());
        }
        Ok(Self { max_attempts })
    }

    /// Total attempts allowed per file
    pub fn max_attempts(self) -> u32 {
        self.max_attempts
    }

    /// Whether a task that has failed `failed_attempts` times may be tried again
    pub fn allows_retry(self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Criterion the completion detector uses to declare a batch drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrainPolicy {
    /// Queue empty and no task in flight
    #[default]
    Settled,
    /// Queue empty, ignoring tasks held by workers.
    ///
    /// A failing task that is being copied when the queue empties can be
    /// re-enqueued after the batch was declared drained.
    QueueEmpty,
}

/// Which set of destination roots a run writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunMode {
    /// Test destination roots
    Test,
    /// Production destination roots
    #[default]
    Production,
}

impl RunMode {
    /// Select the mode from a `--test-run` style flag
    pub fn from_test_flag(test_run: bool) -> Self {
        if test_run {
            Self::Test
        } else {
            Self::Production
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Production => write!(f, "production"),
        }
    }
}
