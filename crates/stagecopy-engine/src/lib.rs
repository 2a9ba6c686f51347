//! Concurrent transfer pipeline for stagecopy
//!
//! A batch of [`Task`]s is loaded once into a [`WorkQueue`]. A fixed-size
//! [`WorkerPool`] drains it, retrying failed copies up to the configured
//! attempt budget and moving tasks that keep failing into the
//! [`DeadLetterStore`]. A [`CompletionDetector`] decides when the batch is
//! finished, after which the pool is stopped and a [`RunSummary`] is built
//! from the [`ProgressCounters`] and dead letters.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stagecopy_config::ConfigLoader;
//! use stagecopy_engine::{Catalog, EngineConfig, TransferEngine};
//! use stagecopy_types::RunMode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load_default()?;
//! let catalog = Catalog::new("/staging", "2024-06", RunMode::Test, config.destinations.clone());
//! let plan = catalog.plan().await?;
//!
//! let engine = TransferEngine::new(EngineConfig::from_config(&config)?);
//! let summary = engine.run(plan.tasks).await;
//! println!("Copied {} files", summary.progress.succeeded);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod detector;
pub mod engine;
pub mod pool;
pub mod progress;
pub mod queue;
pub mod summary;
pub mod task;
pub mod transfer;
pub mod worker;

pub use catalog::{BatchPlan, Catalog};
pub use detector::{CompletionDetector, DetectorState, DrainReport, MIN_POLL_INTERVAL};
pub use engine::{EngineBuilder, EngineConfig, TransferEngine};
pub use pool::WorkerPool;
pub use progress::{ProgressCounters, ProgressSnapshot};
pub use queue::{DeadLetter, DeadLetterStore, Lease, SharedQueue, WorkQueue};
pub use summary::RunSummary;
pub use task::{Task, TaskId};
pub use transfer::LocalTransfer;
pub use worker::{Disposition, Worker, WorkerContext, WorkerStats};
