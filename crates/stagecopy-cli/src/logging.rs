//! Console and rolling-file logging setup

use anyhow::{Context, Result};
use stagecopy_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Verbosity flags from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbosity {
    pub debug: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl Verbosity {
    /// Level used when `RUST_LOG` is unset
    pub fn level<'a>(&self, configured: &'a str) -> &'a str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else if self.verbose {
            "info"
        } else {
            configured
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be held
/// until the process exits.
pub fn init_logging(verbosity: Verbosity, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = verbosity.level(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log filter")?;

    let console = if config.json_format {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, guard) = if config.enable_file_logging {
        let dir = config.resolved_log_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::HOURLY)
            .filename_prefix("stagecopy")
            .filename_suffix("log")
            .build(&dir)
            .with_context(|| format!("failed to open log file in {}", dir.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(guard)
}
