//! stagecopy - bulk copy of classified statement files to destination shares
//!
//! Scans a staging tree, maps every file onto its category's destination root,
//! and copies the batch with a fixed pool of workers, retrying transient
//! failures and reporting files that could not be copied.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use stagecopy_config::{Config, ConfigLoader};
use stagecopy_engine::{Catalog, EngineConfig, TransferEngine};
use stagecopy_types::{RunMode, WorkerCount};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod display;
mod logging;

/// stagecopy - bulk copy of classified statement files
#[derive(Parser, Debug)]
#[command(
    name = "stagecopy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bulk-copy classified files from a staging tree to destination shares",
    long_about = "stagecopy scans the category directories of a staging tree, maps each file\n\
                  onto its destination root, and copies the batch with a pool of workers.\n\
                  Failed copies are retried; files that keep failing are reported at the end."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy every staged file to its destination
    Run {
        #[command(flatten)]
        batch: BatchArgs,
        /// Number of workers (overrides configuration)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Write failed files as JSON lines to this path
        #[arg(long)]
        dead_letter_report: Option<PathBuf>,
    },
    /// Show what a run would copy without copying
    Plan {
        #[command(flatten)]
        batch: BatchArgs,
        /// Number of sample destinations to print
        #[arg(long, default_value = "10")]
        sample: usize,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Staging directory containing the category directories
    #[arg(short, long)]
    source: PathBuf,
    /// Subdirectory created under each destination root
    #[arg(short, long)]
    output: String,
    /// Use the test destination roots
    #[arg(long)]
    test_run: bool,
}

impl BatchArgs {
    fn catalog(&self, config: &Config) -> Catalog {
        Catalog::new(
            &self.source,
            &self.output,
            RunMode::from_test_flag(self.test_run),
            config.destinations.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("failed to load configuration")?,
    };

    let verbosity = logging::Verbosity {
        debug: cli.debug,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let _log_guard = logging::init_logging(verbosity, &config.logging)?;

    info!("stagecopy v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            batch,
            workers,
            dead_letter_report,
        } => run_command(&batch, workers, dead_letter_report, &config, cli.quiet).await,
        Commands::Plan { batch, sample } => plan_command(&batch, sample, &config, cli.quiet).await,
        Commands::Config { default } => config_command(default, &config),
    }
}

async fn run_command(
    batch: &BatchArgs,
    workers: Option<usize>,
    dead_letter_report: Option<PathBuf>,
    config: &Config,
    quiet: bool,
) -> Result<()> {
    let mut engine_config = EngineConfig::from_config(config)?;
    if let Some(workers) = workers {
        engine_config.workers = WorkerCount::new(workers).map_err(anyhow::Error::msg)?;
    }

    info!("Source: {}", batch.source.display());
    info!("Output directory name: {}", batch.output);
    info!("Test run: {}", batch.test_run);

    if !quiet {
        println!(
            "{} Copying {} into '{}' ({} roots)",
            style("→").green().bold(),
            style(batch.source.display()).cyan(),
            style(&batch.output).cyan(),
            RunMode::from_test_flag(batch.test_run)
        );
    }

    let scanning = display::spinner(quiet, "Scanning source directories...");
    let plan = batch.catalog(config).plan().await;
    if let Some(pb) = scanning {
        pb.finish_and_clear();
    }
    let plan = plan?;

    let engine = TransferEngine::new(engine_config);
    let counters = engine.counters();

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing copies in progress");
                cancel.cancel();
            }
        })
    };

    let bar = display::progress_bar(quiet, plan.len() as u64);
    let tracker = bar
        .clone()
        .map(|pb| tokio::spawn(display::track_progress(pb, counters)));

    let summary = engine.run_until(plan.tasks, cancel).await;

    interrupt.abort();
    if let Some(tracker) = tracker {
        tracker.abort();
    }
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }

    if let Some(path) = dead_letter_report {
        let written = summary.write_dead_letter_report(&path)?;
        info!("Wrote {} failed files to {}", written, path.display());
    }

    if !quiet {
        display::print_summary(&summary);
    }

    if !summary.drained {
        anyhow::bail!("run interrupted before all files were processed");
    }
    Ok(())
}

async fn plan_command(batch: &BatchArgs, sample: usize, config: &Config, quiet: bool) -> Result<()> {
    let plan = batch.catalog(config).plan().await?;
    if quiet {
        println!("{}", plan.len());
    } else {
        display::print_plan(&plan, sample);
    }
    Ok(())
}

fn config_command(default: bool, config: &Config) -> Result<()> {
    if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        print!("{}", ConfigLoader::to_yaml(&Config::default())?);
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        match ConfigLoader::config_exists() {
            Some(path) => println!("# loaded from {}", path.display()),
            None => println!("# no configuration file found, using defaults"),
        }
        print!("{}", ConfigLoader::to_yaml(config)?);
    }
    Ok(())
}
