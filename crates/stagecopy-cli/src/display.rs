//! Terminal output for the stagecopy CLI

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use stagecopy_engine::{BatchPlan, ProgressCounters, RunSummary};
use std::sync::Arc;
use std::time::Duration;

/// Spinner shown while the source tree is scanned
pub fn spinner(quiet: bool, message: &'static str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(template);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Bar tracking successful copies against the batch size
pub fn progress_bar(quiet: bool, total: u64) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new(total);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(template.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Mirror the counters onto `pb` until the task is aborted
pub async fn track_progress(pb: ProgressBar, counters: Arc<ProgressCounters>) {
    let mut interval = tokio::time::interval(Duration::from_millis(200));
    loop {
        interval.tick().await;
        let snapshot = counters.snapshot();
        pb.set_position(snapshot.succeeded);
        pb.set_message(format!("{} attempted", snapshot.attempted));
    }
}

/// Print what a run would copy
pub fn print_plan(plan: &BatchPlan, sample: usize) {
    println!();
    println!("{}", style("Batch Plan:").bold().underlined());
    for (category, count) in &plan.per_category {
        println!("  {}: {}", category, style(count).green());
    }
    println!("  Total: {}", style(plan.len()).green().bold());

    if sample > 0 && !plan.is_empty() {
        println!();
        println!("{}", style("Sample destinations:").bold());
        for task in plan.tasks.iter().take(sample) {
            println!(
                "  {} {} {}",
                style(task.source().display()).dim(),
                style("→").cyan(),
                task.destination().display()
            );
        }
    }
}

/// Print the end-of-run statistics
pub fn print_summary(summary: &RunSummary) {
    let progress = &summary.progress;
    println!();
    println!("{}", style("Transfer Statistics:").bold().underlined());
    println!("  Files to process: {}", style(progress.to_process).cyan());
    println!("  Files attempted: {}", style(progress.attempted).cyan());
    println!("  Files copied: {}", style(progress.succeeded).green());
    println!(
        "  Directories created: {}",
        style(progress.directories_created).green()
    );
    println!(
        "  Bytes copied: {}",
        style(format_bytes(progress.bytes_copied)).green()
    );
    println!(
        "  Failed files: {}",
        if summary.dead_letter_count() > 0 {
            style(summary.dead_letter_count()).red()
        } else {
            style(summary.dead_letter_count()).green()
        }
    );
    println!("  Workers: {}", style(summary.workers).blue());
    println!(
        "  Duration: {}",
        style(format_duration(summary.elapsed)).blue()
    );

    for letter in &summary.dead_letters {
        println!(
            "    {} {}: {}",
            style("✗").red(),
            letter.task.source().display(),
            style(letter.reason()).dim()
        );
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
