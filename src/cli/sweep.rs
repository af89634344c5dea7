use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::db::Database;
use crate::reclaim::{Reclaimer, Sweep, SweepReport};

/// How often the watch loop checks for Ctrl+C while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Execute the sweep command: once, or every `sweep_interval` with `watch`.
pub fn run_sweep(db: &Database, config: &Config, only: Option<&str>, watch: bool) -> Result<()> {
    let only = only
        .map(|s| {
            Sweep::parse(s)
                .ok_or_else(|| anyhow!("Unknown sweep {} (stale, inactive or special-decay)", s))
        })
        .transpose()?;

    if !watch {
        return sweep_once(db, config, only);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    ctrlc_handler(shutdown.clone());
    println!(
        "Sweeping every {}h. Press Ctrl+C to stop",
        config.sweep_interval.as_secs() / 3600
    );

    while !shutdown.load(Ordering::SeqCst) {
        if let Err(e) = sweep_once(db, config, only) {
            tracing::error!("Sweep run failed: {:#}", e);
        }

        let next_run = Instant::now() + config.sweep_interval;
        while Instant::now() < next_run && !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    println!("Sweeper stopped");
    Ok(())
}

fn sweep_once(db: &Database, config: &Config, only: Option<Sweep>) -> Result<()> {
    let reclaimer = Reclaimer::new(db, config);
    let now = Utc::now();

    let reports = match only {
        Some(sweep) => vec![reclaimer.run(sweep, now)?],
        None => reclaimer.run_all(now)?,
    };
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!(
        "  {:<14} examined {:>4}  changed {:>4}  skipped {:>4}  failed {:>4}",
        report.sweep.as_str(),
        report.examined,
        report.changed,
        report.skipped,
        report.failed
    );
}

fn ctrlc_handler(shutdown: Arc<AtomicBool>) {
    let _ = ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, shutting down...");
        shutdown.store(true, Ordering::SeqCst);
    });
}
