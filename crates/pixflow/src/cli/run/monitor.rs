//! Following a submitted run until it finishes, and reporting on it.

use indicatif::{ProgressBar, ProgressStyle};
use pixflow_core::{Pixflow, ProcessRecord, Stage};
use std::time::Duration;
use uuid::Uuid;

/// Poll the run's status until it is terminal, returning the final record.
pub async fn follow(
    pixflow: &Pixflow,
    process_id: &Uuid,
    poll_interval: Duration,
    show_progress: bool,
) -> anyhow::Result<ProcessRecord> {
    let pb = show_progress.then(create_spinner);
    let mut ticker = tokio::time::interval(poll_interval);

    let record = loop {
        ticker.tick().await;
        let record = pixflow.status(process_id)?;
        if let Some(pb) = &pb {
            pb.set_message(progress_message(&record));
        }
        if record.status.is_terminal() {
            break record;
        }
    };

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(record)
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("starting...");
    pb
}

/// One-line per-stage progress, e.g. `download 3/5 (1 failed) | resize 2 | reformat 0`.
fn progress_message(record: &ProcessRecord) -> String {
    let total = record.request.urls.len();
    Stage::ALL
        .iter()
        .map(|&stage| {
            let done = record.result_count(stage);
            let failed = record.errors(stage).count;
            let mut part = match stage {
                Stage::Download => format!("{stage} {done}/{total}"),
                _ => format!("{stage} {done}"),
            };
            if failed > 0 {
                part.push_str(&format!(" ({failed} failed)"));
            }
            part
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn elapsed(record: &ProcessRecord) -> Duration {
    record
        .end_time
        .map(|end| end - record.start_time)
        .and_then(|d| d.to_std().ok())
        .unwrap_or_default()
}

/// Print a formatted summary table of a finished run.
pub fn print_summary(record: &ProcessRecord) {
    let elapsed = elapsed(record);
    let total_bytes: u64 = record.downloads.iter().map(|d| d.size_bytes).sum();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        record.reformats.len() as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Status:       {:>8}", record.status.to_string());
    eprintln!("    URLs:         {:>8}", record.request.urls.len());
    eprintln!("  ------------------------------------");
    for stage in Stage::ALL {
        let failed = record.errors(stage).count;
        if failed > 0 {
            eprintln!(
                "    {:<10}    {:>8}   ({} failed)",
                stage.to_string(),
                record.result_count(stage),
                failed
            );
        } else {
            eprintln!(
                "    {:<10}    {:>8}",
                stage.to_string(),
                record.result_count(stage)
            );
        }
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Downloaded:   {:>7.1} MB", total_bytes as f64 / 1_000_000.0);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    if let Some(message) = &record.error_message {
        eprintln!("  ------------------------------------");
        eprintln!("    Error: {message}");
    }
    eprintln!("  ====================================");
}
