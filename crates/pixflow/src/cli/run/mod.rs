//! The `pixflow run` command: submit a batch and follow it to completion.

mod input;
mod monitor;

use clap::Args;
use pixflow_core::{Config, Pixflow, ProcessStatus};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use super::overrides::Overrides;
use input::build_request;
use monitor::{follow, print_summary};

/// Arguments for the `run` command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Image URLs to process
    pub urls: Vec<String>,

    /// JSON request file: {"urls": [...], "workers": {"download": n, ...}}
    #[arg(short, long)]
    pub request: Option<PathBuf>,

    /// Text file with one URL per line ('#' starts a comment)
    #[arg(long)]
    pub urls_file: Option<PathBuf>,

    /// Download stage worker count
    #[arg(long)]
    pub download_workers: Option<usize>,

    /// Resize stage worker count
    #[arg(long)]
    pub resize_workers: Option<usize>,

    /// Reformat stage worker count
    #[arg(long)]
    pub reformat_workers: Option<usize>,

    #[command(flatten)]
    pub overrides: Overrides,

    /// Write the final record here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// How often to poll the run's status, in milliseconds
    #[arg(long, default_value = "250")]
    pub poll_interval_ms: u64,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.overrides.apply(&mut config);
    let request = build_request(&args)?;
    tracing::info!(
        "Submitting {} URL(s) with workers download={} resize={} reformat={}",
        request.urls.len(),
        request.workers.download,
        request.workers.resize,
        request.workers.reformat
    );

    let pixflow = Pixflow::new(config)?;
    let submission = pixflow.submit(request)?;
    tracing::info!("{} (process id {})", submission.message, submission.process_id);

    let poll_interval = Duration::from_millis(args.poll_interval_ms.max(10));
    let record = follow(&pixflow, &submission.process_id, poll_interval, !args.no_progress).await?;
    print_summary(&record);

    let json = serde_json::to_string_pretty(&record)?;
    match &args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            writeln!(writer, "{json}")?;
            writer.flush()?;
            tracing::info!("Record written to {:?}", path);
        }
        None => println!("{json}"),
    }

    if record.status == ProcessStatus::Failed {
        anyhow::bail!(
            "Run {} failed: {}",
            record.process_id,
            record.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
