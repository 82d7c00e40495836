//! Pixflow CLI - fetch, resize, and reformat a batch of images.
//!
//! Submits a batch to the Pixflow pipeline, follows it until it finishes, and
//! prints the final process record as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Run a batch from URLs on the command line
//! pixflow run https://example.com/a.jpg https://example.com/b.png
//!
//! # Run a batch from a request file, with more download workers
//! pixflow run --request batch.json --download-workers 8 --output record.json
//!
//! # View configuration
//! pixflow config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Pixflow - staged fetch, resize, and reformat pipeline for image batches.
#[derive(Parser, Debug)]
#[command(name = "pixflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a batch through download, resize, and reformat
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match pixflow_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pixflow config path`."
            );
            pixflow_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pixflow v{}", pixflow_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
