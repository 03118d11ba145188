//! pmcoa - PMC Open Access article pipeline
//!
//! Builds resumable, shard-rotated JSON records (metadata, figure captions,
//! figure-citing paragraphs) from PMC OA packages and enriches them with
//! PubMed metadata.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "pmcoa")]
#[command(about = "Resumable PMC Open Access article pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./pmcoa.toml or ~/.config/pmcoa/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Maximum attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Download, extract and write records for manifest batches
    Build(cmd::build::BuildArgs),
    /// Add PubMed metadata to written shards
    Enrich(cmd::enrich::EnrichArgs),
    /// Split one manifest into batch manifests
    Split(cmd::split::SplitArgs),
    /// Show per-batch progress from the ledgers
    Status(cmd::status::StatusArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = pmcoa_core::ProgressContext::new();

    // Logging:
    //   TTY:     quiet (warn) unless --debug; progress bars show activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    pmcoa_core::init_logging(quiet, cli.debug, multi);

    if let Err(e) = pmcoa_core::install_signal_handlers() {
        log::warn!("cannot install signal handlers: {e}");
    }

    let mut config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };
    if let Some(secs) = cli.request_timeout {
        config.fetch.request_timeout = secs;
    }
    if let Some(n) = cli.max_retries {
        config.fetch.max_retries = n;
    }

    match cli.command {
        Command::Build(args) => cmd::build::run(args, &config, &progress),
        Command::Enrich(args) => cmd::enrich::run(args, &config, &progress),
        Command::Split(args) => cmd::split::run(args, &config),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::Config => {
            let rows = [
                ("Data directory", config.output.data_dir.display().to_string()),
                ("Filelist directory", config.output.filelist_dir.display().to_string()),
                ("License", config.output.license.clone()),
                ("Batch size", config.output.batch_size.to_string()),
                ("Image extensions", config.output.image_extensions.join(", ")),
                ("Archive base URL", config.fetch.base_url.clone()),
                ("Request timeout", format!("{}s", config.fetch.request_timeout)),
                (
                    "Retries",
                    format!("{} x {}ms", config.fetch.max_retries, config.fetch.retry_delay_ms),
                ),
                ("Entrez URL", config.entrez.base_url.clone()),
                (
                    "Entrez email",
                    config.entrez.email.clone().unwrap_or_else(|| "not set".into()),
                ),
                (
                    "NCBI API key",
                    if config.entrez.api_key.is_some() {
                        "configured".into()
                    } else {
                        "not set".into()
                    },
                ),
            ];
            cmd::print_table("Setting", &rows);
            Ok(())
        }
    }
}
