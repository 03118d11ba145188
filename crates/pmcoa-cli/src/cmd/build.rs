//! Build subcommand - records for manifest batches

use anyhow::Result;
use clap::Args;

use pmcoa_core::{ProgressContext, fmt_num, is_shutdown_requested};
use pmcoa_pmc::{Config as BuildConfig, ExtractOptions, runner};

use super::{BatchArgs, print_table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub batches: BatchArgs,

    /// Records per shard file
    #[arg(short = 's', long)]
    pub batch_size: Option<usize>,

    /// Image extensions to collect (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub ext: Option<Vec<String>>,

    /// Only use archives already unpacked in the media directory
    #[arg(long)]
    pub offline: bool,
}

pub fn run(args: BuildArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let layout = args.batches.layout(config);
    let license = args.batches.license(config);
    let batches = args.batches.batches(&layout, &license);
    if batches.is_empty() {
        anyhow::bail!(
            "no batch manifests for license {license} in {}",
            layout.filelist_dir.display()
        );
    }

    let mut build = BuildConfig::new(layout, license);
    build.batch_size = args.batch_size.unwrap_or(config.output.batch_size);
    build.extract = ExtractOptions {
        image_extensions: args
            .ext
            .unwrap_or_else(|| config.output.image_extensions.clone()),
    };
    build.offline = args.offline;
    build.base_url = config.fetch.base_url.clone();
    build.http = config.fetch.http();
    build.retry = config.fetch.retry();

    log::info!("Building {} batches of {}", batches.len(), build.license);
    log::info!("  Data: {}", build.data_dir().display());
    log::info!("  Shard size: {}", build.batch_size);

    let stage = progress.stage_line("build");
    let total = batches.len();
    let mut rows = Vec::new();
    let mut failed = 0;
    for (i, batch) in batches.into_iter().enumerate() {
        if is_shutdown_requested() {
            break;
        }
        stage.set_message(format!("batch {batch} ({}/{total})", i + 1));
        let summary = runner::run(&build, batch, progress)?;
        failed += summary.failed;
        let state = if summary.skipped {
            "complete".to_string()
        } else {
            format!(
                "{} new ({} failed), {}/{}{}",
                fmt_num(summary.processed()),
                fmt_num(summary.failed),
                fmt_num(summary.already_done + summary.processed()),
                fmt_num(summary.manifest_rows),
                if summary.interrupted { ", interrupted" } else { "" }
            )
        };
        rows.push((format!("Batch {batch}"), state));
    }
    stage.finish_and_clear();

    let rows: Vec<(&str, String)> = rows.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    print_table("Build", &rows);

    if failed > 0 {
        log::warn!("{failed} items failed; see the error logs in {}", build.layout.log_dir().display());
    }
    Ok(())
}
