//! Split subcommand - batch manifests from one large file list

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use pmcoa_pmc::{read_manifest, split_into_batches};

use super::print_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Manifest CSV to split
    pub manifest: PathBuf,

    /// Number of batch manifests to write
    #[arg(short = 'n', long)]
    pub batches: usize,

    /// Name used in `filelist_<name>_batch_<i>.csv` (default: configured license)
    #[arg(short, long)]
    pub license: Option<String>,

    /// Output directory (default: configured filelist directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: SplitArgs, config: &Config) -> Result<()> {
    let license = args
        .license
        .unwrap_or_else(|| config.output.license.clone());
    let out_dir = args
        .output
        .unwrap_or_else(|| config.output.filelist_dir.clone());

    let items = read_manifest(&args.manifest)?;
    log::info!("{}: {} rows", args.manifest.display(), items.len());
    let paths = split_into_batches(&items, args.batches, &out_dir, &license)?;

    print_table(
        "Split",
        &[
            ("Rows", items.len().to_string()),
            ("Batches", paths.len().to_string()),
            ("Output", out_dir.display().to_string()),
        ],
    );
    Ok(())
}
