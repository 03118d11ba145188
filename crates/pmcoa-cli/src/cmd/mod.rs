pub mod build;
pub mod enrich;
pub mod split;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use pmcoa_core::list_shards;
use pmcoa_pmc::Layout;
use pmcoa_pmc::manifest::manifest_stem;

use crate::config::Config;

/// Options shared by commands that address batches of one license
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Batch indices (comma-separated); default: every batch manifest found
    #[arg(short, long, value_delimiter = ',')]
    pub batch: Vec<usize>,

    /// License tag selecting manifests and output directories
    #[arg(short, long)]
    pub license: Option<String>,

    /// Data directory (media, shards, logs)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding `filelist_<license>_batch_<i>.csv`
    #[arg(short, long)]
    pub filelist_dir: Option<PathBuf>,
}

impl BatchArgs {
    pub fn license(&self, config: &Config) -> String {
        self.license
            .clone()
            .unwrap_or_else(|| config.output.license.clone())
    }

    pub fn layout(&self, config: &Config) -> Layout {
        Layout::new(
            self.data_dir
                .clone()
                .unwrap_or_else(|| config.output.data_dir.clone()),
            self.filelist_dir
                .clone()
                .unwrap_or_else(|| config.output.filelist_dir.clone()),
        )
    }

    /// Requested batches, or every batch manifest in the filelist directory.
    pub fn batches(&self, layout: &Layout, license: &str) -> Vec<usize> {
        if self.batch.is_empty() {
            discover_batches(&layout.filelist_dir, license)
        } else {
            self.batch.clone()
        }
    }
}

/// Batch indices of `filelist_<license>_batch_<i>[_fixed].csv`, sorted.
pub fn discover_batches(dir: &Path, license: &str) -> Vec<usize> {
    let prefix = format!("filelist_{license}_batch_");
    let Ok(entries) = std::fs::read_dir(dir) else {
        log::warn!("cannot read {}", dir.display());
        return Vec::new();
    };
    let mut batches: Vec<usize> = entries
        .flatten()
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let rest = name.strip_prefix(&prefix)?.strip_suffix(".csv")?;
            let rest = rest.strip_suffix("_fixed").unwrap_or(rest);
            rest.parse().ok()
        })
        .collect();
    batches.sort_unstable();
    batches.dedup();
    batches
}

/// Shard files already written for `batch`, in index order.
pub fn batch_shards(layout: &Layout, license: &str, batch: usize) -> Result<Vec<PathBuf>> {
    let json_dir = layout.json_dir(license);
    let name = manifest_stem(&layout.manifest(license, batch));
    let shards = list_shards(&json_dir, &name)
        .with_context(|| format!("cannot list shards in {}", json_dir.display()))?;
    Ok(shards.into_iter().map(|(_, path)| path).collect())
}

/// Print a key-value table on stderr
pub fn print_table(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
