//! Resumable batch runner
//!
//! The completion ledger is the only record of progress: an item is done
//! once its row is there, whether it succeeded or was replaced by a
//! manifest-only record after a failure. Re-running a batch therefore
//! processes exactly the rows the ledger lacks.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use pmcoa_core::{Ledger, ProgressContext, ShardWriter, cleanup_tmp_files, is_shutdown_requested};
use rustc_hash::FxHashSet;

use crate::archive::{ArchiveSource, HttpArchives, LocalArchives};
use crate::config::Config;
use crate::extract::ExtractOptions;
use crate::manifest::{WorkItem, manifest_stem, read_manifest};
use crate::record::ArticleRecord;
use crate::worker::process_item;

pub const COMPLETE_HEADER: [&str; 2] = ["Accession_ID", "json_path"];
pub const ERROR_HEADER: [&str; 6] = [
    "File",
    "Citation",
    "Accession_ID",
    "Date",
    "License",
    "Traceback",
];

/// Files one batch reads and writes
#[derive(Debug, Clone)]
pub struct BatchPaths {
    pub shard_dir: PathBuf,
    /// Shard file prefix, normally the manifest stem
    pub shard_name: String,
    pub complete_log: PathBuf,
    pub error_log: PathBuf,
}

/// Batch execution summary
#[derive(Debug, Default)]
pub struct Summary {
    pub manifest_rows: usize,
    pub already_done: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records found in the shard without a completion row (crash between
    /// append and ledger write); their rows were written back
    pub recovered: usize,
    /// The completion log already covered the whole manifest
    pub skipped: bool,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl Summary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn log(&self, label: &str) {
        if self.skipped {
            log::info!("{label}: all {} rows already complete", self.manifest_rows);
            return;
        }
        if self.recovered > 0 {
            log::warn!(
                "{label}: {} completion row(s) restored from the shard",
                self.recovered
            );
        }
        log::info!(
            "{label}: {} processed ({} failed), {} done earlier, {}/{} total in {:.1}s{}",
            self.processed(),
            self.failed,
            self.already_done,
            self.already_done + self.processed(),
            self.manifest_rows,
            self.elapsed.as_secs_f64(),
            if self.interrupted { " (interrupted)" } else { "" }
        );
    }
}

/// Manifest rows the completion ledger does not list, in manifest order.
pub fn remaining<'a>(items: &'a [WorkItem], complete: &Ledger) -> Vec<&'a WorkItem> {
    items
        .iter()
        .filter(|item| !complete.contains(&item.accession_id))
        .collect()
}

/// Process one batch of work items.
///
/// Per-item failures are logged and replaced by a manifest-only record;
/// only ledger and shard I/O errors are returned.
pub fn run_batch(
    items: &[WorkItem],
    paths: &BatchPaths,
    source: &dyn ArchiveSource,
    opts: &ExtractOptions,
    batch_size: usize,
    progress: &ProgressContext,
) -> Result<Summary> {
    let start = Instant::now();
    let mut summary = Summary {
        manifest_rows: items.len(),
        ..Default::default()
    };

    let mut complete = Ledger::open(&paths.complete_log, &COMPLETE_HEADER, "Accession_ID")
        .with_context(|| format!("cannot open {}", paths.complete_log.display()))?;

    let mut todo = remaining(items, &complete);
    if todo.is_empty() {
        summary.already_done = items.len();
        summary.skipped = complete.len() == items.len();
        summary.elapsed = start.elapsed();
        return Ok(summary);
    }

    let mut errors = Ledger::open(&paths.error_log, &ERROR_HEADER, "Accession_ID")
        .with_context(|| format!("cannot open {}", paths.error_log.display()))?;
    let mut shards = ShardWriter::open(&paths.shard_dir, &paths.shard_name, batch_size)
        .with_context(|| format!("cannot open shards in {}", paths.shard_dir.display()))?;

    summary.recovered = backfill_completed(&todo, &shards, &mut complete)?;
    if summary.recovered > 0 {
        todo = remaining(items, &complete);
    }
    summary.already_done = items.len() - todo.len();
    log::info!(
        "{}: {} of {} rows remaining",
        paths.shard_name,
        todo.len(),
        items.len()
    );

    let bar = progress.items(&paths.shard_name, todo.len());
    for (i, item) in todo.iter().enumerate() {
        if is_shutdown_requested() {
            log::warn!("shutdown requested, stopping after {i} items");
            summary.interrupted = true;
            break;
        }

        let record = match process_item(item, source, opts) {
            Ok(record) => {
                summary.succeeded += 1;
                record
            }
            Err(e) => {
                log::error!("{}: {e}", item.accession_id);
                let traceback = e.to_string();
                errors
                    .append(&[
                        item.file.as_str(),
                        item.citation.as_str(),
                        item.accession_id.as_str(),
                        item.date.as_str(),
                        item.license.as_str(),
                        traceback.as_str(),
                    ])
                    .context("cannot write error log")?;
                summary.failed += 1;
                ArticleRecord::from_row(item)
            }
        };

        let shard = shards
            .append(&record)
            .with_context(|| format!("cannot append to {}", shards.current_path().display()))?;
        complete
            .append(&[item.accession_id.as_str(), shard.to_string_lossy().as_ref()])
            .context("cannot write completion log")?;

        bar.processed(i + 1, &item.accession_id);
    }
    bar.finish();

    summary.elapsed = start.elapsed();
    Ok(summary)
}

/// Write completion rows for pending items whose record is already in the
/// current shard. Only the newest append can be missing its row, and it
/// always lands in the current shard.
fn backfill_completed(
    todo: &[&WorkItem],
    shards: &ShardWriter,
    complete: &mut Ledger,
) -> Result<usize> {
    let shard = shards.current_path();
    let written: FxHashSet<String> = shards
        .current_records()
        .with_context(|| format!("cannot read {}", shard.display()))?
        .iter()
        .filter_map(|r| r.get("accession_id")?.as_str().map(str::to_string))
        .collect();
    if written.is_empty() {
        return Ok(0);
    }

    let shard = shard.to_string_lossy();
    let mut recovered = 0;
    for item in todo.iter().filter(|i| written.contains(&i.accession_id)) {
        log::warn!(
            "{}: record already in {shard} without a completion row, backfilling",
            item.accession_id
        );
        complete
            .append(&[item.accession_id.as_str(), shard.as_ref()])
            .context("cannot write completion log")?;
        recovered += 1;
    }
    Ok(recovered)
}

/// Run batch `batch` of the configured license.
pub fn run(config: &Config, batch: usize, progress: &ProgressContext) -> Result<Summary> {
    let manifest = config.manifest(batch);
    let items = read_manifest(&manifest)?;
    log::info!("{}: {} rows", manifest.display(), items.len());

    let json_dir = config.json_dir();
    std::fs::create_dir_all(&json_dir)
        .with_context(|| format!("cannot create {}", json_dir.display()))?;
    let removed = cleanup_tmp_files(&json_dir)?;
    if removed > 0 {
        log::debug!("removed {removed} stale temp files from {}", json_dir.display());
    }

    let paths = BatchPaths {
        shard_dir: json_dir,
        shard_name: manifest_stem(&manifest),
        complete_log: config.layout.complete_log(&config.license, batch),
        error_log: config.layout.error_log(&config.license, batch),
    };

    let source = archive_source(config);
    let summary = run_batch(
        &items,
        &paths,
        source.as_ref(),
        &config.extract,
        config.batch_size,
        progress,
    )?;
    summary.log(&paths.shard_name);
    Ok(summary)
}

fn archive_source(config: &Config) -> Box<dyn ArchiveSource> {
    let media_dir = config.media_dir();
    if config.offline {
        Box::new(LocalArchives::new(media_dir))
    } else {
        Box::new(HttpArchives {
            base_url: config.base_url.clone(),
            media_dir,
            http: config.http.clone(),
            retry: config.retry,
        })
    }
}

/// Completion and error row counts for one batch's ledgers.
pub fn batch_status(complete_log: &Path, error_log: &Path) -> Result<(usize, usize)> {
    let complete = pmcoa_core::count_rows(complete_log)
        .with_context(|| format!("cannot read {}", complete_log.display()))?;
    let errors = pmcoa_core::count_rows(error_log)
        .with_context(|| format!("cannot read {}", error_log.display()))?;
    Ok((complete, errors))
}
