//! Batch manifests: CSV lists of article archives
//!
//! Header: `File,Citation,Accession_ID,Date,License[,PMID]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// One article awaiting processing. Identity is `accession_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Archive path relative to the OA root, e.g. `oa_package/08/e0/PMC13900.tar.gz`
    #[serde(rename = "File")]
    pub file: String,
    #[serde(rename = "Citation", alias = "Article Citation", default)]
    pub citation: String,
    #[serde(rename = "Accession_ID", alias = "AccessionID")]
    pub accession_id: String,
    #[serde(rename = "Date", alias = "Last Updated (YYYY-MM-DD HH:MM:SS)", default)]
    pub date: String,
    #[serde(rename = "License", default)]
    pub license: String,
    #[serde(
        rename = "PMID",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub pmid: Option<String>,
}

impl WorkItem {
    /// Archive file name without `.tar.gz`; names the media directory.
    pub fn pmcid(&self) -> &str {
        let base = self.file.rsplit('/').next().unwrap_or(&self.file);
        base.strip_suffix(".tar.gz")
            .or_else(|| base.strip_suffix(".tgz"))
            .unwrap_or(base)
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(d)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Read every row of a manifest.
pub fn read_manifest(path: &Path) -> Result<Vec<WorkItem>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open manifest {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("{}: bad row {}", path.display(), i + 2)))
        .collect()
}

/// Manifest name used for shard files: file stem without a `_fixed` suffix.
pub fn manifest_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix("_fixed") {
        Some(s) => s.to_string(),
        None => stem,
    }
}

/// Write `items` into `n` manifests named `filelist_<name>_batch_<i>.csv`.
///
/// Sizes differ by at most one row; the first `len % n` batches take the
/// extra rows. Returns the written paths in batch order.
pub fn split_into_batches(
    items: &[WorkItem],
    n: usize,
    out_dir: &Path,
    name: &str,
) -> Result<Vec<PathBuf>> {
    anyhow::ensure!(n > 0, "batch count must be positive");
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let base = items.len() / n;
    let extra = items.len() % n;
    let mut paths = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        let path = out_dir.join(format!("filelist_{name}_batch_{i}.csv"));
        write_manifest(&path, &items[start..start + len])?;
        log::debug!("{}: {len} rows", path.display());
        paths.push(path);
        start += len;
    }
    Ok(paths)
}

fn write_manifest(path: &Path, items: &[WorkItem]) -> Result<()> {
    let with_pmid = items.iter().any(|i| i.pmid.is_some());
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    let mut header = vec!["File", "Citation", "Accession_ID", "Date", "License"];
    if with_pmid {
        header.push("PMID");
    }
    w.write_record(&header)?;
    for item in items {
        let mut row = vec![
            item.file.as_str(),
            item.citation.as_str(),
            item.accession_id.as_str(),
            item.date.as_str(),
            item.license.as_str(),
        ];
        if with_pmid {
            row.push(item.pmid.as_deref().unwrap_or(""));
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}
