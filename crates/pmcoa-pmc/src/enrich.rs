//! PubMed enrichment of written shards
//!
//! Each shard is read back, its PMIDs are looked up through a
//! [`MetadataSource`], and an updated copy is written to the output
//! directory. Records stay as raw JSON values so fields this crate does not
//! know about pass through untouched.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use pmcoa_core::{Ledger, ProgressContext, is_shutdown_requested, read_shard, write_json_atomic};
use pmcoa_pubmed::{MetadataSource, PubmedRecord};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

pub const ENRICH_COMPLETE_HEADER: [&str; 2] = ["json_path", "out_path"];
pub const ENRICH_ERROR_HEADER: [&str; 2] = ["json_path", "Traceback"];

/// Most PMIDs sent to the source in one call
pub const PMID_CHUNK: usize = 200;

#[derive(Debug, Default)]
pub struct EnrichSummary {
    pub shards: usize,
    pub already_done: usize,
    /// Shards with at least one PMID looked up
    pub enriched: usize,
    /// Shards without PMIDs, copied unchanged
    pub copied: usize,
    pub failed: usize,
    /// Records that received fetched metadata
    pub records_merged: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl EnrichSummary {
    pub fn log(&self) {
        log::info!(
            "enrich: {} enriched, {} copied, {} failed, {} done earlier of {} shards; {} records merged in {:.1}s{}",
            self.enriched,
            self.copied,
            self.failed,
            self.already_done,
            self.shards,
            self.records_merged,
            self.elapsed.as_secs_f64(),
            if self.interrupted { " (interrupted)" } else { "" }
        );
    }
}

/// Enrich every shard in `shards` not yet listed in `complete`.
///
/// Per-shard failures go to `errors`; only ledger I/O errors are returned.
pub fn enrich(
    shards: &[PathBuf],
    out_dir: &Path,
    complete: &mut Ledger,
    errors: &mut Ledger,
    source: &dyn MetadataSource,
    progress: &ProgressContext,
) -> Result<EnrichSummary> {
    let start = Instant::now();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let todo: Vec<&PathBuf> = shards
        .iter()
        .filter(|p| !complete.contains(&p.to_string_lossy()))
        .collect();
    let mut summary = EnrichSummary {
        shards: shards.len(),
        already_done: shards.len() - todo.len(),
        ..Default::default()
    };

    let bar = progress.items("enrich", todo.len());
    for (i, shard) in todo.iter().enumerate() {
        if is_shutdown_requested() {
            log::warn!("shutdown requested, stopping after {i} shards");
            summary.interrupted = true;
            break;
        }

        let shard_str = shard.to_string_lossy();
        match enrich_shard(shard, out_dir, source) {
            Ok(outcome) => {
                if outcome.looked_up == 0 {
                    summary.copied += 1;
                } else {
                    summary.enriched += 1;
                }
                summary.records_merged += outcome.merged;
                let out = outcome.out_path.to_string_lossy();
                complete
                    .append(&[shard_str.as_ref(), out.as_ref()])
                    .context("cannot write enrichment log")?;
            }
            Err(e) => {
                log::error!("{}: {e:#}", shard.display());
                let traceback = format!("{e:#}");
                errors
                    .append(&[shard_str.as_ref(), traceback.as_str()])
                    .context("cannot write enrichment error log")?;
                summary.failed += 1;
            }
        }
        bar.processed(i + 1, &shard_str);
    }
    bar.finish();

    summary.elapsed = start.elapsed();
    Ok(summary)
}

#[derive(Debug)]
pub struct ShardOutcome {
    pub out_path: PathBuf,
    /// Distinct PMIDs sent to the source
    pub looked_up: usize,
    pub merged: usize,
}

/// Enrich one shard into `out_dir/<file name>`.
pub fn enrich_shard(
    shard: &Path,
    out_dir: &Path,
    source: &dyn MetadataSource,
) -> Result<ShardOutcome> {
    let file_name = shard
        .file_name()
        .with_context(|| format!("{} has no file name", shard.display()))?;
    let out_path = out_dir.join(file_name);

    let mut records = read_shard(shard).with_context(|| format!("cannot read {}", shard.display()))?;
    let pmids = collect_pmids(&records);

    let mut merged = 0;
    if !pmids.is_empty() {
        let mut fetched: FxHashMap<String, PubmedRecord> = FxHashMap::default();
        for chunk in pmids.chunks(PMID_CHUNK) {
            for rec in source.fetch(chunk)? {
                fetched.insert(rec.pmid.clone(), rec);
            }
        }
        for record in &mut records {
            let Some(pmid) = record_pmid(record) else {
                continue;
            };
            if let Some(meta) = fetched.get(&pmid) {
                merge(record, meta);
                merged += 1;
            }
        }
        log::debug!(
            "{}: {merged}/{} records matched {} PMIDs",
            shard.display(),
            records.len(),
            pmids.len()
        );
    }

    write_json_atomic(&out_path, &records)
        .with_context(|| format!("cannot write {}", out_path.display()))?;
    Ok(ShardOutcome {
        out_path,
        looked_up: pmids.len(),
        merged,
    })
}

fn record_pmid(record: &Value) -> Option<String> {
    let pmid = match record.get("pmid")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!pmid.is_empty()).then_some(pmid)
}

/// Distinct PMIDs in first-seen order.
fn collect_pmids(records: &[Value]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    records
        .iter()
        .filter_map(record_pmid)
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn merge(record: &mut Value, meta: &PubmedRecord) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    if let Some(text) = meta.abstract_text.as_deref().filter(|t| !t.trim().is_empty()) {
        obj.insert("abstract".into(), Value::from(text));
    }
    obj.insert("mesh".into(), Value::from(meta.mesh_terms.clone()));
    obj.insert("reference_ids".into(), Value::from(meta.reference_ids.clone()));
    obj.insert("reference_count".into(), Value::from(meta.reference_count));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSource {
        calls: RefCell<Vec<usize>>,
    }

    impl MetadataSource for FakeSource {
        fn fetch(&self, pmids: &[String]) -> anyhow::Result<Vec<PubmedRecord>> {
            self.calls.borrow_mut().push(pmids.len());
            Ok(pmids
                .iter()
                .filter(|p| p.as_str() != "404")
                .map(|p| PubmedRecord {
                    pmid: p.clone(),
                    abstract_text: (p != "2").then(|| format!("abstract {p}")),
                    mesh_terms: vec![format!("mesh {p}")],
                    reference_ids: vec!["9".into()],
                    reference_count: 3,
                })
                .collect())
        }
    }

    fn write(path: &Path, value: Value) {
        std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn merges_by_pmid() {
        let dir = TempDir::new().unwrap();
        let shard = dir.path().join("s_0.json");
        write(
            &shard,
            json!([
                {"accession_id": "A", "pmid": "1", "abstract": "old", "extra": 7},
                {"accession_id": "B", "pmid": "2", "abstract": "keep"},
                {"accession_id": "C", "pmid": null, "abstract": ""},
                {"accession_id": "D", "pmid": "404", "abstract": ""}
            ]),
        );
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let source = FakeSource::default();

        let outcome = enrich_shard(&shard, &out, &source).unwrap();
        assert_eq!(outcome.looked_up, 3);
        assert_eq!(outcome.merged, 2);

        let records = read_shard(&out.join("s_0.json")).unwrap();
        assert_eq!(records[0]["abstract"], "abstract 1");
        assert_eq!(records[0]["extra"], 7);
        assert_eq!(records[0]["mesh"], json!(["mesh 1"]));
        assert_eq!(records[0]["reference_count"], 3);
        assert_eq!(records[1]["abstract"], "keep");
        assert_eq!(records[1]["reference_ids"], json!(["9"]));
        assert!(records[2].get("mesh").is_none());
        assert!(records[3].get("mesh").is_none());
    }

    #[test]
    fn lookups_are_chunked() {
        let dir = TempDir::new().unwrap();
        let shard = dir.path().join("s_0.json");
        let records: Vec<Value> = (0..450).map(|i| json!({"pmid": format!("{}", i + 1000)})).collect();
        write(&shard, Value::from(records));
        let source = FakeSource::default();

        let outcome = enrich_shard(&shard, dir.path(), &source).unwrap();
        assert_eq!(outcome.merged, 450);
        assert_eq!(*source.calls.borrow(), vec![200, 200, 50]);
    }

    #[test]
    fn enrich_is_resumable() {
        let dir = TempDir::new().unwrap();
        let shards: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = dir.path().join(format!("s_{i}.json"));
                write(&p, json!([{"pmid": format!("{}", i + 1)}]));
                p
            })
            .collect();
        std::fs::write(dir.path().join("s_1.json"), "{broken").unwrap();
        let out = dir.path().join("out");
        let logs = dir.path().join("logs");
        let progress = ProgressContext::hidden();
        let source = FakeSource::default();

        let mut complete =
            Ledger::open(&logs.join("c.csv"), &ENRICH_COMPLETE_HEADER, "json_path").unwrap();
        let mut errors = Ledger::open(&logs.join("e.csv"), &ENRICH_ERROR_HEADER, "json_path").unwrap();
        let summary = enrich(&shards, &out, &mut complete, &mut errors, &source, &progress).unwrap();
        assert_eq!((summary.enriched, summary.failed), (2, 1));
        assert_eq!(errors.len(), 1);
        assert!(out.join("s_2.json").is_file());

        let summary = enrich(&shards, &out, &mut complete, &mut errors, &source, &progress).unwrap();
        assert_eq!(summary.already_done, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn shard_without_pmids_copied() {
        let dir = TempDir::new().unwrap();
        let shard = dir.path().join("s_0.json");
        write(&shard, json!([{"accession_id": "A", "pmid": null}]));
        let source = FakeSource::default();
        std::fs::create_dir(dir.path().join("o")).unwrap();
        let outcome = enrich_shard(&shard, &dir.path().join("o"), &source).unwrap();
        assert_eq!(outcome.looked_up, 0);
        assert!(source.calls.borrow().is_empty());
        assert_eq!(
            read_shard(&dir.path().join("o/s_0.json")).unwrap(),
            vec![json!({"accession_id": "A", "pmid": null})]
        );
    }

    #[test]
    fn numeric_pmid_accepted() {
        assert_eq!(record_pmid(&json!({"pmid": 123})).as_deref(), Some("123"));
        assert_eq!(record_pmid(&json!({"pmid": " "})), None);
        assert_eq!(record_pmid(&json!({})), None);
    }
}
