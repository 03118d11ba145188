//! pmcoa PMC - PubMed Central Open Access article records
//!
//! Turns batch manifests of OA packages into shard-rotated JSON records:
//! each archive is fetched and unpacked, its NXML document is parsed for
//! bibliographic fields, figure captions and the paragraphs citing each
//! figure, and the assembled record is appended to the batch's shards.
//! Completion and error ledgers make every batch resumable.
//!
//! # Example
//!
//! ```ignore
//! use pmcoa_core::ProgressContext;
//! use pmcoa_pmc::{Config, Layout, runner};
//!
//! let config = Config::new(Layout::new("data", "filelists"), "comm");
//! let summary = runner::run(&config, 0, &ProgressContext::new())?;
//! println!("{} processed, {} failed", summary.processed(), summary.failed);
//! ```

pub mod archive;
pub mod citation;
pub mod config;
pub mod enrich;
pub mod extract;
pub mod manifest;
pub mod record;
pub mod runner;
pub mod worker;

// Re-exports
pub use archive::{ArchiveSource, HttpArchives, LocalArchives};
pub use config::{Config, Layout};
pub use enrich::{EnrichSummary, enrich};
pub use extract::{DocumentExtraction, ExtractOptions, Extracted, Figure, extract_article};
pub use manifest::{WorkItem, read_manifest, split_into_batches};
pub use record::ArticleRecord;
pub use runner::{BatchPaths, Summary, run, run_batch};
