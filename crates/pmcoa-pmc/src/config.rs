//! Build configuration and on-disk layout

use std::path::{Path, PathBuf};

use pmcoa_core::{HttpConfig, RetryPolicy};

use crate::archive::DEFAULT_BASE_URL;
use crate::extract::ExtractOptions;

/// Where everything lives under the data directory.
///
/// ```text
/// <data_dir>/<license>/media_files/<pmcid>/
/// <data_dir>/json/<license>/<manifest>_<n>.json
/// <data_dir>/json_enriched/<license>/<manifest>_<n>.json
/// <data_dir>/log_json/json_<license>_{complete,error}_batch_<i>.csv
/// <data_dir>/log_json/enrich_<license>_{complete,error}_batch_<i>.csv
/// <filelist_dir>/filelist_<license>_batch_<i>.csv
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    pub data_dir: PathBuf,
    pub filelist_dir: PathBuf,
}

impl Layout {
    pub fn new(data_dir: impl Into<PathBuf>, filelist_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            filelist_dir: filelist_dir.into(),
        }
    }

    pub fn media_dir(&self, license: &str) -> PathBuf {
        self.data_dir.join(license).join("media_files")
    }

    pub fn json_dir(&self, license: &str) -> PathBuf {
        self.data_dir.join("json").join(license)
    }

    pub fn enriched_dir(&self, license: &str) -> PathBuf {
        self.data_dir.join("json_enriched").join(license)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log_json")
    }

    pub fn complete_log(&self, license: &str, batch: usize) -> PathBuf {
        self.log_dir()
            .join(format!("json_{license}_complete_batch_{batch}.csv"))
    }

    pub fn error_log(&self, license: &str, batch: usize) -> PathBuf {
        self.log_dir()
            .join(format!("json_{license}_error_batch_{batch}.csv"))
    }

    pub fn enrich_complete_log(&self, license: &str, batch: usize) -> PathBuf {
        self.log_dir()
            .join(format!("enrich_{license}_complete_batch_{batch}.csv"))
    }

    pub fn enrich_error_log(&self, license: &str, batch: usize) -> PathBuf {
        self.log_dir()
            .join(format!("enrich_{license}_error_batch_{batch}.csv"))
    }

    /// Batch manifest: the deduplicated `_fixed` copy when present, else the plain one.
    pub fn manifest(&self, license: &str, batch: usize) -> PathBuf {
        let fixed = self
            .filelist_dir
            .join(format!("filelist_{license}_batch_{batch}_fixed.csv"));
        if fixed.exists() {
            return fixed;
        }
        self.filelist_dir
            .join(format!("filelist_{license}_batch_{batch}.csv"))
    }
}

/// Runtime configuration for one `build` run
#[derive(Debug, Clone)]
pub struct Config {
    pub layout: Layout,
    /// License tag; selects manifests, media and output directories
    pub license: String,
    /// Records per shard file
    pub batch_size: usize,
    pub extract: ExtractOptions,
    /// Only use archives already unpacked under the media directory
    pub offline: bool,
    /// Root URL archive `File` paths are relative to
    pub base_url: String,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn new(layout: Layout, license: impl Into<String>) -> Self {
        Self {
            layout,
            license: license.into(),
            batch_size: 200,
            extract: ExtractOptions::default(),
            offline: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: HttpConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        self.layout.media_dir(&self.license)
    }

    pub fn json_dir(&self) -> PathBuf {
        self.layout.json_dir(&self.license)
    }

    pub fn manifest(&self, batch: usize) -> PathBuf {
        self.layout.manifest(&self.license, batch)
    }

    pub fn data_dir(&self) -> &Path {
        &self.layout.data_dir
    }
}
