//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use pmcoa_core::{HttpConfig, RetryPolicy};
use serde::Deserialize;

/// Global configuration for pmcoa
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub fetch: FetchConfig,
    pub entrez: EntrezConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    pub filelist_dir: PathBuf,
    pub license: String,
    pub batch_size: usize,
    pub image_extensions: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            filelist_dir: PathBuf::from("./filelists"),
            license: "comm".to_string(),
            batch_size: 200,
            image_extensions: vec!["jpg".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    /// Whole-request timeout in seconds
    pub request_timeout: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: pmcoa_pmc::archive::DEFAULT_BASE_URL.to_string(),
            request_timeout: 120,
            max_retries: 10,
            retry_delay_ms: 1000,
        }
    }
}

impl FetchConfig {
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            request_timeout: Duration::from_secs(self.request_timeout),
            ..Default::default()
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntrezConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub email: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub request_interval_ms: u64,
    pub chunk_size: usize,
}

impl Default for EntrezConfig {
    fn default() -> Self {
        let defaults = pmcoa_pubmed::Config::default();
        Self {
            base_url: defaults.base_url,
            email: std::env::var("NCBI_EMAIL").ok(),
            api_key: std::env::var("NCBI_API_KEY").ok(),
            request_interval_ms: defaults.request_interval.as_millis() as u64,
            chunk_size: defaults.chunk_size,
        }
    }
}

impl EntrezConfig {
    /// Client configuration, sharing retry and timeout settings with `fetch`.
    pub fn client_config(&self, fetch: &FetchConfig) -> pmcoa_pubmed::Config {
        pmcoa_pubmed::Config {
            base_url: self.base_url.clone(),
            email: self.email.clone(),
            api_key: self.api_key.clone(),
            request_interval: Duration::from_millis(self.request_interval_ms),
            chunk_size: self.chunk_size.clamp(1, pmcoa_pmc::enrich::PMID_CHUNK),
            retry: fetch.retry(),
            http: fetch.http(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./pmcoa.toml (current directory)
    /// 2. ~/.config/pmcoa/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("pmcoa.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "pmcoa") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
