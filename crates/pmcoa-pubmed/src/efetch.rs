//! E-utilities `efetch` client

use std::cell::Cell;
use std::time::Instant;

use anyhow::{Context, Result};
use pmcoa_core::{FetchError, get_text, retry_with_backoff};

use crate::MetadataSource;
use crate::config::Config;
use crate::parser::{PubmedRecord, parse_efetch_xml};

/// Blocking PubMed client, rate limited to one request per `request_interval`.
pub struct EntrezClient {
    config: Config,
    last_request: Cell<Option<Instant>>,
}

impl EntrezClient {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            last_request: Cell::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Request URL for one chunk of PMIDs.
    pub fn request_url(&self, pmids: &[String]) -> Result<reqwest::Url> {
        let ids = pmids.join(",");
        let mut params: Vec<(&str, &str)> = vec![
            ("db", "pubmed"),
            ("id", ids.as_str()),
            ("rettype", "xml"),
            ("retmode", "xml"),
            ("tool", "pmcoa"),
        ];
        if let Some(email) = &self.config.email {
            params.push(("email", email.as_str()));
        }
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.as_str()));
        }
        reqwest::Url::parse_with_params(&self.config.base_url, &params)
            .with_context(|| format!("invalid efetch URL {}", self.config.base_url))
    }

    /// Sleep until `request_interval` has passed since the previous request.
    fn throttle(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.config.request_interval {
                std::thread::sleep(self.config.request_interval - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    fn fetch_chunk(&self, pmids: &[String]) -> Result<Vec<PubmedRecord>> {
        let url = self.request_url(pmids)?;
        let label = format!("efetch {} PMID(s) from {}", pmids.len(), pmids[0]);
        let body = retry_with_backoff(&label, &self.config.retry, || {
            self.throttle();
            get_text(url.as_str(), &self.config.http).map_err(FetchError::Stream)
        })
        .with_context(|| label.clone())?;

        let records = parse_efetch_xml(&body).with_context(|| label.clone())?;
        log::debug!("{label}: {} record(s)", records.len());
        Ok(records)
    }
}

impl MetadataSource for EntrezClient {
    fn fetch(&self, pmids: &[String]) -> Result<Vec<PubmedRecord>> {
        let chunk_size = self.config.chunk_size.max(1);
        let mut records = Vec::with_capacity(pmids.len());
        for chunk in pmids.chunks(chunk_size) {
            records.extend(self.fetch_chunk(chunk)?);
        }
        Ok(records)
    }
}
