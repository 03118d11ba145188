//! Entrez client configuration

use std::time::Duration;

use pmcoa_core::{HttpConfig, RetryPolicy};

/// Runtime configuration for the PubMed metadata client
#[derive(Debug, Clone)]
pub struct Config {
    /// E-utilities efetch endpoint
    pub base_url: String,
    /// Contact address NCBI asks every client to send
    pub email: Option<String>,
    /// NCBI API key (raises the rate limit from 3 to 10 req/s)
    pub api_key: Option<String>,
    /// Minimum gap between two requests
    pub request_interval: Duration,
    /// Most PMIDs sent in one request
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi".to_string(),
            email: None,
            api_key: None,
            request_interval: Duration::from_secs(1),
            chunk_size: 200,
            retry: RetryPolicy::new(10, Duration::from_secs(1)),
            http: HttpConfig::default(),
        }
    }
}
