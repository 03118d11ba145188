//! pmcoa PubMed - article metadata from NCBI E-utilities
//!
//! Fetches PubMed records (abstract, MeSH descriptors, cited PMIDs) for a
//! list of PMIDs via `efetch` and parses the returned XML with quick-xml.
//!
//! # Example
//!
//! ```ignore
//! use pmcoa_pubmed::{Config, EntrezClient, MetadataSource};
//!
//! let client = EntrezClient::new(Config {
//!     email: Some("me@example.org".into()),
//!     ..Default::default()
//! });
//! let records = client.fetch(&["31452104".to_string()])?;
//! println!("{} MeSH terms", records[0].mesh_terms.len());
//! ```

pub mod config;
pub mod efetch;
pub mod parser;

// Re-exports
pub use config::Config;
pub use efetch::EntrezClient;
pub use parser::{ParseError, PubmedRecord, parse_efetch_xml};

/// Anything that can resolve PMIDs to PubMed metadata.
///
/// Records come back in any order; PMIDs unknown to the source are
/// simply absent from the result.
pub trait MetadataSource {
    fn fetch(&self, pmids: &[String]) -> anyhow::Result<Vec<PubmedRecord>>;
}
