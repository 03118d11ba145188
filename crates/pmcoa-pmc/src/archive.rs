//! Where article directories come from
//!
//! [`HttpArchives`] downloads and unpacks OA packages; [`LocalArchives`]
//! only resolves directories that are already on disk.

use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use pmcoa_core::{FetchError, HttpConfig, RetryPolicy, get_bytes, retry_with_backoff};

use crate::manifest::WorkItem;

/// Resolves a work item to its unpacked article directory.
pub trait ArchiveSource {
    fn fetch(&self, item: &WorkItem) -> Result<PathBuf, FetchError>;
}

pub const DEFAULT_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pub/pmc/";

/// Already-unpacked archives under `media_dir/<pmcid>`.
#[derive(Debug, Clone)]
pub struct LocalArchives {
    pub media_dir: PathBuf,
}

impl LocalArchives {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
        }
    }
}

impl ArchiveSource for LocalArchives {
    fn fetch(&self, item: &WorkItem) -> Result<PathBuf, FetchError> {
        let dir = self.media_dir.join(item.pmcid());
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(FetchError::Missing(format!("{} not unpacked", dir.display())))
        }
    }
}

/// Downloads `<base_url>/<File>` and unpacks it into `media_dir/<pmcid>`.
#[derive(Debug, Clone)]
pub struct HttpArchives {
    pub base_url: String,
    pub media_dir: PathBuf,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
}

impl HttpArchives {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            media_dir: media_dir.into(),
            http: HttpConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    fn url(&self, item: &WorkItem) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            item.file.trim_start_matches('/')
        )
    }
}

impl ArchiveSource for HttpArchives {
    fn fetch(&self, item: &WorkItem) -> Result<PathBuf, FetchError> {
        let pmcid = item.pmcid();
        let dir = self.media_dir.join(pmcid);
        if dir.is_dir() {
            log::debug!("{pmcid}: already unpacked");
            return Ok(dir);
        }

        let url = self.url(item);
        retry_with_backoff(pmcid, &self.retry, || {
            let bytes = get_bytes(&url, &self.http)?;
            log::debug!("{pmcid}: downloaded {} bytes", bytes.len());
            unpack(&bytes, &self.media_dir, pmcid)?;
            Ok(())
        })?;
        Ok(dir)
    }
}

/// Unpack a `.tar.gz` so its content ends up in `media_dir/<pmcid>`.
///
/// Extraction goes to a scratch directory first, so an interrupted unpack
/// never leaves a directory that looks complete.
pub fn unpack(tar_gz: &[u8], media_dir: &Path, pmcid: &str) -> io::Result<()> {
    std::fs::create_dir_all(media_dir)?;
    let scratch = media_dir.join(format!(".{pmcid}.partial"));
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }
    std::fs::create_dir_all(&scratch)?;

    let result = tar::Archive::new(GzDecoder::new(tar_gz))
        .unpack(&scratch)
        .and_then(|()| {
            // Packages normally hold a single `<pmcid>/` directory
            let inner = scratch.join(pmcid);
            let source = if inner.is_dir() { inner } else { scratch.clone() };
            std::fs::rename(&source, media_dir.join(pmcid))
        });

    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn item(file: &str) -> WorkItem {
        WorkItem {
            file: file.to_string(),
            citation: String::new(),
            accession_id: "PMC1".into(),
            date: String::new(),
            license: String::new(),
            pmid: None,
        }
    }

    fn package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn local_resolves_existing_dir() {
        let media = TempDir::new().unwrap();
        std::fs::create_dir(media.path().join("PMC1")).unwrap();
        let src = LocalArchives::new(media.path());
        assert_eq!(
            src.fetch(&item("a/b/PMC1.tar.gz")).unwrap(),
            media.path().join("PMC1")
        );
    }

    #[test]
    fn local_missing_is_not_retryable() {
        let media = TempDir::new().unwrap();
        let err = LocalArchives::new(media.path())
            .fetch(&item("PMC2.tar.gz"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Missing(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unpack_nested_package() {
        let media = TempDir::new().unwrap();
        let bytes = package(&[("PMC1/a.nxml", "<a/>"), ("PMC1/g1.jpg", "img")]);
        unpack(&bytes, media.path(), "PMC1").unwrap();
        assert_eq!(std::fs::read(media.path().join("PMC1/g1.jpg")).unwrap(), b"img");
        assert!(!media.path().join(".PMC1.partial").exists());
    }

    #[test]
    fn unpack_flat_package() {
        let media = TempDir::new().unwrap();
        let bytes = package(&[("a.nxml", "<a/>")]);
        unpack(&bytes, media.path(), "PMC7").unwrap();
        assert!(media.path().join("PMC7/a.nxml").is_file());
    }

    #[test]
    fn unpack_garbage_leaves_nothing() {
        let media = TempDir::new().unwrap();
        assert!(unpack(b"not a tarball", media.path(), "PMC1").is_err());
        assert!(!media.path().join("PMC1").exists());
        assert!(!media.path().join(".PMC1.partial").exists());
    }

    #[test]
    fn http_skips_unpacked_dir() {
        let media = TempDir::new().unwrap();
        std::fs::create_dir(media.path().join("PMC1")).unwrap();
        let mut src = HttpArchives::new(media.path());
        src.base_url = "http://127.0.0.1:9/".into();
        assert!(src.fetch(&item("x/PMC1.tar.gz")).is_ok());
    }

    #[test]
    fn url_joins_base_and_file() {
        let src = HttpArchives::new("/tmp");
        assert_eq!(
            src.url(&item("oa_package/08/e0/PMC1.tar.gz")),
            "https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/08/e0/PMC1.tar.gz"
        );
    }
}
