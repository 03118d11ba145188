//! Blocking HTTP fetches on a shared async client.
//!
//! Uses async reqwest internally with tokio::time::timeout as a hard
//! request deadline, but presents a sync interface: the pipeline is
//! single-threaded and processes one item at a time.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request settings for blocking fetches.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request deadline (headers + body)
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            user_agent: concat!("pmcoa/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Error types for HTTP fetches
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request exceeded [`HttpConfig::request_timeout`]
    Timeout(Duration),
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout(d) => write!(f, "request timed out after {}s", d.as_secs()),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                // 400 = malformed request, 404 = archive not on the server,
                // 410 = withdrawn. Retrying will not change the answer.
                !matches!(status, Some(400) | Some(404) | Some(410))
            }
            Self::Timeout(_) => true,
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// HTTP GET the whole body as bytes.
pub fn get_bytes(url: &str, config: &HttpConfig) -> Result<Vec<u8>, StreamError> {
    let timeout = config.request_timeout;
    SHARED_RUNTIME.handle().block_on(async {
        let request = async {
            let response = SHARED_CLIENT
                .get(url)
                .header(reqwest::header::USER_AGENT, &config.user_agent)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;
            let body = response
                .bytes()
                .await
                .map_err(|e| StreamError::from_reqwest(&e))?;
            Ok::<_, StreamError>(body.to_vec())
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(StreamError::Timeout(timeout)),
        }
    })
}

/// HTTP GET the whole body as UTF-8 text (lossy).
pub fn get_text(url: &str, config: &HttpConfig) -> Result<String, StreamError> {
    let bytes = get_bytes(url, config)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn http_err(status: u16) -> StreamError {
        StreamError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_404_not_retryable() {
        assert!(!http_err(404).is_retryable());
    }

    #[test]
    fn http_410_not_retryable() {
        assert!(!http_err(410).is_retryable());
    }

    #[test]
    fn http_400_not_retryable() {
        assert!(!http_err(400).is_retryable());
    }

    #[test]
    fn http_500_retryable() {
        assert!(http_err(500).is_retryable());
    }

    #[test]
    fn http_429_retryable() {
        assert!(http_err(429).is_retryable());
    }

    #[test]
    fn timeout_retryable() {
        assert!(StreamError::Timeout(Duration::from_secs(5)).is_retryable());
    }

    #[test]
    fn io_storage_full_not_retryable() {
        let err = StreamError::Io(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn http_none_status_retryable() {
        // Network error without status code should be retryable
        let err = StreamError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_timeout() {
        let err = StreamError::Timeout(Duration::from_secs(30));
        assert_eq!(format!("{err}"), "request timed out after 30s");
    }

    #[test]
    fn default_config_has_user_agent() {
        let config = HttpConfig::default();
        assert!(config.user_agent.starts_with("pmcoa/"));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }
}
