//! pmcoa Core - Shared infrastructure for the PMC Open Access pipeline
//!
//! This crate provides the pieces every stage reuses: logging and progress
//! reporting, the shared HTTP client, retry policy, durable CSV ledgers,
//! the rotating JSON shard writer, and content hashing.

pub mod error;
pub mod hash;
pub mod http;
pub mod ledger;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shard;
pub mod shutdown;

// Re-exports for convenience
pub use error::FetchError;
pub use hash::{file_digest, hash_bytes, hash_file};
pub use http::{HttpConfig, SHARED_RUNTIME, StreamError, get_bytes, get_text};
pub use ledger::{Ledger, count_rows, read_column};
pub use logging::init_logging;
pub use progress::{ItemProgress, ProgressContext, fmt_num, item_line};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use shard::{ShardWriter, cleanup_tmp_files, list_shards, read_shard, write_json_atomic};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag};
