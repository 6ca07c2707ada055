//! ccindex core - streaming scan of Common Crawl CDX index shards
//!
//! Fetches gzip-compressed index shards over HTTP, decodes them line by line
//! without buffering whole files, and appends the raw lines whose URL or MIME
//! type match the configured predicates.

pub mod error;
pub mod logging;
pub mod matcher;
pub mod payload;
pub mod progress;
pub mod record;
pub mod shard_processor;
pub mod sink;
pub mod stream;

// Re-exports for convenience
pub use error::ShardError;
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use matcher::{
    DEFAULT_EXTENSIONS, DEFAULT_MIME_TYPES, FnFilter, MatchOutcome, MimeCounter, RecordFilter,
    SuffixFilter,
};
pub use payload::{PayloadError, PayloadFields};
pub use progress::{ByteProgress, ProgressContext, fmt_num};
pub use record::{CdxRecord, RecordError};
pub use shard_processor::{
    DEFAULT_BASE_URL, RunSummary, ShardDescriptor, ShardDriver, ShardStats, shard_url,
};
pub use sink::{AppendFileSink, RecordSink};
pub use stream::{
    GzipLines, HttpBody, HttpConfig, SHARED_RUNTIME, ShardSource, StreamError, http_config,
    open_shard, open_shard_with, set_http_config,
};
