//! Error taxonomy for shard processing.
//!
//! Every variant is fatal: the run stops at the first failing shard.

use std::io;

use crate::payload::PayloadError;
use crate::record::RecordError;
use crate::stream::{StreamError, TransportFailure};

/// Error from processing a single shard (open + stream + match + append).
#[derive(Debug)]
pub enum ShardError {
    /// Connect failure, non-2xx status, or the body broke mid-stream
    Transport(StreamError),
    /// Corrupt or truncated gzip data
    Decode(io::Error),
    /// Line without the two space-delimited prefix fields
    MalformedRecord(RecordError),
    /// Payload is not a flat JSON object
    PayloadParse(PayloadError),
    /// Appending a matched line to the output failed
    SinkWrite(io::Error),
}

impl std::fmt::Display for ShardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::MalformedRecord(e) => write!(f, "malformed record: {e}"),
            Self::PayloadParse(e) => write!(f, "{e}"),
            Self::SinkWrite(e) => write!(f, "sink write: {e}"),
        }
    }
}

impl std::error::Error for ShardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) | Self::SinkWrite(e) => Some(e),
            Self::MalformedRecord(e) => Some(e),
            Self::PayloadParse(e) => Some(e),
        }
    }
}

impl ShardError {
    /// Classify an error surfaced by the line reader.
    ///
    /// Errors tagged by the source reader are transport failures; anything
    /// else came out of the decompressor.
    pub fn from_read_error(e: io::Error) -> Self {
        if !e
            .get_ref()
            .is_some_and(|inner| inner.is::<TransportFailure>())
        {
            return Self::Decode(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<TransportFailure>()) {
            Some(Ok(failure)) => Self::Transport(StreamError::Io(failure.0)),
            // Checked above; kept total rather than panicking
            _ => Self::Decode(io::Error::other("transport failure lost its payload")),
        }
    }

    /// Short name of the error class, for logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::MalformedRecord(_) => "malformed record",
            Self::PayloadParse(_) => "payload parse",
            Self::SinkWrite(_) => "sink write",
        }
    }
}

impl From<RecordError> for ShardError {
    fn from(e: RecordError) -> Self {
        Self::MalformedRecord(e)
    }
}

impl From<PayloadError> for ShardError {
    fn from(e: PayloadError) -> Self {
        Self::PayloadParse(e)
    }
}
