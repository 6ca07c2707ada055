//! CDX index line splitting: `<urlkey> <timestamp> <json payload>`

use crate::progress::abbreviate;

/// Width of the line excerpt carried in a [`RecordError`]
const EXCERPT_CHARS: usize = 100;

/// A CDX line split at its first two spaces. Borrows from the raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdxRecord<'a> {
    /// SURT-form URL key
    pub url_key: &'a str,
    /// 14-digit capture timestamp
    pub timestamp: &'a str,
    /// Everything after the second space; may itself contain spaces
    pub payload: &'a str,
}

/// A line without the two leading space-delimited fields.
///
/// Never skipped: a feed producing such lines is not trusted any further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    MissingUrlKeyEnd { excerpt: String },
    MissingTimestampEnd { excerpt: String },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUrlKeyEnd { excerpt } => {
                write!(f, "could not find end of url key in line: {excerpt}")
            }
            Self::MissingTimestampEnd { excerpt } => {
                write!(f, "could not find end of timestamp in line: {excerpt}")
            }
        }
    }
}

impl std::error::Error for RecordError {}

impl<'a> CdxRecord<'a> {
    pub fn parse(line: &'a str) -> Result<Self, RecordError> {
        let excerpt = || abbreviate(line, EXCERPT_CHARS).into_owned();

        let (url_key, rest) = line
            .split_once(' ')
            .ok_or_else(|| RecordError::MissingUrlKeyEnd { excerpt: excerpt() })?;
        let (timestamp, payload) = rest
            .split_once(' ')
            .ok_or_else(|| RecordError::MissingTimestampEnd { excerpt: excerpt() })?;

        Ok(Self {
            url_key,
            timestamp,
            payload,
        })
    }
}
