//! Pull-based extraction of `mime` and `url` from a CDX JSON payload.
//!
//! Walks the top-level object key by key with sonic-rs' lazy object iterator.
//! Other values (status, digest, length, offset, filename) are skipped without
//! being materialized, which matters at hundreds of millions of lines per run.

use sonic_rs::JsonValueTrait;

use crate::progress::abbreviate;

const EXCERPT_CHARS: usize = 100;

/// The two payload fields the matcher cares about, lower-cased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFields {
    pub mime: Option<String>,
    pub url: Option<String>,
}

/// Payload is not a well-formed JSON object
#[derive(Debug)]
pub struct PayloadError {
    source: sonic_rs::Error,
    excerpt: String,
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid payload ({}): {}", self.source, self.excerpt)
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl PayloadFields {
    /// Scan `payload` up to the object's closing brace.
    ///
    /// Only string values are captured; `"mime": 5` leaves `mime` unset. A
    /// repeated key keeps its last string value.
    pub fn scan(payload: &str) -> Result<Self, PayloadError> {
        let mut fields = Self::default();
        for entry in sonic_rs::to_object_iter(payload) {
            let (key, value) = entry.map_err(|source| PayloadError {
                source,
                excerpt: abbreviate(payload, EXCERPT_CHARS).into_owned(),
            })?;
            let slot = match &*key {
                "mime" => &mut fields.mime,
                "url" => &mut fields.url,
                _ => continue,
            };
            if let Some(s) = value.as_str() {
                *slot = Some(s.to_lowercase());
            }
        }
        Ok(fields)
    }
}
