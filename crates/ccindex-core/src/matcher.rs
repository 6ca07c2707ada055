//! Match evaluation: MIME frequency counting plus URL / MIME predicates

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ShardError;
use crate::payload::PayloadFields;
use crate::progress::abbreviate;
use crate::sink::RecordSink;

/// Extensions targeted by the default filter (office documents)
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".doc", ".docx", ".dot", ".dotx", ".xls", ".xlsx", ".xlsm", ".xlt", ".ppt", ".pptx", ".pps",
    ".ppsx", ".vsd", ".vsdx", ".pub", ".msg",
];

/// MIME types targeted by the default filter
pub const DEFAULT_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "application/vnd.visio",
    "application/vnd.ms-outlook",
    "application/x-mspublisher",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

/// Record selection predicates. Both receive lower-cased input and must be pure.
pub trait RecordFilter {
    fn url_matches(&self, url: &str) -> bool;
    fn mime_matches(&self, mime: &str) -> bool;
}

impl<F: RecordFilter + ?Sized> RecordFilter for &F {
    fn url_matches(&self, url: &str) -> bool {
        (**self).url_matches(url)
    }

    fn mime_matches(&self, mime: &str) -> bool {
        (**self).mime_matches(mime)
    }
}

/// Filter built from two closures
#[derive(Debug, Clone, Copy)]
pub struct FnFilter<U, M> {
    url: U,
    mime: M,
}

impl<U, M> FnFilter<U, M>
where
    U: Fn(&str) -> bool,
    M: Fn(&str) -> bool,
{
    pub fn new(url: U, mime: M) -> Self {
        Self { url, mime }
    }
}

impl<U, M> RecordFilter for FnFilter<U, M>
where
    U: Fn(&str) -> bool,
    M: Fn(&str) -> bool,
{
    fn url_matches(&self, url: &str) -> bool {
        (self.url)(url)
    }

    fn mime_matches(&self, mime: &str) -> bool {
        (self.mime)(mime)
    }
}

/// URL extension suffixes plus an exact MIME type set.
///
/// Query strings and fragments are ignored when testing the URL suffix.
/// Empty lists never match.
#[derive(Debug, Clone, Default)]
pub struct SuffixFilter {
    extensions: Vec<String>,
    mime_types: FxHashSet<String>,
}

impl SuffixFilter {
    pub fn new<E, M>(extensions: E, mime_types: M) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty() && e != ".")
            .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
            .collect();
        let mime_types = mime_types
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self {
            extensions,
            mime_types,
        }
    }

    /// Office document extensions and MIME types
    pub fn office_documents() -> Self {
        Self::new(DEFAULT_EXTENSIONS, DEFAULT_MIME_TYPES)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn mime_type_count(&self) -> usize {
        self.mime_types.len()
    }
}

impl RecordFilter for SuffixFilter {
    fn url_matches(&self, url: &str) -> bool {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    fn mime_matches(&self, mime: &str) -> bool {
        self.mime_types.contains(mime)
    }
}

/// Occurrences per lower-cased MIME type, kept for the whole run
#[derive(Debug, Clone, Default)]
pub struct MimeCounter {
    counts: FxHashMap<String, u64>,
}

impl MimeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence (case-insensitive)
    pub fn record(&mut self, mime: &str) {
        if mime.chars().any(char::is_uppercase) {
            *self.counts.entry(mime.to_lowercase()).or_insert(0) += 1;
        } else if let Some(n) = self.counts.get_mut(mime) {
            *n += 1;
        } else {
            self.counts.insert(mime.to_string(), 1);
        }
    }

    pub fn get(&self, mime: &str) -> u64 {
        self.counts.get(mime).copied().unwrap_or(0)
    }

    /// Number of distinct types seen
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries by descending count, ties by name
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> =
            self.counts.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// `{text/html=3, application/pdf=1}` cut to `max_chars`
    pub fn summary(&self, max_chars: usize) -> String {
        let mut out = String::from("{");
        for (i, (mime, count)) in self.sorted().into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(mime);
            out.push('=');
            out.push_str(&count.to_string());
            // Everything past the cut is discarded anyway
            if out.len() > max_chars * 4 {
                break;
            }
        }
        out.push('}');
        abbreviate(&out, max_chars).into_owned()
    }
}

/// Which checks fired for one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub by_mime: bool,
    pub by_url: bool,
}

impl MatchOutcome {
    /// Lines written to the sink (a line matching both checks is written twice)
    pub fn emitted(&self) -> u64 {
        u64::from(self.by_mime) + u64::from(self.by_url)
    }
}

/// Count the MIME type, run both predicates, and echo `line` to `sink` per hit.
///
/// The two checks are independent; no deduplication happens between them.
pub fn evaluate<F, S>(
    line: &str,
    fields: &PayloadFields,
    filter: &F,
    counts: &mut MimeCounter,
    sink: &mut S,
) -> Result<MatchOutcome, ShardError>
where
    F: RecordFilter + ?Sized,
    S: RecordSink + ?Sized,
{
    let mut outcome = MatchOutcome::default();

    if let Some(mime) = fields.mime.as_deref() {
        counts.record(mime);
        if filter.mime_matches(mime) {
            log::info!("Found by mime: {line}");
            sink.emit(line).map_err(ShardError::SinkWrite)?;
            outcome.by_mime = true;
        }
    }

    if let Some(url) = fields.url.as_deref() {
        if filter.url_matches(url) {
            log::info!("Found by url: {line}");
            sink.emit(line).map_err(ShardError::SinkWrite)?;
            outcome.by_url = true;
        }
    }

    Ok(outcome)
}
