//! HTTP streaming of multi-member gzip shards with byte accounting.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface so the line loop stays a plain blocking pull.
//!
//! Layering, bottom to top:
//!
//! ```text
//! ShardSource (HTTP body) → SourceReader (compressed count, error tagging)
//!   → MultiGzDecoder → CountingReader (decompressed count) → BufReader (1 MiB)
//! ```

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read};
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::{LazyLock, OnceLock};
use std::task::Context;
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, ReadBuf};

use crate::progress::{ByteCounter, ByteProgress};

/// Line buffer size. Large on purpose: the source is a high-latency remote body.
pub const LINE_BUF_SIZE: usize = 1024 * 1024;

/// Transport settings shared by every request in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Maximum silence on an open body before the read fails
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(600),
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install process-wide HTTP settings.
///
/// Must be called before the first shard is opened; later calls are ignored.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already installed, ignoring {config:?}");
    }
}

/// Current HTTP settings (defaults if never installed)
pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Transport-level failure: bad status, connect error, or a broken body
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error on the response body
    Io(io::Error),
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
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Http { .. } => None,
        }
    }
}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(http_config().connect_timeout)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Byte source beneath the decompressor that can be torn down mid-body.
pub trait ShardSource: Read {
    /// Close the transport without draining whatever body remains.
    fn abort(&mut self);
}

impl<T: AsRef<[u8]>> ShardSource for io::Cursor<T> {
    fn abort(&mut self) {
        let end = self.get_ref().as_ref().len() as u64;
        self.set_position(end);
    }
}

/// HTTP GET a shard and return its body plus the declared `Content-Length`.
///
/// Uses the process-wide [`HttpConfig`]; see [`open_shard_with`].
pub fn open_shard(url: &str) -> Result<(HttpBody, Option<u64>), StreamError> {
    open_shard_with(url, http_config())
}

/// [`open_shard`] with explicit timeouts.
///
/// `read_timeout` bounds the wait for response headers as well as every
/// later body read. Non-2xx statuses, connect failures and a silent server
/// come back as [`StreamError::Http`].
pub fn open_shard_with(
    url: &str,
    config: &HttpConfig,
) -> Result<(HttpBody, Option<u64>), StreamError> {
    let read_timeout = config.read_timeout;
    let (inner, total_bytes) = SHARED_RUNTIME.handle().block_on(async {
        // Not `RequestBuilder::timeout`: that deadline also covers the body
        let send = SHARED_CLIENT.get(url).send();
        let response = match tokio::time::timeout(read_timeout, send).await {
            Ok(result) => result,
            Err(_) => {
                return Err(StreamError::Http {
                    status: None,
                    message: format!(
                        "response timeout ({}s with no headers)",
                        read_timeout.as_secs()
                    ),
                });
            }
        }
        .and_then(|r| r.error_for_status())
        .map_err(|e| StreamError::from_reqwest(&e))?;

        let total_bytes = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        // Convert response body stream to AsyncRead
        let stream = response.bytes_stream();
        let async_reader = tokio_util::io::StreamReader::new(
            stream.map(|result| result.map_err(io::Error::other)),
        );
        let inner: Pin<Box<dyn AsyncRead + Send>> = Box::pin(async_reader);

        Ok::<_, StreamError>((inner, total_bytes))
    })?;

    Ok((
        HttpBody {
            inner: Some(inner),
            read_timeout,
        },
        total_bytes,
    ))
}

/// Async-to-sync bridge over a response body with a per-read timeout.
///
/// Dropping the body (or calling [`ShardSource::abort`]) closes the
/// connection without reading the rest of it.
pub struct HttpBody {
    inner: Option<Pin<Box<dyn AsyncRead + Send>>>,
    read_timeout: Duration,
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBody")
            .field("open", &self.inner.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl Read for HttpBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read_timeout = self.read_timeout;
        let Some(inner) = self.inner.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already aborted",
            ));
        };

        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    inner.as_mut().poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(read_timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read timeout ({}s with no data)", read_timeout.as_secs()),
                )),
            }
        })
    }
}

impl ShardSource for HttpBody {
    fn abort(&mut self) {
        if self.inner.take().is_some() {
            log::debug!("HTTP body dropped before end of stream");
        }
    }
}

/// Marker for errors raised by the transport underneath the decompressor.
///
/// Lets callers tell a broken connection apart from corrupt gzip data once
/// both have surfaced as `io::Error` from the line reader.
#[derive(Debug)]
pub struct TransportFailure(pub io::Error);

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport: {}", self.0)
    }
}

impl std::error::Error for TransportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Compressed-side reader: counts raw bytes and tags transport errors
struct SourceReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for SourceReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                self.count.fetch_add(n as u64, Ordering::Relaxed);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => Err(io::Error::new(e.kind(), TransportFailure(e))),
        }
    }
}

/// Reader wrapper that tracks bytes read
struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Lazy line sequence over a concatenation of gzip members.
///
/// Member boundaries are crossed transparently. Byte counters on both sides
/// of the decoder are exposed through [`GzipLines::progress`] and advance as
/// data is pulled, not only at end of stream.
pub struct GzipLines<R> {
    reader: BufReader<CountingReader<MultiGzDecoder<SourceReader<R>>>>,
    progress: ByteProgress,
    line: Vec<u8>,
}

impl<R: Read> GzipLines<R> {
    /// Wrap a compressed source; `total_bytes` is the declared compressed length
    pub fn new(source: R, total_bytes: Option<u64>) -> Self {
        Self::with_capacity(LINE_BUF_SIZE, source, total_bytes)
    }

    pub fn with_capacity(capacity: usize, source: R, total_bytes: Option<u64>) -> Self {
        let progress = ByteProgress::new(total_bytes);
        let source = SourceReader {
            inner: source,
            count: progress.compressed_counter(),
        };
        let decompressed = CountingReader {
            inner: MultiGzDecoder::new(source),
            count: progress.decompressed_counter(),
        };
        Self {
            reader: BufReader::with_capacity(capacity, decompressed),
            progress,
            line: Vec::with_capacity(4096),
        }
    }

    /// Shared handle on the byte counters for this stream
    pub fn progress(&self) -> &ByteProgress {
        &self.progress
    }

    /// Next line without its `\n` / `\r\n` terminator, or `None` at end of stream.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Corrupt or truncated
    /// gzip data fails the read.
    pub fn next_line(&mut self) -> io::Result<Option<Cow<'_, str>>> {
        self.line.clear();
        if self.reader.read_until(b'\n', &mut self.line)? == 0 {
            return Ok(None);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.line)))
    }

    /// Underlying compressed source (for aborting the transport)
    pub fn source_mut(&mut self) -> &mut R {
        &mut self.reader.get_mut().inner.get_mut().inner
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// Compress `text` as a single gzip member
    pub(crate) fn gz_member(text: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    /// Concatenate independently compressed members
    pub(crate) fn gz_members(members: &[&str]) -> Vec<u8> {
        members.iter().flat_map(|m| gz_member(m)).collect()
    }

    fn collect_lines<R: Read>(lines: &mut GzipLines<R>) -> io::Result<Vec<String>> {
        let mut out = Vec::new();
        while let Some(line) = lines.next_line()? {
            out.push(line.into_owned());
        }
        Ok(out)
    }

    fn single_member_lines(text: &str) -> Vec<String> {
        let mut lines = GzipLines::new(Cursor::new(gz_member(text)), None);
        collect_lines(&mut lines).unwrap()
    }

    #[test]
    fn multi_member_matches_per_member_decoding() {
        let members = ["a 1 {}\nb 2 {}\n", "c 3 {}\n", "d 4 {}\ne 5 {}\nf 6 {}\n"];
        let data = gz_members(&members);

        let mut lines = GzipLines::new(Cursor::new(data), None);
        let got = collect_lines(&mut lines).unwrap();

        let expected: Vec<String> = members
            .iter()
            .flat_map(|m| single_member_lines(m))
            .collect();
        assert_eq!(got, expected);
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn line_split_across_member_boundary() {
        // Members are byte streams; a line may straddle two of them.
        let data = gz_members(&["first li", "ne\nsecond\n"]);
        let mut lines = GzipLines::new(Cursor::new(data), None);
        assert_eq!(collect_lines(&mut lines).unwrap(), ["first line", "second"]);
    }

    #[test]
    fn byte_counters_cover_both_sides() {
        let members = ["x y {\"mime\":\"text/html\"}\n", "z w {\"mime\":\"text/css\"}\n"];
        let data = gz_members(&members);
        let compressed_len = data.len() as u64;
        let plain_len: usize = members.iter().map(|m| m.len()).sum();

        let mut lines = GzipLines::new(Cursor::new(data), Some(compressed_len));
        let progress = lines.progress().clone();
        collect_lines(&mut lines).unwrap();

        assert_eq!(progress.compressed_bytes(), compressed_len);
        assert_eq!(progress.decompressed_bytes(), plain_len as u64);
        assert_eq!(progress.total_bytes(), Some(compressed_len));
    }

    #[test]
    fn counters_advance_before_end_of_stream() {
        let body: String = (0..2000).map(|i| format!("k{i} t {{}}\n")).collect();
        let data = gz_member(&body);
        let mut lines = GzipLines::with_capacity(64, Cursor::new(data), None);
        let progress = lines.progress().clone();

        lines.next_line().unwrap().unwrap();
        assert!(progress.compressed_bytes() > 0);
        assert!(progress.decompressed_bytes() > 0);
        assert!(progress.decompressed_bytes() < body.len() as u64);
    }

    #[test]
    fn strips_crlf_and_keeps_unterminated_last_line() {
        let data = gz_member("one\r\ntwo\nthree");
        let mut lines = GzipLines::new(Cursor::new(data), None);
        assert_eq!(collect_lines(&mut lines).unwrap(), ["one", "two", "three"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"a\xffb\n").unwrap();
        let data = enc.finish().unwrap();

        let mut lines = GzipLines::new(Cursor::new(data), None);
        assert_eq!(collect_lines(&mut lines).unwrap(), ["a\u{fffd}b"]);
    }

    #[test]
    fn truncated_member_fails() {
        let first = gz_member("a b {}\n");
        let body: String = (0..500).map(|i| format!("key{i} ts {{}}\n")).collect();
        let second = gz_member(&body);
        let mut data = first;
        data.extend_from_slice(&second[..second.len() / 2]);

        let mut lines = GzipLines::new(Cursor::new(data), None);
        assert!(collect_lines(&mut lines).is_err());
    }

    #[test]
    fn garbage_input_fails() {
        let mut lines = GzipLines::new(Cursor::new(b"definitely not gzip".to_vec()), None);
        assert!(lines.next_line().is_err());
    }

    struct BrokenSource;

    impl Read for BrokenSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"))
        }
    }

    #[test]
    fn source_errors_are_tagged_as_transport() {
        let mut lines = GzipLines::new(BrokenSource, None);
        let err = lines.next_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(
            err.get_ref()
                .is_some_and(|inner| inner.is::<TransportFailure>())
        );
    }

    #[test]
    fn cursor_abort_ends_stream() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        cursor.abort();
        let mut buf = [0u8; 3];
        assert_eq!(cursor.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn default_http_config_is_long_read_timeout() {
        let config = HttpConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(600));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn display_http_with_status() {
        let err = StreamError::Http {
            status: Some(404),
            message: "test".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = StreamError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
    }
}
