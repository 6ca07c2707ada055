//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: an indicatif bar per shard (cleared on completion).
//! Non-TTY mode: periodic log lines only.

use std::borrow::Cow;
use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Shared byte counter for progress tracking
pub type ByteCounter = Arc<AtomicU64>;

/// Log progress every N lines...
pub const LOG_EVERY_LINES: u64 = 100_000;

/// ...or after this much wall-clock time, whichever comes first
pub const LOG_EVERY: Duration = Duration::from_secs(10);

/// Maximum width of the MIME frequency snapshot in progress lines
pub const SUMMARY_WIDTH: usize = 100;

/// Per-shard byte accounting, readable while the stream is being decoded.
///
/// Cloning shares the counters.
#[derive(Debug, Clone, Default)]
pub struct ByteProgress {
    compressed: ByteCounter,
    decompressed: ByteCounter,
    total: Option<u64>,
}

impl ByteProgress {
    /// Fresh zeroed counters; `total` is the declared compressed length
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn compressed_bytes(&self) -> u64 {
        self.compressed.load(Ordering::Relaxed)
    }

    pub fn decompressed_bytes(&self) -> u64 {
        self.decompressed.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total
    }

    /// Share of the declared length consumed so far, in `[0, 100]`.
    ///
    /// `None` when the length is unknown or zero.
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.compressed_bytes() as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        }
    }

    /// `"12.34%"`, or `"?%"` when no percentage can be computed
    pub fn percent_label(&self) -> String {
        match self.percent() {
            Some(p) => format!("{p:.2}%"),
            None => "?%".to_string(),
        }
    }

    pub(crate) fn compressed_counter(&self) -> ByteCounter {
        self.compressed.clone()
    }

    pub(crate) fn decompressed_counter(&self) -> ByteCounter {
        self.decompressed.clone()
    }
}

/// Decides when the line loop should emit a progress report
#[derive(Debug)]
pub struct ProgressTicker {
    every_lines: u64,
    every: Duration,
    last: Instant,
}

impl ProgressTicker {
    pub fn new(now: Instant) -> Self {
        Self::with_intervals(LOG_EVERY_LINES, LOG_EVERY, now)
    }

    pub fn with_intervals(every_lines: u64, every: Duration, now: Instant) -> Self {
        Self {
            every_lines,
            every,
            last: now,
        }
    }

    /// True if a report is due after `lines` lines; resets the clock when it fires.
    pub fn tick(&mut self, lines: u64, now: Instant) -> bool {
        let due = lines.is_multiple_of(self.every_lines)
            || now.saturating_duration_since(self.last) > self.every;
        if due {
            self.last = now;
        }
        due
    }
}

/// Per-shard progress bar (green bar, binary bytes of compressed input)
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.dim} {bar:30.green/dim} {binary_bytes:>9}/{binary_total_bytes:9} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Pending style, shown before total bytes are known
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.dim} {binary_bytes:>9} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Upgrade a progress bar from pending to bytes bar.
///
/// Call this once the declared `Content-Length` is known.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(bar_style());
}

/// Central progress context managing the per-shard bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws bars (logs only)
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Create a shard progress bar.
    ///
    /// TTY: visible bar with pending style. Non-TTY: hidden (no-op).
    pub fn shard_bar(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        pb.set_prefix(name.to_string());
        pb.set_message("connecting...");
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Cut `s` to at most `max_chars` characters, ending in `...` when shortened.
pub fn abbreviate(s: &str, max_chars: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_chars {
        return Cow::Borrowed(s);
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(&"..."[..max_chars.min(3)]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_unknown_length() {
        let progress = ByteProgress::new(None);
        progress.compressed_counter().store(10, Ordering::Relaxed);
        assert_eq!(progress.percent(), None);
        assert_eq!(progress.percent_label(), "?%");
    }

    #[test]
    fn percent_zero_length_does_not_divide() {
        let progress = ByteProgress::new(Some(0));
        progress.compressed_counter().store(10, Ordering::Relaxed);
        assert_eq!(progress.percent(), None);
    }

    #[test]
    fn percent_of_declared_length() {
        let progress = ByteProgress::new(Some(200));
        progress.compressed_counter().store(50, Ordering::Relaxed);
        assert_eq!(progress.percent(), Some(25.0));
        assert_eq!(progress.percent_label(), "25.00%");
    }

    #[test]
    fn percent_clamped_when_server_understates_length() {
        let progress = ByteProgress::new(Some(100));
        progress.compressed_counter().store(150, Ordering::Relaxed);
        assert_eq!(progress.percent(), Some(100.0));
    }

    #[test]
    fn clones_share_counters() {
        let progress = ByteProgress::new(Some(10));
        let view = progress.clone();
        progress.decompressed_counter().fetch_add(7, Ordering::Relaxed);
        assert_eq!(view.decompressed_bytes(), 7);
    }

    #[test]
    fn ticker_fires_on_line_interval() {
        let start = Instant::now();
        let mut ticker = ProgressTicker::with_intervals(3, Duration::from_secs(3600), start);
        let fired: Vec<u64> = (1..=7).filter(|&n| ticker.tick(n, start)).collect();
        assert_eq!(fired, [3, 6]);
    }

    #[test]
    fn ticker_fires_on_elapsed_time() {
        let start = Instant::now();
        let mut ticker = ProgressTicker::with_intervals(1_000, Duration::from_secs(10), start);
        assert!(!ticker.tick(1, start + Duration::from_secs(5)));
        assert!(ticker.tick(2, start + Duration::from_secs(11)));
        // Clock was reset by the previous report
        assert!(!ticker.tick(3, start + Duration::from_secs(15)));
        assert!(ticker.tick(4, start + Duration::from_secs(22)));
    }

    #[test]
    fn fmt_num_zero() {
        assert_eq!(fmt_num(0), "0");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn abbreviate_short_unchanged() {
        assert_eq!(abbreviate("{a=1}", 100), "{a=1}");
    }

    #[test]
    fn abbreviate_long_is_capped() {
        let long = "x".repeat(150);
        let short = abbreviate(&long, 100);
        assert_eq!(short.chars().count(), 100);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn abbreviate_counts_chars_not_bytes() {
        let s = "é".repeat(10);
        assert_eq!(abbreviate(&s, 5), "éé...");
    }
}
