//! Shard driver: HTTP GET → multi-member gunzip → split → scan → match → append.
//!
//! Shards run strictly one after another in ascending index order. The first
//! error stops the run; on a streaming failure the connection is torn down
//! before the error propagates so the rest of a multi-GB body is never read.

use std::io::Read;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::error::ShardError;
use crate::matcher::{self, MatchOutcome, MimeCounter, RecordFilter};
use crate::payload::PayloadFields;
use crate::progress::{
    ByteProgress, ProgressContext, ProgressTicker, SUMMARY_WIDTH, fmt_num, upgrade_to_bar,
};
use crate::record::CdxRecord;
use crate::sink::RecordSink;
use crate::stream::{self, GzipLines, ShardSource, StreamError};

/// Public Common Crawl endpoint
pub const DEFAULT_BASE_URL: &str = "https://data.commoncrawl.org";

/// `<base>/cc-index/collections/<crawl>/indexes/cdx-<index:05>.gz`
pub fn shard_url(base_url: &str, crawl_id: &str, index: u32) -> String {
    format!(
        "{}/cc-index/collections/{crawl_id}/indexes/cdx-{index:05}.gz",
        base_url.trim_end_matches('/')
    )
}

/// One numbered index file of a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescriptor {
    pub index: u32,
    pub url: String,
}

impl ShardDescriptor {
    pub fn new(base_url: &str, crawl_id: &str, index: u32) -> Self {
        Self {
            index,
            url: shard_url(base_url, crawl_id, index),
        }
    }

    /// Shards for `indices` in ascending order (empty when start > end)
    pub fn range<'a>(
        base_url: &'a str,
        crawl_id: &'a str,
        indices: RangeInclusive<u32>,
    ) -> impl Iterator<Item = Self> + 'a {
        indices.map(move |index| Self::new(base_url, crawl_id, index))
    }

    /// `cdx-00042`
    pub fn label(&self) -> String {
        format!("cdx-{:05}", self.index)
    }
}

/// Statistics from streaming one shard end to end
#[derive(Debug, Clone, Default)]
pub struct ShardStats {
    pub index: u32,
    pub lines: u64,
    pub matched_by_mime: u64,
    pub matched_by_url: u64,
    pub compressed_bytes: u64,
    pub decompressed_bytes: u64,
    pub elapsed: Duration,
}

impl ShardStats {
    /// Lines written to the sink for this shard
    pub fn emitted(&self) -> u64 {
        self.matched_by_mime + self.matched_by_url
    }

    pub fn log(&self) {
        log::info!(
            "cdx-{:05}: {} lines, {} by mime, {} by url, {} compressed / {} bytes in {:.1}s",
            self.index,
            fmt_num(self.lines),
            self.matched_by_mime,
            self.matched_by_url,
            fmt_num(self.compressed_bytes),
            fmt_num(self.decompressed_bytes),
            self.elapsed.as_secs_f64()
        );
    }
}

/// Totals over all shards of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub shards: usize,
    pub lines: u64,
    pub emitted: u64,
    pub compressed_bytes: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    fn add(&mut self, stats: &ShardStats) {
        self.shards += 1;
        self.lines += stats.lines;
        self.emitted += stats.emitted();
        self.compressed_bytes += stats.compressed_bytes;
    }

    pub fn log(&self) {
        log::info!(
            "Run complete: {} shards, {} lines, {} records written in {:.1}s",
            self.shards,
            fmt_num(self.lines),
            fmt_num(self.emitted),
            self.elapsed.as_secs_f64()
        );
    }
}

/// Owns the run-wide state: predicates, output sink and MIME frequencies.
///
/// MIME counts accumulate across shards and are never reset.
pub struct ShardDriver<F, S> {
    filter: F,
    sink: S,
    mime_counts: MimeCounter,
}

impl<F: RecordFilter, S: RecordSink> ShardDriver<F, S> {
    pub fn new(filter: F, sink: S) -> Self {
        Self {
            filter,
            sink,
            mime_counts: MimeCounter::new(),
        }
    }

    pub fn mime_counts(&self) -> &MimeCounter {
        &self.mime_counts
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Fetch and process `shards` over HTTP, stopping at the first failure.
    pub fn run(
        &mut self,
        shards: impl IntoIterator<Item = ShardDescriptor>,
        progress: &ProgressContext,
    ) -> Result<RunSummary, ShardError> {
        self.run_with(shards, progress, |shard| stream::open_shard(&shard.url))
    }

    /// [`run`](Self::run) with a custom opener yielding the compressed body and
    /// its declared length.
    pub fn run_with<R, O>(
        &mut self,
        shards: impl IntoIterator<Item = ShardDescriptor>,
        progress: &ProgressContext,
        mut open: O,
    ) -> Result<RunSummary, ShardError>
    where
        R: ShardSource,
        O: FnMut(&ShardDescriptor) -> Result<(R, Option<u64>), StreamError>,
    {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        for shard in shards {
            let pb = progress.shard_bar(&shard.label());
            let result = self.open_and_process(&shard, &mut open, &pb);
            pb.finish_and_clear();

            let stats = result.inspect_err(|e| {
                log::error!("{}: failed, stopping run: {e}", shard.label());
            })?;
            stats.log();
            summary.add(&stats);
        }

        summary.elapsed = start.elapsed();
        summary.log();
        log::info!(
            "MIME types: {}",
            self.mime_counts.summary(SUMMARY_WIDTH)
        );
        Ok(summary)
    }

    fn open_and_process<R, O>(
        &mut self,
        shard: &ShardDescriptor,
        open: &mut O,
        pb: &ProgressBar,
    ) -> Result<ShardStats, ShardError>
    where
        R: ShardSource,
        O: FnMut(&ShardDescriptor) -> Result<(R, Option<u64>), StreamError>,
    {
        log::info!("Loading shard {} from {}", shard.index, shard.url);
        let (source, total_bytes) = open(shard).map_err(ShardError::Transport)?;

        match total_bytes {
            Some(total) => {
                log::info!("Shard {} has {} bytes", shard.index, fmt_num(total));
                upgrade_to_bar(pb, total);
            }
            None => log::info!("Shard {} has unknown length", shard.index),
        }
        pb.set_message("streaming...");

        self.process_source(shard.index, source, total_bytes, pb)
    }

    /// Stream one already-opened shard body to completion.
    ///
    /// On any error the source is aborted before the error is returned.
    pub fn process_source<R: ShardSource>(
        &mut self,
        index: u32,
        source: R,
        total_bytes: Option<u64>,
        pb: &ProgressBar,
    ) -> Result<ShardStats, ShardError> {
        let start = Instant::now();
        let mut lines = GzipLines::new(source, total_bytes);

        match self.drain_lines(index, &mut lines, pb) {
            Ok(mut stats) => {
                log::debug!(
                    "End of stream reached for shard {index} after {} lines",
                    stats.lines
                );
                stats.elapsed = start.elapsed();
                Ok(stats)
            }
            Err(e) => {
                log::warn!(
                    "Shard {index}: {} error, aborting connection: {e}",
                    e.kind()
                );
                lines.source_mut().abort();
                Err(e)
            }
        }
    }

    fn drain_lines<R: Read>(
        &mut self,
        index: u32,
        lines: &mut GzipLines<R>,
        pb: &ProgressBar,
    ) -> Result<ShardStats, ShardError> {
        let progress = lines.progress().clone();
        let mut ticker = ProgressTicker::new(Instant::now());
        let mut stats = ShardStats {
            index,
            ..ShardStats::default()
        };

        while let Some(line) = lines.next_line().map_err(ShardError::from_read_error)? {
            let outcome = self.process_line(&line)?;
            stats.matched_by_mime += u64::from(outcome.by_mime);
            stats.matched_by_url += u64::from(outcome.by_url);
            stats.lines += 1;

            if ticker.tick(stats.lines, Instant::now()) {
                self.report(index, stats.lines, &progress, pb);
            }
        }

        stats.compressed_bytes = progress.compressed_bytes();
        stats.decompressed_bytes = progress.decompressed_bytes();
        Ok(stats)
    }

    /// Split, scan and match a single raw CDX line.
    pub fn process_line(&mut self, line: &str) -> Result<MatchOutcome, ShardError> {
        let record = CdxRecord::parse(line)?;
        let fields = PayloadFields::scan(record.payload)?;
        matcher::evaluate(
            line,
            &fields,
            &self.filter,
            &mut self.mime_counts,
            &mut self.sink,
        )
    }

    fn report(&self, index: u32, lines: u64, progress: &ByteProgress, pb: &ProgressBar) {
        log::info!(
            "Shard {index}: {} lines, compressed bytes: {} of {} ({}), bytes: {}: {}",
            fmt_num(lines),
            fmt_num(progress.compressed_bytes()),
            progress
                .total_bytes()
                .map_or_else(|| "?".to_string(), fmt_num),
            progress.percent_label(),
            fmt_num(progress.decompressed_bytes()),
            self.mime_counts.summary(SUMMARY_WIDTH)
        );
        pb.set_position(progress.compressed_bytes());
        pb.set_message(format!("{} lines", fmt_num(lines)));
    }
}
