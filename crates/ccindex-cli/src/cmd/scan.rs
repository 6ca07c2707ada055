//! Scan subcommand - stream shards and append matching records

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use ccindex_core::{AppendFileSink, ProgressContext, ShardDescriptor, ShardDriver, fmt_num};

use super::RangeArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Output file (appended to, never truncated)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: ScanArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let mut config = config.clone();
    args.range.apply(&mut config);
    if let Some(output) = args.output {
        config.output.path = Some(output);
    }
    config.validate()?;

    let output = config.output_path();
    let sink = AppendFileSink::open(&output)
        .with_context(|| format!("Failed to open output file: {}", output.display()))?;
    let filter = config.filter();
    log::info!(
        "Processing index files {}..={} of {} into {} ({} extensions, {} MIME types)",
        config.crawl.start,
        config.crawl.end,
        config.crawl.id,
        output.display(),
        filter.extensions().len(),
        filter.mime_type_count()
    );

    let shards = ShardDescriptor::range(
        &config.crawl.base_url,
        &config.crawl.id,
        config.crawl.start..=config.crawl.end,
    );
    let mut driver = ShardDriver::new(filter, sink);
    let summary = driver
        .run(shards, progress)
        .with_context(|| format!("Scan of {} aborted", config.crawl.id))?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Shards").fg(Color::Cyan),
            Cell::new("Lines").fg(Color::Cyan),
            Cell::new("Written").fg(Color::Cyan),
            Cell::new("Downloaded").fg(Color::Cyan),
            Cell::new("Elapsed").fg(Color::Cyan),
        ]);
    table.add_row(vec![
        summary.shards.to_string(),
        fmt_num(summary.lines),
        fmt_num(summary.emitted),
        format!("{} bytes", fmt_num(summary.compressed_bytes)),
        format!("{:.1}s", summary.elapsed.as_secs_f64()),
    ]);
    progress.println(format!("\n{table}"));
    progress.println(format!("Matches appended to {}", output.display()));

    Ok(())
}
