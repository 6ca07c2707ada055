//! ccindex - scan Common Crawl CDX indexes for matching captures
//!
//! Streams the gzip index shards of one crawl and appends every line whose
//! URL extension or MIME type matches the configured lists.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ccindex")]
#[command(about = "Scan Common Crawl CDX indexes for matching captures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./ccindex.toml or ~/.config/ccindex/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Stream shards and append matching records
    Scan(cmd::scan::ScanArgs),
    /// Print shard URLs for the configured range
    Shards(cmd::shards::ShardsArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = ccindex_core::ProgressContext::new();

    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    ccindex_core::init_logging(
        ccindex_core::Verbosity::from_flags(cli.quiet, cli.debug),
        multi,
    )
    .context("failed to install logger")?;

    // Load configuration
    let mut config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // Apply HTTP settings (config file defaults, CLI overrides)
    if let Some(secs) = cli.read_timeout {
        config.http.read_timeout = secs;
    }
    if let Some(secs) = cli.connect_timeout {
        config.http.connect_timeout = secs;
    }
    ccindex_core::set_http_config(config.http_config());

    match cli.command {
        Command::Scan(args) => cmd::scan::run(args, &config, &progress),
        Command::Shards(args) => cmd::shards::run(args, &config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Crawl", &config.crawl.id]);
            table.add_row(vec!["Base URL", &config.crawl.base_url]);
            table.add_row(vec![
                "Shards",
                &format!("{}..={}", config.crawl.start, config.crawl.end),
            ]);
            table.add_row(vec![
                "Output file",
                &config.output_path().display().to_string(),
            ]);
            table.add_row(vec![
                "Connect timeout",
                &format!("{}s", config.http.connect_timeout),
            ]);
            table.add_row(vec![
                "Read timeout",
                &format!("{}s", config.http.read_timeout),
            ]);
            table.add_row(vec!["Extensions", &config.matching.extensions.join(" ")]);
            table.add_row(vec![
                "MIME types",
                &format!("{} configured", config.matching.mime_types.len()),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
