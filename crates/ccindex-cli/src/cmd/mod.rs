pub mod scan;
pub mod shards;

use clap::Args;

use crate::config::Config;

/// Overrides for the crawl and shard range
#[derive(Args, Debug, Default)]
pub struct RangeArgs {
    /// Crawl identifier (e.g. CC-MAIN-2017-34)
    #[arg(long)]
    pub crawl: Option<String>,

    /// First shard index (inclusive)
    #[arg(long)]
    pub start: Option<u32>,

    /// Last shard index (inclusive)
    #[arg(long)]
    pub end: Option<u32>,
}

impl RangeArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(crawl) = &self.crawl {
            config.crawl.id.clone_from(crawl);
        }
        if let Some(start) = self.start {
            config.crawl.start = start;
        }
        if let Some(end) = self.end {
            config.crawl.end = end;
        }
    }
}
