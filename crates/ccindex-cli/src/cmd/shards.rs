//! Shards subcommand - list shard URLs without fetching them

use anyhow::Result;
use clap::Args;

use ccindex_core::ShardDescriptor;

use super::RangeArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ShardsArgs {
    #[command(flatten)]
    pub range: RangeArgs,
}

pub fn run(args: ShardsArgs, config: &Config) -> Result<()> {
    let mut config = config.clone();
    args.range.apply(&mut config);
    config.validate()?;

    for shard in shard_list(&config) {
        println!("{}", shard.url);
    }
    Ok(())
}

fn shard_list(config: &Config) -> Vec<ShardDescriptor> {
    ShardDescriptor::range(
        &config.crawl.base_url,
        &config.crawl.id,
        config.crawl.start..=config.crawl.end,
    )
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_configured_range() {
        let mut config = Config::default();
        config.crawl.start = 298;
        let shards = shard_list(&config);
        assert_eq!(shards.len(), 2);
        assert!(shards[1].url.ends_with("/CC-MAIN-2017-34/indexes/cdx-00299.gz"));
    }
}
