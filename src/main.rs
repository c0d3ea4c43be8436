//! College Basketball Data Collector
//!
//! Collects one season of college basketball data and writes it under the
//! output directory:
//! - Teams roster, then per-team games, season stats, betting lines, ratings
//! - Parallel fan-out by default, `--sequential` for a throttled single lane
//! - Two-tier cache so repeated runs skip the network

use anyhow::Result;
use cbb_data_collector::progress::report_failure;
use cbb_data_collector::{
    CbbApi, CollectionCache, Collector, Config, FetchMode, HttpTransport, LogProgress, OutputLayout, ProgressSink,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cbb-collector", version, about = "Collect a season of college basketball data")]
struct Cli {
    /// Season to collect (ending year, e.g. 2025 for 2024-25)
    #[arg(long, env = "SEASON", default_value = "2025")]
    season: String,

    /// Only collect the first N teams of the roster (0 = all)
    #[arg(long, env = "MAX_TEAMS", default_value_t = 0)]
    max_teams: usize,

    /// Fetch one team at a time with a fixed pause between teams
    #[arg(long, env = "SEQUENTIAL")]
    sequential: bool,

    /// Fetch full-season collections first so per-team requests hit the cache
    #[arg(long, env = "PREFETCH")]
    prefetch: bool,

    /// Skip the on-disk cache entirely
    #[arg(long, env = "NO_CACHE")]
    no_cache: bool,
}

fn build_collector<'p>(cli: &Cli, config: &Config, progress: &'p dyn ProgressSink) -> Result<Collector<'p>> {
    let mode = if cli.sequential {
        FetchMode::Sequential {
            delay: config.sequential_delay,
        }
    } else {
        FetchMode::Parallel {
            max_workers: config.max_workers,
        }
    };

    let cache = if cli.no_cache {
        info!("Cache disabled");
        CollectionCache::disabled()
    } else {
        CollectionCache::open(&config.cache_dir)
    };

    let transport = Arc::new(HttpTransport::new(config)?);
    let api = CbbApi::new(transport, cache);

    Ok(Collector::new(api, OutputLayout::new(&config.output_dir), progress)
        .with_mode(mode)
        .with_max_teams(cli.max_teams)
        .with_prefetch(cli.prefetch))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cbb_data_collector=info".parse()?)
                .add_directive("cbb_collector=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("College Basketball Data Collector v{}", env!("CARGO_PKG_VERSION"));

    let progress = LogProgress::default();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            report_failure(&progress, "Configuration failed", &e);
            return Err(e);
        }
    };
    let collector = match build_collector(&cli, &config, &progress) {
        Ok(collector) => collector,
        Err(e) => {
            report_failure(&progress, "Failed to set up the collector", &e);
            return Err(e);
        }
    };

    match collector.collect_comprehensive_data(&cli.season).await {
        Ok(report) => {
            info!(
                "Collected season {} for {} teams; {} files written to {}",
                report.season,
                report.teams,
                report.written.len(),
                config.output_dir.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Collection failed: {:?}", e);
            Err(e.into())
        }
    }
}
