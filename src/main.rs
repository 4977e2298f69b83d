//! cache-partition: replay an access trace through a partitioned cache.

use clap::Parser;
use tracing::{error, info};

use cache_partition::config::{Cli, Config};
use cache_partition::metrics::PartitionMetrics;
use cache_partition::sim::cache::SetAssocCache;
use cache_partition::sim::trace::{read_trace, replay};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "cache_partition=debug"
    } else {
        "cache_partition=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("cache-partition v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;
    let geometry = config.cache.geometry()?;

    info!(
        sets = geometry.sets,
        assoc = geometry.assoc,
        block_size = geometry.block_size,
        policies = config.policies.len(),
        "Configuration loaded"
    );

    let metrics = PartitionMetrics::new()?;
    let mut cache = SetAssocCache::from_config(&config)?.with_metrics(metrics.clone());

    let records = read_trace(&cli.trace)?;
    info!(records = records.len(), trace = %cli.trace.display(), "Trace loaded");

    let report = match replay(&mut cache, &records) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Replay aborted");
            return Err(e.into());
        }
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &cli.report {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }

    if cli.metrics {
        print!("{}", metrics.render()?);
    }

    Ok(())
}
