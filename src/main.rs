//! Rollup CLI
//!
//! Command-line interface for the aggregation core:
//! - Aggregate CSV shards over a time range
//! - Split a range at period boundaries
//! - Generate or show configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use rollup::aggregation::{AggregationKind, AggregationResult, BucketAggregation};
use rollup::cache::{AggregationDefinition, CachePutResult, CacheWriter, MemoryCache};
use rollup::cluster::{ClusterQuery, PointSource, QueryRunner, ShardRegistry};
use rollup::config::{generate_default_config, Config, LoggingConfig};
use rollup::import::{parse_timestamp, CsvImporter};
use rollup::time::TimeRange;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rollup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Distributed time-series aggregation core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate points from CSV shards
    Aggregate {
        /// One CSV file per shard
        #[arg(required = true)]
        shards: Vec<PathBuf>,
        /// Metric key
        #[arg(short, long)]
        key: String,
        /// Range start (ms or RFC 3339)
        #[arg(long)]
        start: String,
        /// Range end (ms or RFC 3339)
        #[arg(long)]
        end: String,
        /// Include the start instant instead of excluding it
        #[arg(long)]
        closed_start: bool,
        /// Aggregation (sum, count, min, max)
        #[arg(short, long)]
        aggregation: Option<AggregationKind>,
        /// Bucket size (ms)
        #[arg(long)]
        sampling: Option<i64>,
        /// Window length (ms)
        #[arg(long)]
        extent: Option<i64>,
        /// Tags to group by (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        group_by: Vec<String>,
    },

    /// Split a range at period boundaries
    Split {
        /// Range start (ms)
        start: i64,
        /// Range end (ms)
        end: i64,
        /// Period length (ms)
        period: i64,
        /// Include the start instant instead of excluding it
        #[arg(long)]
        closed_start: bool,
    },

    /// Generate default config file or show the effective one
    Config {
        /// Print the effective configuration instead of the template
        #[arg(long)]
        show: bool,
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };

    init_logging(&config.logging);

    match cli.command {
        Commands::Aggregate {
            shards,
            key,
            start,
            end,
            closed_start,
            aggregation,
            sampling,
            extent,
            group_by,
        } => {
            let start = parse_timestamp(&start).map_err(anyhow::Error::msg)?;
            let end = parse_timestamp(&end).map_err(anyhow::Error::msg)?;
            let range = if closed_start {
                TimeRange::with_closed_start(start, end)?
            } else {
                TimeRange::with_open_start(start, end)?
            };

            let base = config.aggregation()?;
            let size = sampling.unwrap_or(base.size());
            let aggregation = BucketAggregation::new(
                aggregation.unwrap_or(base.kind()),
                size,
                extent.or(config.aggregation.extent_ms).unwrap_or(size),
            )?;

            let group_by = if group_by.is_empty() {
                config.query.group_by.clone()
            } else {
                group_by
            };

            let importer = CsvImporter::new();
            let mut sources: Vec<Arc<dyn PointSource>> = Vec::with_capacity(shards.len());
            for (i, path) in shards.iter().enumerate() {
                let imported = importer
                    .import(&format!("shard-{}", i), path)
                    .with_context(|| format!("Failed to import {}", path.display()))?;
                for error in imported.errors.iter().take(5) {
                    eprintln!("{}: {}", path.display(), error);
                }
                sources.push(Arc::new(imported.source));
            }

            let registry = Arc::new(ShardRegistry::with_sources(sources));
            let runner = QueryRunner::new(registry, config.runner_config());

            let query = ClusterQuery::new(key, aggregation, range).group_by(group_by);
            tracing::info!(range = %query.range, shards = shards.len(), "Running query");

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let result = runner.run_with_cancel(&query, cancel).await?;
            tracing::info!(
                groups = result.groups.len(),
                points = result.statistics.points,
                dropped = result.statistics.dropped,
                failed_shards = result.statistics.failed_shards,
                "Query finished"
            );

            if config.cache.enabled {
                if let Some(put) = cache_result(&query, &result, config.cache.block_width).await? {
                    eprintln!(
                        "cache: {} blocks, {} samples written, {} skipped",
                        put.blocks, put.written, put.skipped
                    );
                }
            }

            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&result)?),
                _ => print_table(&result),
            }
        }

        Commands::Split {
            start,
            end,
            period,
            closed_start,
        } => {
            let range = if closed_start {
                TimeRange::with_closed_start(start, end)?
            } else {
                TimeRange::with_open_start(start, end)?
            };

            let pieces = range.split_at_period_boundary(period)?;
            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&pieces)?),
                _ => {
                    for piece in pieces {
                        println!("{}", piece);
                    }
                }
            }
        }

        Commands::Config { show, output } => {
            let content = if show {
                config.to_toml()?
            } else {
                generate_default_config()
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Write the result to an in-process cache and report what was stored
///
/// The process exits right after, so this only shows how the result would
/// be laid out in cache blocks. Returns `None` when the result is not
/// cacheable.
async fn cache_result(
    query: &ClusterQuery,
    result: &AggregationResult,
    block_width: i64,
) -> anyhow::Result<Option<CachePutResult>> {
    if !query.is_cacheable() {
        tracing::info!(range = %query.range, "Range not cacheable, skipping cache write");
        return Ok(None);
    }

    if result.is_partial() {
        tracing::warn!(
            failed_shards = result.statistics.failed_shards,
            "Partial result, skipping cache write"
        );
        return Ok(None);
    }

    let writer = CacheWriter::new(Arc::new(MemoryCache::new()), block_width)?;
    let definition = AggregationDefinition::from(&query.aggregation);
    let put = writer.put_result(&query.key, &definition, result).await?;

    tracing::info!(
        blocks = put.blocks,
        written = put.written,
        skipped = put.skipped,
        "Cached result"
    );

    Ok(Some(put))
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("rollup={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so query output on stdout stays parseable
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_table(result: &AggregationResult) {
    if result.is_empty() {
        println!("No data");
        return;
    }

    for group in &result.groups {
        let label = if group.key.is_empty() {
            "*".to_string()
        } else {
            group.key.to_string()
        };
        println!("{} ({} series)", label, group.series.len());

        for sample in &group.samples {
            let time = chrono::DateTime::from_timestamp_millis(sample.timestamp)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
                .unwrap_or_else(|| sample.timestamp.to_string());
            println!("  {:<24} {:>14.4}", time, sample.value);
        }
    }
}
