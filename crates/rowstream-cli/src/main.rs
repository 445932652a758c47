//! rowstream CLI: stream, batch and aggregate a table without loading it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use rowstream_core::aggregation::Aggregation;
use rowstream_core::config::{ConfigFile, StreamConfig};
use rowstream_core::record::UserRecord;
use rowstream_core::types::Row;
use rowstream_store::{DriverRegistry, MemoryDriver};
use rowstream_stream::filter::{Comparison, IntoRows, RowPredicate, StreamExt};
use rowstream_stream::users::calculate_average_age;
use rowstream_stream::{Aggregator, StreamFactory};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Database name of the built-in sample store (`memory://demo`).
const DEMO_DATABASE: &str = "demo";

#[derive(Parser)]
#[command(name = "rowstream")]
#[command(about = "Stream rows from a table in bounded memory", long_about = None)]
struct Cli {
    /// YAML config file (dsn, table, batch_size, cache_capacity, cache_ttl_ms)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct SourceArgs {
    /// Store DSN, e.g. csv:///var/lib/users or memory://demo
    #[arg(long)]
    dsn: Option<String>,

    /// Table to read (default: user_data)
    #[arg(long)]
    table: Option<String>,

    /// Keep only rows matching "<column> <op> <literal>"
    #[arg(long = "where")]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print rows as JSON lines, one fetch per row
    Stream {
        #[command(flatten)]
        source: SourceArgs,

        /// Stop after this many rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print one summary line per fetched batch
    Batches {
        #[command(flatten)]
        source: SourceArgs,

        /// Rows per fetch (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Compute aggregations in a single pass
    Aggregate {
        #[command(flatten)]
        source: SourceArgs,

        /// Read in batches of this size instead of row by row
        #[arg(long)]
        batch_size: Option<usize>,

        /// count | sum:COL | avg:COL | min:COL | max:COL (repeatable)
        #[arg(long = "agg", required = true)]
        aggregations: Vec<Aggregation>,
    },

    /// Print the average age of all users
    AvgAge {
        #[arg(long)]
        dsn: Option<String>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = run(cli, &mut out) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli, out: &mut impl Write) -> CliResult<()> {
    let registry = Arc::new(demo_registry()?);
    match cli.command {
        Commands::Stream { source, limit } => {
            let cfg = load_config(cli.config.as_deref(), &source, None)?;
            let factory = StreamFactory::from_config(registry, &cfg)?;
            stream_rows(&factory, source.filter.as_deref(), limit, out)
        }
        Commands::Batches { source, batch_size } => {
            let cfg = load_config(cli.config.as_deref(), &source, batch_size)?;
            let factory = StreamFactory::from_config(registry, &cfg)?;
            print_batches(&factory, source.filter.as_deref(), out)
        }
        Commands::Aggregate {
            source,
            batch_size,
            aggregations,
        } => {
            let cfg = load_config(cli.config.as_deref(), &source, batch_size)?;
            let factory = StreamFactory::from_config(registry, &cfg)?;
            let batched = batch_size.is_some();
            aggregate(&factory, source.filter.as_deref(), batched, aggregations, out)
        }
        Commands::AvgAge { dsn } => {
            let source = SourceArgs {
                dsn,
                ..Default::default()
            };
            let cfg = load_config(cli.config.as_deref(), &source, None)?;
            let factory = StreamFactory::from_config(registry, &cfg)?;
            let avg = calculate_average_age(&factory)?;
            writeln!(out, "Average age of users: {:.2}", avg)?;
            Ok(())
        }
    }
}

/// Defaults < environment < YAML file < flags.
fn load_config(
    path: Option<&Path>,
    source: &SourceArgs,
    batch_size: Option<usize>,
) -> CliResult<StreamConfig> {
    let mut cfg = StreamConfig::from_env();
    if let Some(path) = path {
        let yaml = fs::read_to_string(path)?;
        ConfigFile::from_yaml_str(&yaml)?.apply_to(&mut cfg);
    }
    if let Some(dsn) = &source.dsn {
        cfg.dsn = Some(dsn.clone());
    }
    if let Some(table) = &source.table {
        cfg.table = table.clone();
    }
    if let Some(n) = batch_size {
        cfg.batch_size = n;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Default drivers, with `memory://demo` holding a few sample users.
fn demo_registry() -> CliResult<DriverRegistry> {
    let memory = MemoryDriver::new();
    let users = [
        ("Dan Altenwerth", "Molly59@gmail.com", 35),
        ("Glenda Wisozk", "Miriam21@gmail.com", 42),
        ("Daniel Fahey IV", "Delia.Lesch11@hotmail.com", 28),
        ("Ronnie Bechtelar", "Sandra19@yahoo.com", 45),
        ("Alma Bechtelar", "Shelly_Balistreri22@hotmail.com", 39),
    ];
    let records: Vec<UserRecord> = users
        .iter()
        .zip(1u128..)
        .map(|(&(name, email, age), n)| UserRecord::new(Uuid::from_u128(n), name, email, age))
        .collect();
    memory.insert_users(DEMO_DATABASE, &records)?;
    Ok(DriverRegistry::with_defaults(memory))
}

/// Rows of `stream`, filtered by `expr` when given.
fn filtered<I, T>(stream: I, expr: Option<&str>) -> CliResult<Box<dyn Iterator<Item = rowstream_core::Result<Row>>>>
where
    I: Iterator<Item = rowstream_core::Result<T>> + 'static,
    T: IntoRows + 'static,
{
    Ok(match expr {
        Some(expr) => Box::new(stream.where_expr(expr)?),
        None => Box::new(stream.rows()),
    })
}

fn stream_rows(
    factory: &StreamFactory,
    expr: Option<&str>,
    limit: Option<usize>,
    out: &mut impl Write,
) -> CliResult<()> {
    let rows = filtered(factory.rows(), expr)?;
    for row in rows.take(limit.unwrap_or(usize::MAX)) {
        writeln!(out, "{}", row?.to_json())?;
    }
    Ok(())
}

fn print_batches(factory: &StreamFactory, expr: Option<&str>, out: &mut impl Write) -> CliResult<()> {
    let mut predicate = expr.map(Comparison::parse).transpose()?;
    let mut total = 0usize;
    for (i, batch) in factory.batches()?.enumerate() {
        let batch = batch?;
        total += batch.num_rows();
        match predicate.as_mut() {
            Some(p) => {
                let mut matching = 0usize;
                for row in batch.iter() {
                    if p.test(row)? {
                        matching += 1;
                    }
                }
                writeln!(out, "batch {}: {} rows, {} matching", i + 1, batch.num_rows(), matching)?;
            }
            None => writeln!(out, "batch {}: {} rows", i + 1, batch.num_rows())?,
        }
    }
    writeln!(out, "total: {} rows", total)?;
    Ok(())
}

fn aggregate(
    factory: &StreamFactory,
    expr: Option<&str>,
    batched: bool,
    aggregations: Vec<Aggregation>,
    out: &mut impl Write,
) -> CliResult<()> {
    let rows = if batched {
        filtered(factory.batches()?, expr)?
    } else {
        filtered(factory.rows(), expr)?
    };
    for value in Aggregator::new(aggregations).consume(rows)? {
        writeln!(out, "{}", value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn run_args(args: &[&str]) -> CliResult<String> {
        let cli = Cli::try_parse_from(std::iter::once("rowstream").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        run(cli, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_avg_age_on_demo_store() {
        let out = run_args(&["avg-age", "--dsn", "memory://demo"]).unwrap();
        assert_eq!(out.trim(), "Average age of users: 37.80");
    }

    #[test]
    fn test_stream_with_filter_and_limit() {
        let out = run_args(&["stream", "--dsn", "memory://demo", "--where", "age > 30", "--limit", "2"])
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Dan Altenwerth"));
        assert!(lines[1].contains("Glenda Wisozk"));
    }

    #[test]
    fn test_batches_summary() {
        let out = run_args(&["batches", "--dsn", "memory://demo", "--batch-size", "2"]).unwrap();
        assert_eq!(
            out.lines().collect::<Vec<_>>(),
            vec!["batch 1: 2 rows", "batch 2: 2 rows", "batch 3: 1 rows", "total: 5 rows"]
        );
    }

    #[test]
    fn test_aggregate_batched_and_filtered() {
        let out = run_args(&[
            "aggregate",
            "--dsn",
            "memory://demo",
            "--batch-size",
            "3",
            "--where",
            "age > 25",
            "--agg",
            "count",
            "--agg",
            "max:age",
        ])
        .unwrap();
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["COUNT(*) = 5", "MAX(age) = 45"]);
    }

    #[test]
    fn test_yaml_config_then_flag_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowstream.yaml");
        fs::write(&path, "dsn: memory://nowhere\nbatch_size: 4\n").unwrap();
        let path = path.to_str().unwrap();

        assert!(run_args(&["--config", path, "avg-age"]).is_err());
        let out = run_args(&["--config", path, "avg-age", "--dsn", "memory://demo"]).unwrap();
        assert!(out.starts_with("Average age of users:"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = run_args(&["batches", "--dsn", "memory://demo", "--batch-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }
}
