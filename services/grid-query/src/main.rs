//! Grid dataset query tool.
//!
//! Opens a THREDDS-catalogued dataset over OPeNDAP and answers one query,
//! printing JSON on stdout. Logs go to stderr.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grid_dataset::{DiagnosticReason, GridDataset, GridRequest};
use opendap_client::{OpendapClient, ThreddsCatalog};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::QueryConfig;

#[derive(Parser, Debug)]
#[command(name = "grid-query")]
#[command(about = "Query gridded satellite datasets published through THREDDS catalogs")]
struct Args {
    /// Dataset configuration file (YAML); environment variables are used when omitted
    #[arg(short, long, env = "GRID_QUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Dataset id (required when the configuration lists several)
    #[arg(short, long)]
    dataset: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active periods and the discovery report
    Periods,

    /// List the centered timestamps of one period
    Times {
        #[arg(long)]
        period: String,
    },

    /// Extract a regular grid at one timestamp
    Grid {
        #[arg(long)]
        period: String,
        #[arg(long)]
        time: String,
        #[arg(long, allow_hyphen_values = true)]
        min_x: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_x: f64,
        #[arg(long, allow_hyphen_values = true)]
        min_y: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_y: f64,
        #[arg(long, default_value_t = 100)]
        n_wide: usize,
        #[arg(long, default_value_t = 100)]
        n_high: usize,
    },

    /// Time series at the grid cell nearest a point
    Series {
        #[arg(long)]
        period: String,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        min_time: String,
        #[arg(long)]
        max_time: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = match &args.config {
        Some(path) => QueryConfig::from_yaml_file(path)?,
        None => QueryConfig::from_env()?,
    };
    let dataset_config = config.dataset(args.dataset.as_deref())?.clone();
    info!(dataset = %dataset_config.id, catalog = %dataset_config.catalog_url, "Opening dataset");

    let client = OpendapClient::new(dataset_config.request_timeout())
        .context("Failed to create HTTP client")?;
    let catalog = ThreddsCatalog::new(client.http_client());
    let dataset = GridDataset::open(dataset_config, &catalog, Arc::new(client))
        .await
        .context("Failed to open dataset")?;

    let output = run(&dataset, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(dataset: &GridDataset, command: Command) -> Result<serde_json::Value> {
    match command {
        Command::Periods => {
            let report = dataset.discovery_report();
            let diagnostics: Vec<_> = report
                .diagnostics
                .iter()
                .map(|d| {
                    let reason = match &d.reason {
                        DiagnosticReason::UnknownPeriod(token) => format!("unknown period '{}'", token),
                        DiagnosticReason::NoTimes => "no time values".to_string(),
                        DiagnosticReason::DuplicateLabel(label) => format!("duplicate period '{}'", label),
                        DiagnosticReason::Failed(e) => e.to_string(),
                    };
                    json!({
                        "url_path": d.url_path,
                        "reason": reason,
                        "elapsed_ms": d.elapsed.as_millis() as u64,
                    })
                })
                .collect();

            Ok(json!({
                "dataset": dataset.id(),
                "periods": dataset.active_periods(),
                "metadata": dataset.metadata(),
                "discovery": {
                    "entries": report.entries,
                    "n_times": report.n_times,
                    "elapsed_ms": report.elapsed.as_millis() as u64,
                    "diagnostics": diagnostics,
                },
            }))
        }
        Command::Times { period } => Ok(json!({
            "period": period,
            "times": dataset.available_times(&period)?,
        })),
        Command::Grid {
            period,
            time,
            min_x,
            max_x,
            min_y,
            max_y,
            n_wide,
            n_high,
        } => {
            let request = GridRequest::new(min_x, max_x, min_y, max_y, n_wide, n_high);
            let grid = dataset.make_grid(&period, &time, &request).await?;
            Ok(serde_json::to_value(&grid)?)
        }
        Command::Series {
            period,
            x,
            y,
            min_time,
            max_time,
        } => {
            let series = dataset
                .get_time_series(x, y, &min_time, &max_time, &period)
                .await?;
            Ok(serde_json::to_value(&series)?)
        }
    }
}
