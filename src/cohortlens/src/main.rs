//! CohortLens — subscription cohort retention, churn, and LTV
//! reporting over a delimited export.
//!
//! Loads the source table once (memoized by path), runs the
//! aggregation pipeline for the requested configuration, and renders
//! the cohort matrix as a text table or JSON.

mod render;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use cohortlens_core::{AppConfig, ChurnSignal, CohortGrain, ReportConfig};
use cohortlens_loader::LoadCache;
use cohortlens_reporting::build_report;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cohortlens")]
#[command(about = "Subscription cohort retention, churn, and LTV reporting")]
#[command(version)]
struct Cli {
    /// Source export file, TSV or CSV with a header row (overrides config)
    #[arg(long, env = "COHORTLENS__SOURCE__PATH")]
    file: Option<PathBuf>,

    /// Field delimiter: "tab" or a single character (overrides config)
    #[arg(long, env = "COHORTLENS__SOURCE__DELIMITER")]
    delimiter: Option<String>,

    /// Inclusive start of the creation-date range (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Inclusive end of the creation-date range (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Bucket cohorts by Monday-anchored ISO week instead of day
    #[arg(long, default_value_t = false)]
    weekly: bool,

    /// Categorical filter, e.g. utm_source=google,facebook (repeatable)
    #[arg(long = "filter", value_name = "COLUMN=V1,V2")]
    filters: Vec<String>,

    /// Which column marks a subscription as churned
    #[arg(long, value_enum)]
    churn_signal: Option<ChurnSignalArg>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChurnSignalArg {
    NextChargeMissing,
    StatusCanceled,
}

impl From<ChurnSignalArg> for ChurnSignal {
    fn from(arg: ChurnSignalArg) -> Self {
        match arg {
            ChurnSignalArg::NextChargeMissing => ChurnSignal::NextChargeMissing,
            ChurnSignalArg::StatusCanceled => ChurnSignal::StatusCanceled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohortlens=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(file) = &cli.file {
        config.source.path = file.display().to_string();
    }
    if let Some(delimiter) = &cli.delimiter {
        config.source.delimiter = delimiter.clone();
    }
    if cli.weekly {
        config.report.grain = CohortGrain::Weekly;
    }
    if let Some(signal) = cli.churn_signal {
        config.report.churn_signal = signal.into();
    }

    let report_config = ReportConfig {
        grain: config.report.grain,
        churn_signal: config.report.churn_signal,
        date_range: date_range(cli.from, cli.to),
        dimension_filters: parse_filters(&cli.filters)?,
    };

    info!(
        path = %config.source.path,
        grain = ?report_config.grain,
        churn_signal = ?report_config.churn_signal,
        "building cohort report"
    );

    let cache = LoadCache::new();
    let table = cache
        .load(Path::new(&config.source.path), config.delimiter_byte())
        .with_context(|| format!("failed to load {}", config.source.path))?;

    let report = build_report(&table, &report_config);
    for notice in &report.notices {
        warn!(column = %notice.column, "{}", notice.message);
    }

    match cli.format {
        OutputFormat::Table => {
            if report.cohorts.is_empty() {
                println!("No data: no rows match the current filters.");
            } else {
                println!("{}", render::render_table(&report));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    match (from, to) {
        (None, None) => None,
        (from, to) => Some((
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        )),
    }
}

/// Parse repeated `COLUMN=V1,V2` flags into the filter map.
fn parse_filters(raw: &[String]) -> anyhow::Result<HashMap<String, HashSet<String>>> {
    let mut filters: HashMap<String, HashSet<String>> = HashMap::new();
    for entry in raw {
        let (column, values) = entry
            .split_once('=')
            .with_context(|| format!("invalid filter '{entry}', expected COLUMN=V1,V2"))?;
        let allowed = filters.entry(column.trim().to_string()).or_default();
        for value in values.split(',') {
            let value = value.trim();
            if !value.is_empty() {
                allowed.insert(value.to_string());
            }
        }
    }
    Ok(filters)
}
