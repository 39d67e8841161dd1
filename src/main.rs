//! CLI entry point for the sales insights tool.
//!
//! Provides subcommands for computing every dashboard view over an uploaded
//! sales file, exporting the daily summary, and listing the cities available
//! to the filter.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sales_insights::analyzers::aggregate::daily_summary;
use sales_insights::analyzers::metrics::revenue_per_order;
use sales_insights::{
    config::DashboardConfig,
    output::{export_daily_summary, print_json, print_pretty, print_tables},
    session::{CityFilter, Session},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "sales_insights")]
#[command(about = "Descriptive analytics over a sales transaction file", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute every dashboard view and log the results
    Report {
        /// Sales file (csv, xlsx, xls, xlsb or ods)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only include these cities (repeatable); all cities when omitted
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Log the full report as JSON instead of text tables
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Worksheet to read from spreadsheet inputs
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Write the daily summary (date, orders, total, revenue per order) as CSV
    Export {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long = "city")]
        cities: Vec<String>,

        /// CSV file to write
        #[arg(short, long)]
        output: Option<String>,

        #[arg(long)]
        sheet: Option<String>,
    },
    /// List the distinct cities in a sales file
    Cities {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long)]
        sheet: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/sales_insights.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("sales_insights.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    }
    .with_env();

    match cli.command {
        Commands::Report {
            input,
            cities,
            json,
            sheet,
        } => {
            let session = open_session(&input, sheet.or(config.sheet.clone()), &config)?
                .with_filter(pick_filter(cities, &config));
            info!(
                filter = ?session.filter(),
                scale = ?session.scale(),
                "Computing dashboard"
            );
            let report = session.compute();

            if json {
                print_json(&report)?;
            } else {
                print_pretty(&report);
                print_tables(&report);
            }

            let failed = report.failed_views();
            if !failed.is_empty() {
                warn!(failed = ?failed, "Some views could not be computed");
            }
        }
        Commands::Export {
            input,
            cities,
            output,
            sheet,
        } => {
            let session = open_session(&input, sheet.or(config.sheet.clone()), &config)?;
            let filtered = pick_filter(cities, &config).apply(session.dataset());

            let daily = daily_summary(&filtered)?;
            let report = revenue_per_order(&daily)?;

            let path = output.unwrap_or_else(|| config.export_path.clone());
            export_daily_summary(&path, &report)?;
        }
        Commands::Cities { input, sheet } => {
            let session = open_session(&input, sheet.or(config.sheet.clone()), &config)?;
            let cities = session.available_cities();

            info!(total = cities.len(), "Cities in dataset");
            for city in &cities {
                info!(city = %city, "City");
            }
        }
    }

    Ok(())
}

/// Loads and normalizes `input` into a session configured from `config`.
#[tracing::instrument(skip(input, config), fields(input = %input.display()))]
fn open_session(input: &Path, sheet: Option<String>, config: &DashboardConfig) -> Result<Session> {
    let session = Session::load(input, sheet.as_deref())
        .with_context(|| format!("loading sales data from {}", input.display()))?;
    Ok(session.with_scale(config.scale()))
}

/// CLI cities win over configured ones.
fn pick_filter(cities: Vec<String>, config: &DashboardConfig) -> CityFilter {
    if cities.is_empty() {
        config.city_filter()
    } else {
        CityFilter::new(cities)
    }
}
