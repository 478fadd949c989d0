//! FleetScope command line
//!
//! Runs reports and status snapshots over a JSON file of readings and prints
//! the result as JSON. `demo` writes a simulated readings file to play with.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetscope_core::demo::FleetSimulator;
use fleetscope_core::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "fleetscope")]
#[command(about = "Vehicle telemetry reports: driving, fuel, battery, engine and tires", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-period report for one device
    Report {
        #[command(flatten)]
        input: Input,

        /// First day or RFC 3339 instant
        #[arg(long)]
        start: String,

        /// Last day or RFC 3339 instant
        #[arg(long)]
        end: String,

        /// day, week or month (defaults to the configured granularity)
        #[arg(long, value_parser = parse_granularity)]
        granularity: Option<Granularity>,

        /// Comma separated domains, all when omitted
        #[arg(long, value_delimiter = ',', value_parser = parse_domain)]
        domains: Vec<Domain>,
    },

    /// Latest known state of one device
    Status {
        #[command(flatten)]
        input: Input,

        /// Snapshot instant (RFC 3339), now when omitted
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Write simulated readings as JSON
    Demo {
        /// Device id of the simulated vehicle
        #[arg(long, default_value = "demo-1")]
        device: String,

        /// Random seed
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// First simulated day
        #[arg(long)]
        start: NaiveDate,

        /// Last simulated day
        #[arg(long)]
        end: NaiveDate,

        /// Seconds between readings
        #[arg(long, default_value_t = 60)]
        interval: i64,

        /// Output file, stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct Input {
    /// JSON array of readings
    #[arg(long, value_name = "FILE")]
    readings: PathBuf,

    /// Device to report on
    #[arg(long)]
    device: String,

    /// Analytics configuration (JSON), defaults when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print the output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

impl Input {
    fn engine(&self) -> Result<AnalyticsEngine<MemoryReadingSource>> {
        let config = match &self.config {
            Some(path) => AnalyticsConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AnalyticsConfig::default(),
        };
        let source = MemoryReadingSource::load_json(&self.readings)
            .with_context(|| format!("loading readings {}", self.readings.display()))?;
        tracing::info!(
            "Loaded {} readings for {} devices",
            source.len(),
            source.device_ids().len()
        );
        Ok(AnalyticsEngine::new(source, config)?)
    }

    fn print<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{json}");
        Ok(())
    }
}

fn parse_granularity(raw: &str) -> Result<Granularity, String> {
    Granularity::from_name(raw).ok_or_else(|| format!("unknown granularity '{raw}'"))
}

fn parse_domain(raw: &str) -> Result<Domain, String> {
    Domain::from_name(raw).ok_or_else(|| format!("unknown domain '{raw}'"))
}

/// Token cancelled on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON, logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Report {
            input,
            start,
            end,
            granularity,
            domains,
        } => {
            let engine = input.engine()?;
            let granularity = granularity.unwrap_or(engine.config().granularity);
            let mut request = ReportRequest::parse(&input.device, &start, &end, granularity)?;
            if !domains.is_empty() {
                request = request.with_domains(domains);
            }

            let report = engine
                .combined_report(&request, &cancel_on_ctrl_c())
                .await?;
            if !report.failed_domains.is_empty() {
                tracing::warn!("Domains without results: {:?}", report.failed_domains);
            }
            input.print(&report)
        }

        Command::Status { input, as_of } => {
            let engine = input.engine()?;
            let status = engine
                .current_status(
                    &input.device,
                    as_of.unwrap_or_else(Utc::now),
                    &cancel_on_ctrl_c(),
                )
                .await?;
            input.print(&status)
        }

        Command::Demo {
            device,
            seed,
            start,
            end,
            interval,
            output,
        } => {
            if start > end {
                return Err(anyhow!("--start {start} is after --end {end}"));
            }
            let readings = FleetSimulator::new(&device, seed)
                .with_interval_seconds(interval)
                .generate_range(start, end);
            let json = serde_json::to_string_pretty(&readings)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!("Wrote {} readings to {}", readings.len(), path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
    }
}
