use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use surface_repair::{RepairConfig, RunController, RunReport};

/// Repair zero implied volatilities in option-chain snapshots and report
/// 30-day ATM IV rank and percentile.
#[derive(Parser, Debug)]
#[command(name = "surface-repair", version)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot date to process (YYYYMMDD); repeat for several dates
    #[arg(long = "date", required = true, value_parser = parse_date)]
    dates: Vec<NaiveDate>,

    /// Directory holding one sub-directory per underlying
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Underlying to process; repeat for several. Defaults to the
    /// configured list, or every sub-directory of the data root
    #[arg(long = "underlying")]
    underlyings: Vec<String>,

    /// Write per-date IV statistics to this CSV file
    #[arg(long)]
    stats_out: Option<PathBuf>,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {e}"))
}

fn load_config(args: &Args) -> Result<RepairConfig> {
    let mut config = match &args.config {
        Some(path) => RepairConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RepairConfig::default(),
    };
    if let Some(root) = &args.data_root {
        config.data_root = root.clone();
    }
    if !args.underlyings.is_empty() {
        config.underlyings = args.underlyings.clone();
    }
    Ok(config)
}

fn print_report(report: &RunReport) {
    for underlying in &report.underlyings {
        println!(
            "{}: {} rows corrected",
            underlying.underlying,
            underlying.corrected_rows()
        );
        for entry in &underlying.dates {
            match &entry.stats {
                Some(s) => println!(
                    "  {}  {:<18} atm_iv={:.4} rank={:.3} pct={:.3} n={}",
                    entry.date,
                    entry.outcome.label(),
                    s.current,
                    s.rank,
                    s.percentile,
                    s.samples
                ),
                None => println!(
                    "  {}  {:<18} atm_iv=n/a n={}",
                    entry.date,
                    entry.outcome.label(),
                    entry.history_len
                ),
            }
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let controller = RunController::new(config).context("initialising repair run")?;
    let report = controller
        .run(&args.dates)
        .context("repair run aborted")?;

    print_report(&report);
    if let Some(path) = &args.stats_out {
        report
            .write_csv(path)
            .with_context(|| format!("writing stats to {}", path.display()))?;
        log::info!("stats written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
