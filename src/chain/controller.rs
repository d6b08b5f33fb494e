//! Drives a repair run over underlyings and dates.

use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::chain::atm::AtmIvExtractor;
use crate::chain::config::RepairConfig;
use crate::chain::corrector::{CorrectionOutcome, SnapshotCorrector};
use crate::chain::history::IvHistoryCache;
use crate::chain::snapshot::file_name;
use crate::chain::stats::IvStats;
use crate::error::{RepairError, Result};
use crate::models::greeks::GreeksRecomputer;

/// Result of one underlying/date pair
#[derive(Debug, Clone)]
pub struct DateReport {
    pub date: NaiveDate,
    pub outcome: CorrectionOutcome,
    /// Number of ATM IV samples in the trailing window
    pub history_len: usize,
    pub stats: Option<IvStats>,
}

#[derive(Debug, Clone)]
pub struct UnderlyingReport {
    pub underlying: String,
    pub dates: Vec<DateReport>,
}

impl UnderlyingReport {
    pub fn corrected_rows(&self) -> usize {
        self.dates.iter().map(|d| d.outcome.corrected_rows()).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub underlyings: Vec<UnderlyingReport>,
}

#[derive(Serialize)]
struct StatsRow<'a> {
    underlying: &'a str,
    date: String,
    outcome: &'static str,
    corrected_rows: usize,
    history_len: usize,
    atm_iv: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    rank: Option<f64>,
    percentile: Option<f64>,
}

impl RunReport {
    pub fn corrected_rows(&self) -> usize {
        self.underlyings.iter().map(|u| u.corrected_rows()).sum()
    }

    /// One CSV row per underlying/date; stats fields are empty when the
    /// date has no ATM IV.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for underlying in &self.underlyings {
            for entry in &underlying.dates {
                let stats = entry.stats.as_ref();
                writer.serialize(StatsRow {
                    underlying: &underlying.underlying,
                    date: entry.date.format("%Y-%m-%d").to_string(),
                    outcome: entry.outcome.label(),
                    corrected_rows: entry.outcome.corrected_rows(),
                    history_len: entry.history_len,
                    atm_iv: stats.map(|s| s.current),
                    min: stats.map(|s| s.min),
                    max: stats.map(|s| s.max),
                    rank: stats.map(|s| s.rank),
                    percentile: stats.map(|s| s.percentile),
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

pub struct RunController {
    config: RepairConfig,
    recomputer: GreeksRecomputer,
}

impl RunController {
    pub fn new(config: RepairConfig) -> Result<Self> {
        config.validate()?;
        let recomputer = GreeksRecomputer::from_config(&config)?;
        Ok(Self::with_recomputer(config, recomputer))
    }

    /// Controller with caller-supplied providers and engines
    pub fn with_recomputer(config: RepairConfig, recomputer: GreeksRecomputer) -> Self {
        Self { config, recomputer }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Configured underlyings, or every sub-directory of the data root in
    /// name order when none are configured.
    pub fn underlyings(&self) -> Result<Vec<String>> {
        if !self.config.underlyings.is_empty() {
            let mut seen = std::collections::HashSet::new();
            return Ok(self
                .config
                .underlyings
                .iter()
                .filter(|name| seen.insert(name.as_str()))
                .cloned()
                .collect());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.data_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn snapshot_path(&self, underlying: &str, date: NaiveDate) -> PathBuf {
        self.config
            .data_root
            .join(underlying)
            .join(file_name(date, &self.config.extension))
    }

    /// Correct and extend the IV history for every underlying on `dates`.
    ///
    /// Dates run in ascending order, each file corrected before the history
    /// scan so the scan sees repaired IVs. A missing snapshot aborts the
    /// run; files already rewritten stay rewritten.
    pub fn run(&self, dates: &[NaiveDate]) -> Result<RunReport> {
        let mut dates = dates.to_vec();
        dates.sort();
        dates.dedup();

        let corrector = SnapshotCorrector::new(
            &self.recomputer,
            self.config.surface.extrapolation,
            &self.config.european_roots,
        );
        let extractor = AtmIvExtractor::from_config(&self.config.history);

        let mut report = RunReport::default();
        for underlying in self.underlyings()? {
            let mut cache = IvHistoryCache::new(
                self.config.data_root.join(&underlying),
                self.config.extension.clone(),
                self.config.history.window_days,
            );
            let mut entries = Vec::with_capacity(dates.len());

            for &date in &dates {
                let path = self.snapshot_path(&underlying, date);
                if !path.is_file() {
                    return Err(RepairError::MissingFile {
                        underlying,
                        date,
                        path,
                    });
                }

                let outcome = corrector.correct(&path)?;
                let history_len = cache.update(date, &extractor)?.len();
                let stats = IvStats::from_samples(&cache.samples(date), date);
                info!(
                    "{underlying} {date}: {} ({} rows), {history_len} IV samples",
                    outcome.label(),
                    outcome.corrected_rows()
                );
                entries.push(DateReport {
                    date,
                    outcome,
                    history_len,
                    stats,
                });
            }

            report.underlyings.push(UnderlyingReport {
                underlying,
                dates: entries,
            });
        }
        Ok(report)
    }
}
