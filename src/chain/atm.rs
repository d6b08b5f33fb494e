//! Constant-maturity ATM implied volatility of one snapshot.

use chrono::{Duration, NaiveDate};
use log::debug;
use std::path::Path;

use crate::chain::config::HistoryConfig;
use crate::chain::snapshot::{SnapshotFile, COL_DELTA, COL_IV, COL_SECURITY_ID, COL_TICKER};
use crate::chain::types::ContractSymbol;
use crate::error::{RepairError, Result};
use crate::models::surface::{atm_iv_at, AtmQuote, ExpiryGroups};

/// Columns the extractor needs
pub const ATM_COLUMNS: [&str; 4] = [COL_DELTA, COL_IV, COL_SECURITY_ID, COL_TICKER];

/// ATM IV of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtmIv {
    Value(f64),
    /// Snapshot lacks a column the extraction needs
    Unavailable,
}

impl AtmIv {
    /// Legacy marker written for unavailable values
    pub const SENTINEL: f64 = -1.0;

    pub fn sentinel() -> f64 {
        Self::SENTINEL
    }

    pub fn value(self) -> Option<f64> {
        match self {
            AtmIv::Value(v) => Some(v),
            AtmIv::Unavailable => None,
        }
    }

    /// The value, or the sentinel when unavailable
    pub fn or_sentinel(self) -> f64 {
        self.value().unwrap_or(Self::SENTINEL)
    }
}

/// Extracts the ATM IV at a fixed tenor from the contracts of a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AtmIvExtractor {
    target_days: i64,
    target_delta: f64,
}

impl Default for AtmIvExtractor {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl AtmIvExtractor {
    pub fn new(target_days: i64, target_delta: f64) -> Self {
        Self {
            target_days,
            target_delta,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.target_days, config.target_delta)
    }

    pub fn target_date(&self, date: NaiveDate) -> NaiveDate {
        date + Duration::days(self.target_days)
    }

    pub fn extract_path(&self, path: &Path) -> Result<AtmIv> {
        let snapshot = SnapshotFile::read(path)?;
        self.extract(&snapshot)
    }

    /// ATM IV of `snapshot`.
    ///
    /// Rows with a zero IV are skipped. Fails with `NoAtmBracket` when no
    /// listed expiry falls on one side of the target date.
    pub fn extract(&self, snapshot: &SnapshotFile) -> Result<AtmIv> {
        let missing = snapshot.columns().missing(&ATM_COLUMNS);
        if !missing.is_empty() {
            debug!(
                "{}: missing columns {:?}, ATM IV unavailable",
                snapshot.path().display(),
                missing
            );
            return Ok(AtmIv::Unavailable);
        }
        let columns = snapshot.columns();
        let (iv_col, delta_col, ticker_col) = match (columns.iv, columns.delta, columns.ticker) {
            (Some(iv), Some(delta), Some(ticker)) => (iv, delta, ticker),
            _ => return Ok(AtmIv::Unavailable),
        };

        let mut groups = ExpiryGroups::new();
        for row in snapshot.contract_rows() {
            let iv = snapshot.parse_f64(row, iv_col, COL_IV)?;
            if iv == 0.0 {
                continue;
            }
            let symbol = ContractSymbol::parse(snapshot.field(row, ticker_col, COL_TICKER)?)?;
            let delta = snapshot.parse_f64(row, delta_col, COL_DELTA)?;
            groups
                .entry(symbol.expiry)
                .or_default()
                .push(AtmQuote { delta, iv });
        }

        let date = snapshot.date();
        let target = self.target_date(date);
        let iv = atm_iv_at(&groups, target, self.target_delta)
            .map_err(|side| RepairError::NoAtmBracket { date, target, side })?;
        debug!("{}: ATM IV {:.6} at {}", snapshot.path().display(), iv, target);
        Ok(AtmIv::Value(iv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_negative_one() {
        assert_eq!(AtmIv::sentinel(), -1.0);
        assert_eq!(AtmIv::Unavailable.or_sentinel(), -1.0);
        assert_eq!(AtmIv::Value(0.2).value(), Some(0.2));
        assert_eq!(AtmIv::Unavailable.value(), None);
    }

    #[test]
    fn target_is_tenor_days_ahead() {
        let extractor = AtmIvExtractor::default();
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            extractor.target_date(d),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }
}
