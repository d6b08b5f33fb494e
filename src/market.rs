//! Interest-rate and dividend-yield providers consumed by Greeks recomputation.
//!
//! Both are traits so callers can plug in their own sources; the crate ships
//! a flat rate, a step-function rate curve read from CSV, and a
//! per-underlying dividend table.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::chain::config::MarketConfig;
use crate::chain::types::ContractSymbol;
use crate::error::{RepairError, Result};

/// Risk-free rate (continuously compounded, decimal) for a date
pub trait RiskFreeRateProvider: Send + Sync {
    fn risk_free_rate(&self, date: NaiveDate) -> f64;
}

/// Continuous dividend yield (decimal) of a contract's underlying on a date
pub trait DividendYieldProvider: Send + Sync {
    fn dividend_yield(&self, contract: &ContractSymbol, date: NaiveDate) -> f64;
}

/// Same rate on every date.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRate(pub f64);

impl RiskFreeRateProvider for ConstantRate {
    fn risk_free_rate(&self, _date: NaiveDate) -> f64 {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct RateRow {
    date: String,
    rate: f64,
}

/// Step-function rate curve: the latest observation on or before the date.
///
/// Dates before the first observation use the first rate.
#[derive(Debug, Clone)]
pub struct RateCurve {
    points: BTreeMap<NaiveDate, f64>,
}

impl RateCurve {
    pub fn new(points: BTreeMap<NaiveDate, f64>) -> Result<Self> {
        if points.is_empty() {
            return Err(RepairError::InvalidInput("rate curve has no observations".into()));
        }
        Ok(Self { points })
    }

    /// Load a `date,rate` CSV with a header row.
    ///
    /// Dates may be `YYYY-MM-DD` or `YYYYMMDD`; rates are decimals.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let mut points = BTreeMap::new();

        for (i, record) in reader.deserialize().enumerate() {
            let row: RateRow = record?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&row.date, "%Y%m%d"))
                .map_err(|_| RepairError::Parse {
                    path: path.to_path_buf(),
                    row: i + 1,
                    field: "date",
                    value: row.date.clone(),
                })?;
            points.insert(date, row.rate);
        }

        Self::new(points)
    }
}

impl RiskFreeRateProvider for RateCurve {
    fn risk_free_rate(&self, date: NaiveDate) -> f64 {
        self.points
            .range(..=date)
            .next_back()
            .or_else(|| self.points.iter().next())
            .map(|(_, rate)| *rate)
            .unwrap_or(0.0)
    }
}

/// Per-underlying dividend yields with a fallback.
#[derive(Debug, Clone, Default)]
pub struct DividendYieldTable {
    pub default: f64,
    pub by_underlying: HashMap<String, f64>,
}

impl DividendYieldProvider for DividendYieldTable {
    fn dividend_yield(&self, contract: &ContractSymbol, _date: NaiveDate) -> f64 {
        self.by_underlying
            .get(&contract.root)
            .copied()
            .unwrap_or(self.default)
    }
}

/// Build the providers described by the market section of the config.
pub fn providers_from_config(
    config: &MarketConfig,
) -> Result<(Box<dyn RiskFreeRateProvider>, Box<dyn DividendYieldProvider>)> {
    let rates: Box<dyn RiskFreeRateProvider> = match &config.rate_curve {
        Some(path) => Box::new(RateCurve::from_csv(path)?),
        None => Box::new(ConstantRate(config.risk_free_rate)),
    };
    let dividends = DividendYieldTable {
        default: config.dividend_yield,
        by_underlying: config.dividend_yields.clone(),
    };
    Ok((rates, Box::new(dividends)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn curve_steps_forward() {
        let mut points = BTreeMap::new();
        points.insert(d(2024, 1, 2), 0.050);
        points.insert(d(2024, 3, 1), 0.045);
        let curve = RateCurve::new(points).unwrap();

        assert_eq!(curve.risk_free_rate(d(2023, 12, 1)), 0.050);
        assert_eq!(curve.risk_free_rate(d(2024, 2, 29)), 0.050);
        assert_eq!(curve.risk_free_rate(d(2024, 3, 1)), 0.045);
        assert_eq!(curve.risk_free_rate(d(2025, 1, 1)), 0.045);
    }

    #[test]
    fn curve_loads_both_date_layouts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,rate").unwrap();
        writeln!(file, "2024-01-02,0.0525").unwrap();
        writeln!(file, "20240601,0.0510").unwrap();
        file.flush().unwrap();

        let curve = RateCurve::from_csv(file.path()).unwrap();
        assert_eq!(curve.risk_free_rate(d(2024, 5, 31)), 0.0525);
        assert_eq!(curve.risk_free_rate(d(2024, 6, 3)), 0.0510);
    }

    #[test]
    fn empty_curve_is_rejected() {
        assert!(RateCurve::new(BTreeMap::new()).is_err());
    }

    #[test]
    fn dividend_table_falls_back_to_default() {
        let mut by_underlying = HashMap::new();
        by_underlying.insert("SPY".to_string(), 0.013);
        let table = DividendYieldTable {
            default: 0.002,
            by_underlying,
        };
        let spy = ContractSymbol::parse("SPY   240119C00450000").unwrap();
        let qqq = ContractSymbol::parse("QQQ   240119C00400000").unwrap();
        assert_eq!(table.dividend_yield(&spy, d(2024, 1, 2)), 0.013);
        assert_eq!(table.dividend_yield(&qqq, d(2024, 1, 2)), 0.002);
    }
}
