//! Error types for snapshot repair.
//!
//! Parse failures, missing files and numerical failures terminate a run.
//! Missing header columns are not errors: they surface as outcomes on the
//! corrector and the ATM extractor.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, RepairError>;

/// Side of the 30-day target on which no expiry was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketSide {
    /// No expiry on or before the target date.
    Near,
    /// No expiry on or after the target date.
    Far,
}

impl std::fmt::Display for BracketSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BracketSide::Near => write!(f, "on or before"),
            BracketSide::Far => write!(f, "on or after"),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RepairError {
    /// Expected snapshot is absent for an underlying/date.
    #[error("snapshot for {underlying} on {date} not found at {}", path.display())]
    MissingFile {
        underlying: String,
        date: NaiveDate,
        path: PathBuf,
    },

    /// A field that must be numeric (or a date) failed to parse.
    #[error("cannot parse {field} value {value:?} in {} (row {row})", path.display())]
    Parse {
        path: PathBuf,
        row: usize,
        field: &'static str,
        value: String,
    },

    /// Ticker does not follow the ROOT + YYMMDD + C/P + strike layout.
    #[error("invalid contract symbol {0:?}")]
    InvalidSymbol(String),

    /// Snapshot file name is not `YYYYMMDD.<ext>`.
    #[error("snapshot file name {} does not encode a date", .0.display())]
    InvalidFileName(PathBuf),

    /// No expiry bracketing the ATM target tenor.
    #[error("no expiry {side} ATM target {target} in snapshot of {date}")]
    NoAtmBracket {
        date: NaiveDate,
        target: NaiveDate,
        side: BracketSide,
    },

    #[error("insufficient surface points: {found} < {required}")]
    InsufficientPoints { found: usize, required: usize },

    /// Query outside the fitted moneyness range with extrapolation disabled.
    #[error("moneyness {x} outside fitted domain [{lo}, {hi}]")]
    OutOfDomain { x: f64, lo: f64, hi: f64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Atomic replace of a corrected snapshot failed.
    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}
