//! # Surface-Repair: Option-Chain Snapshot Repair and ATM IV History
//!
//! `surface-repair` fixes daily option-chain snapshots whose implied
//! volatility failed to compute (written as exactly zero). Each failed row is
//! re-priced off the snapshot's own volatility surface and its Greeks are
//! recomputed, then a rolling history of 30-day at-the-money IV is kept per
//! underlying for rank and percentile features.
//!
//! ## Core Features
//!
//! - **Surface interpolation**: shape-preserving Akima curve of IV over
//!   standardized moneyness `ln(S/K) / sqrt(T)`
//! - **Greeks recomputation**: binomial tree for American contracts,
//!   Black-Scholes-Merton for European ones, with sign-sanitized output
//! - **Snapshot correction**: in-place, atomic rewrite touching only the
//!   IV and Greek fields of zero-IV rows
//! - **ATM IV history**: near/far expiry bracket around the 30-day target,
//!   delta-nearest-0.5 selection, linear blend, parallel backfill
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use surface_repair::{default_configs, RunController};
//! use chrono::NaiveDate;
//!
//! let mut config = default_configs::production();
//! config.data_root = "data/chains".into();
//! config.underlyings = vec!["SPY".into()];
//!
//! let controller = RunController::new(config)?;
//! let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//! let report = controller.run(&[date])?;
//! println!("corrected {} rows", report.corrected_rows());
//! # Ok::<(), surface_repair::RepairError>(())
//! ```
//!
//! ## Snapshot Layout
//!
//! One directory per underlying holding `YYYYMMDD.<ext>` files. Row 0 is the
//! header, row 1 the underlying quote and every later row one contract.
//! Columns are located by name: `#symbol_id`, `symbol_value`, `close`,
//! `implied_volatility` and `delta`, with gamma, vega, theta and rho in the
//! four fields after delta.
//!
//! ## Configuration Presets
//!
//! - `production()`: 200-step tree, tight solver tolerance
//! - `fast()`: 50-step tree for development and tests

// ================================================================================================
// MODULES
// ================================================================================================

pub mod chain;
pub mod error;
pub mod market;
pub mod models;

// ================================================================================================
// IMPORTS
// ================================================================================================

use chrono::NaiveDate;
use std::path::Path;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Errors
pub use error::{BracketSide, RepairError, Result};

// Configuration
pub use chain::config::{GreeksConfig, HistoryConfig, MarketConfig, RepairConfig, SurfaceConfig};

// Snapshot data and the repair run
pub use chain::{
    atm::{AtmIv, AtmIvExtractor},
    controller::{DateReport, RunController, RunReport, UnderlyingReport},
    corrector::{CorrectionOutcome, SnapshotCorrector},
    history::IvHistoryCache,
    snapshot::SnapshotFile,
    stats::IvStats,
    types::{AtmIvSample, ContractRow, ContractSymbol, OptionRight, OptionStyle},
};

// Market inputs
pub use market::{
    ConstantRate, DividendYieldProvider, DividendYieldTable, RateCurve, RiskFreeRateProvider,
};

// Models
pub use models::greeks::{
    Greeks, GreeksEngine, GreeksEngineFactory, GreeksRecomputer, ImpliedGreeksFactory,
};
pub use models::pricing::{PricingInputs, PricingModel};
pub use models::surface::{Extrapolation, MoneynessPoint, SurfaceInterpolator};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured settings for common use cases.
///
/// Both presets keep the default data layout, market inputs and history
/// window; they differ in the accuracy of the Greeks recomputation.
pub mod default_configs {
    use crate::chain::config::RepairConfig;

    /// Production settings.
    ///
    /// **Characteristics:**
    /// - Binomial tree: 200 steps
    /// - Implied-volatility solver tolerance: 1e-10
    ///
    /// # Example
    ///
    /// ```rust
    /// use surface_repair::default_configs;
    ///
    /// let config = default_configs::production();
    /// assert_eq!(config.greeks.tree_steps, 200);
    /// ```
    pub fn production() -> RepairConfig {
        RepairConfig::production()
    }

    /// Fast settings for development and integration tests.
    ///
    /// **Characteristics:**
    /// - Binomial tree: 50 steps
    /// - Implied-volatility solver tolerance: 1e-7
    ///
    /// # Example
    ///
    /// ```rust
    /// use surface_repair::default_configs;
    ///
    /// let config = default_configs::fast();
    /// assert_eq!(config.greeks.tree_steps, 50);
    /// ```
    pub fn fast() -> RepairConfig {
        RepairConfig::fast()
    }
}

// ================================================================================================
// CONVENIENCE FUNCTIONS
// ================================================================================================

/// Correct a single snapshot in place.
///
/// Builds the Greeks recomputer from `config` and runs one
/// [`SnapshotCorrector`] pass over `path`. Use [`RunController`] for a run
/// over many files so the providers are built once.
///
/// # Errors
///
/// * [`RepairError::Parse`] if a numeric field or ticker cannot be parsed
/// * [`RepairError::InvalidFileName`] if the file name is not `YYYYMMDD.<ext>`
/// * [`RepairError::Persist`] if the corrected file cannot replace the original
pub fn correct_snapshot(
    path: impl AsRef<Path>,
    config: &RepairConfig,
) -> Result<CorrectionOutcome> {
    let recomputer = GreeksRecomputer::from_config(config)?;
    let corrector = SnapshotCorrector::new(
        &recomputer,
        config.surface.extrapolation,
        &config.european_roots,
    );
    corrector.correct(path.as_ref())
}

/// 30-day ATM IV of a single snapshot.
///
/// Returns [`AtmIv::Unavailable`] when the snapshot lacks a required column
/// and [`RepairError::NoAtmBracket`] when no expiry falls on one side of the
/// target date.
pub fn extract_atm_iv(path: impl AsRef<Path>, config: &HistoryConfig) -> Result<AtmIv> {
    AtmIvExtractor::from_config(config).extract_path(path.as_ref())
}

/// Snapshot date encoded in a file name.
pub fn snapshot_date(path: impl AsRef<Path>) -> Result<NaiveDate> {
    chain::snapshot::date_from_path(path.as_ref())
}
