use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{RepairError, Result};
use crate::models::surface::Extrapolation;

/// Moneyness surface settings
#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceConfig {
    /// Behaviour outside the fitted moneyness range
    #[serde(default)]
    pub extrapolation: Extrapolation,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            extrapolation: Extrapolation::default(),
        }
    }
}

/// Greeks recomputation settings
#[derive(Debug, Clone, Deserialize)]
pub struct GreeksConfig {
    /// Steps of the binomial tree used for American-style contracts
    #[serde(default = "default_tree_steps")]
    pub tree_steps: usize,
    /// Relative spot bump for delta/gamma
    #[serde(default = "default_spot_bump")]
    pub spot_bump: f64,
    /// Absolute volatility bump for vega
    #[serde(default = "default_vol_bump")]
    pub vol_bump: f64,
    /// Absolute rate bump for rho
    #[serde(default = "default_rate_bump")]
    pub rate_bump: f64,
    /// Upper bracket of the implied-volatility root search
    #[serde(default = "default_max_vol")]
    pub max_vol: f64,
    /// Tolerance of the implied-volatility root search
    #[serde(default = "default_solver_tol")]
    pub solver_tol: f64,
}

impl Default for GreeksConfig {
    fn default() -> Self {
        Self {
            tree_steps: default_tree_steps(),
            spot_bump: default_spot_bump(),
            vol_bump: default_vol_bump(),
            rate_bump: default_rate_bump(),
            max_vol: default_max_vol(),
            solver_tol: default_solver_tol(),
        }
    }
}

/// Interest-rate and dividend-yield inputs
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Flat risk-free rate used when no curve file is configured
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Optional CSV curve of `date,rate` rows
    #[serde(default)]
    pub rate_curve: Option<PathBuf>,
    /// Dividend yield for underlyings missing from `dividend_yields`
    #[serde(default)]
    pub dividend_yield: f64,
    /// Per-underlying continuous dividend yields
    #[serde(default)]
    pub dividend_yields: HashMap<String, f64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            rate_curve: None,
            dividend_yield: 0.0,
            dividend_yields: HashMap::new(),
        }
    }
}

/// ATM IV history settings
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Trailing window of the IV history in calendar days
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Tenor of the ATM IV in calendar days
    #[serde(default = "default_target_days")]
    pub target_days: i64,
    /// Delta treated as at-the-money
    #[serde(default = "default_target_delta")]
    pub target_delta: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            target_days: default_target_days(),
            target_delta: default_target_delta(),
        }
    }
}

/// Top-level configuration, usually loaded from TOML.
///
/// ```rust
/// use surface_repair::RepairConfig;
///
/// let config = RepairConfig::from_toml_str(r#"
///     data_root = "data/chains"
///     underlyings = ["SPY", "QQQ"]
///
///     [greeks]
///     tree_steps = 50
///
///     [market.dividend_yields]
///     SPY = 0.013
/// "#)?;
/// assert_eq!(config.greeks.tree_steps, 50);
/// assert_eq!(config.extension, "csv");
/// # Ok::<(), surface_repair::RepairError>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RepairConfig {
    /// Directory holding one sub-directory per underlying
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Snapshot file extension (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Underlyings to process; empty means every sub-directory of `data_root`
    #[serde(default)]
    pub underlyings: Vec<String>,

    /// Roots whose options are European-style
    #[serde(default = "default_european_roots")]
    pub european_roots: Vec<String>,

    #[serde(default)]
    pub surface: SurfaceConfig,

    #[serde(default)]
    pub greeks: GreeksConfig,

    #[serde(default)]
    pub market: MarketConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            extension: default_extension(),
            underlyings: Vec::new(),
            european_roots: default_european_roots(),
            surface: SurfaceConfig::default(),
            greeks: GreeksConfig::default(),
            market: MarketConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl RepairConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RepairConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Production settings: fine binomial tree, tight solver tolerance
    pub fn production() -> Self {
        Self {
            greeks: GreeksConfig {
                tree_steps: 200,
                solver_tol: 1e-10,
                ..GreeksConfig::default()
            },
            ..Self::default()
        }
    }

    /// Fast settings for development and tests
    pub fn fast() -> Self {
        Self {
            greeks: GreeksConfig {
                tree_steps: 50,
                solver_tol: 1e-7,
                ..GreeksConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.greeks.tree_steps == 0 {
            return Err(RepairError::Config("greeks.tree_steps must be > 0".into()));
        }
        for (name, bump) in [
            ("greeks.spot_bump", self.greeks.spot_bump),
            ("greeks.vol_bump", self.greeks.vol_bump),
            ("greeks.rate_bump", self.greeks.rate_bump),
            ("greeks.solver_tol", self.greeks.solver_tol),
        ] {
            if !(bump > 0.0 && bump.is_finite()) {
                return Err(RepairError::Config(format!("{name} must be > 0, got {bump}")));
            }
        }
        if !(self.greeks.max_vol > 0.0) {
            return Err(RepairError::Config(format!(
                "greeks.max_vol must be > 0, got {}",
                self.greeks.max_vol
            )));
        }
        if self.history.window_days <= 0 || self.history.target_days <= 0 {
            return Err(RepairError::Config(
                "history.window_days and history.target_days must be > 0".into(),
            ));
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(RepairError::Config(format!(
                "extension must be given without a leading dot, got {:?}",
                self.extension
            )));
        }
        Ok(())
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_european_roots() -> Vec<String> {
    ["SPX", "SPXW", "NDX", "NDXP", "RUT", "RUTW", "XSP", "VIX", "VIXW", "DJX", "OEX"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tree_steps() -> usize {
    100
}

fn default_spot_bump() -> f64 {
    0.01
}

fn default_vol_bump() -> f64 {
    0.001
}

fn default_rate_bump() -> f64 {
    0.0001
}

fn default_max_vol() -> f64 {
    10.0
}

fn default_solver_tol() -> f64 {
    1e-9
}

fn default_risk_free_rate() -> f64 {
    0.04
}

fn default_window_days() -> i64 {
    365
}

fn default_target_days() -> i64 {
    30
}

fn default_target_delta() -> f64 {
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = RepairConfig::from_toml_str("").unwrap();
        assert_eq!(config.history.window_days, 365);
        assert_eq!(config.history.target_days, 30);
        assert_eq!(config.greeks.tree_steps, 100);
        assert_eq!(config.surface.extrapolation, Extrapolation::Flat);
        assert!(config.european_roots.iter().any(|r| r == "SPX"));
    }

    #[test]
    fn parses_nested_sections() {
        let config = RepairConfig::from_toml_str(
            r#"
            extension = "txt"
            [surface]
            extrapolation = "linear"
            [market]
            risk_free_rate = 0.05
            dividend_yield = 0.01
            [market.dividend_yields]
            QQQ = 0.006
            "#,
        )
        .unwrap();
        assert_eq!(config.extension, "txt");
        assert_eq!(config.surface.extrapolation, Extrapolation::Linear);
        assert_eq!(config.market.risk_free_rate, 0.05);
        assert_eq!(config.market.dividend_yields.get("QQQ"), Some(&0.006));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(RepairConfig::from_toml_str("[greeks]\ntree_steps = 0").is_err());
        assert!(RepairConfig::from_toml_str("extension = \".csv\"").is_err());
        assert!(RepairConfig::from_toml_str("[history]\nwindow_days = -1").is_err());
    }

    #[test]
    fn presets_validate() {
        assert!(RepairConfig::production().validate().is_ok());
        assert!(RepairConfig::fast().validate().is_ok());
    }
}
