use serde::{Deserialize, Serialize};

/// A fitted (moneyness, IV) node of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoneynessPoint {
    /// ln(spot / strike) / sqrt(T)
    pub moneyness: f64,
    pub iv: f64,
}

/// Behaviour of surface queries outside the fitted moneyness range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extrapolation {
    /// Hold the boundary IV constant
    #[default]
    Flat,
    /// Extend with the boundary slope of the fitted curve
    Linear,
    /// Reject the query with `RepairError::OutOfDomain`
    Error,
}

/// One quote feeding the ATM term-structure selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmQuote {
    pub delta: f64,
    pub iv: f64,
}
