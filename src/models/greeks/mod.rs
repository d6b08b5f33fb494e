//! Greeks of a single contract at a given implied volatility.

pub mod engine;
pub mod recompute;

pub use engine::*;
pub use recompute::*;

use serde::{Deserialize, Serialize};

use crate::chain::types::OptionRight;
use crate::models::pricing::PricingModel;

/// Option sensitivities as written to a snapshot.
///
/// Vega and rho are per one point of volatility/rate, theta per calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

impl Greeks {
    /// Clamp the signs snapshots are expected to carry:
    /// vega >= 0, theta <= 0, rho >= 0. Delta and gamma pass through.
    pub fn sanitized(self) -> Self {
        Self {
            vega: self.vega.max(0.0),
            theta: self.theta.min(0.0),
            rho: self.rho.max(0.0),
            ..self
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.delta, self.gamma, self.vega, self.theta, self.rho]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One (underlying, option, mirror option) price observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreeksObservation {
    pub underlying_price: f64,
    pub option_price: f64,
    pub mirror_price: f64,
}

/// Everything a Greeks engine needs to reprice one contract
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractTerms {
    pub strike: f64,
    /// Time to maturity in years
    pub tte: f64,
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub right: OptionRight,
    pub model: PricingModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_only_vega_theta_rho() {
        let raw = Greeks {
            delta: -0.4,
            gamma: -0.01,
            vega: -0.2,
            theta: 0.05,
            rho: -0.3,
        };
        let clean = raw.sanitized();
        assert_eq!(clean.delta, -0.4);
        assert_eq!(clean.gamma, -0.01);
        assert_eq!(clean.vega, 0.0);
        assert_eq!(clean.theta, 0.0);
        assert_eq!(clean.rho, 0.0);
    }
}
