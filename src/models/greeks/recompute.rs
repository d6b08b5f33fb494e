use chrono::NaiveDate;
use log::debug;

use super::{ContractTerms, Greeks, GreeksEngineFactory, GreeksObservation, ImpliedGreeksFactory};
use crate::chain::config::RepairConfig;
use crate::chain::types::{ContractSymbol, OptionStyle};
use crate::error::{RepairError, Result};
use crate::market::{providers_from_config, DividendYieldProvider, RiskFreeRateProvider};
use crate::models::pricing::{PricingInputs, PricingModel};
use crate::models::utils::year_fraction;

/// Recomputes the Greeks of a contract at a corrected implied volatility.
///
/// Prices the contract and its mirror with the model selected by style,
/// feeds both prices to a fresh Greeks engine, and sanitizes the signs of
/// the result. Holds no mutable state, so one instance serves a whole run.
pub struct GreeksRecomputer {
    rates: Box<dyn RiskFreeRateProvider>,
    dividends: Box<dyn DividendYieldProvider>,
    engines: Box<dyn GreeksEngineFactory>,
    tree_steps: usize,
}

impl GreeksRecomputer {
    pub fn new(
        rates: Box<dyn RiskFreeRateProvider>,
        dividends: Box<dyn DividendYieldProvider>,
        engines: Box<dyn GreeksEngineFactory>,
        tree_steps: usize,
    ) -> Self {
        Self {
            rates,
            dividends,
            engines,
            tree_steps,
        }
    }

    /// Providers and engine settings taken from the configuration.
    pub fn from_config(config: &RepairConfig) -> Result<Self> {
        let (rates, dividends) = providers_from_config(&config.market)?;
        let engines = ImpliedGreeksFactory {
            settings: config.greeks.clone(),
        };
        Ok(Self::new(
            rates,
            dividends,
            Box::new(engines),
            config.greeks.tree_steps,
        ))
    }

    pub fn recompute(
        &self,
        contract: &ContractSymbol,
        style: OptionStyle,
        iv: f64,
        spot: f64,
        date: NaiveDate,
    ) -> Result<Greeks> {
        if !(iv > 0.0) || !iv.is_finite() {
            return Err(RepairError::InvalidInput(format!(
                "implied volatility for {} must be positive, got {iv}",
                contract.ticker()
            )));
        }
        if !(spot > 0.0) || !spot.is_finite() {
            return Err(RepairError::InvalidInput(format!(
                "underlying price must be positive, got {spot}"
            )));
        }

        let mirror = contract.mirror();
        let risk_free_rate = self.rates.risk_free_rate(date);
        let dividend_yield = self.dividends.dividend_yield(contract, date);
        let model = PricingModel::for_style(style, self.tree_steps);
        let tte = year_fraction(date, contract.expiry);

        let inputs = PricingInputs {
            iv,
            spot,
            strike: contract.strike,
            tte,
            risk_free_rate,
            dividend_yield,
            right: contract.right,
        };
        let option_price = model.price(&inputs);
        let mirror_price = model.price(&PricingInputs {
            right: mirror.right,
            ..inputs
        });

        let terms = ContractTerms {
            strike: contract.strike,
            tte,
            risk_free_rate,
            dividend_yield,
            right: contract.right,
            model,
        };
        let mut engine = self.engines.create(&terms);
        engine.update(GreeksObservation {
            underlying_price: spot,
            option_price,
            mirror_price,
        });
        let greeks = engine.greeks()?;
        if !greeks.is_finite() {
            return Err(RepairError::Numerical(format!(
                "non-finite greeks for {}: {greeks:?}",
                contract.ticker()
            )));
        }

        debug!(
            "{} iv={:.6} price={:.4} mirror={:.4} model={:?}",
            contract.ticker(),
            iv,
            option_price,
            mirror_price,
            model
        );

        Ok(greeks.sanitized())
    }
}
