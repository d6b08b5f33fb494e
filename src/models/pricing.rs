use crate::chain::types::{OptionRight, OptionStyle};
use crate::models::bs::bs_price;
use crate::models::tree::american_price;

/// Inputs of one theoretical price evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingInputs {
    pub iv: f64,
    pub spot: f64,
    pub strike: f64,
    /// Time to maturity in years
    pub tte: f64,
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub right: OptionRight,
}

/// Pricing model selected by contract style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingModel {
    /// Binomial tree with early exercise
    American { steps: usize },
    /// Black-Scholes-Merton closed form
    European,
}

impl PricingModel {
    pub fn for_style(style: OptionStyle, tree_steps: usize) -> Self {
        match style {
            OptionStyle::American => PricingModel::American { steps: tree_steps },
            OptionStyle::European => PricingModel::European,
        }
    }

    pub fn price(&self, inputs: &PricingInputs) -> f64 {
        let PricingInputs {
            iv,
            spot,
            strike,
            tte,
            risk_free_rate,
            dividend_yield,
            right,
        } = *inputs;
        match *self {
            PricingModel::American { steps } => american_price(
                right,
                spot,
                strike,
                risk_free_rate,
                dividend_yield,
                tte,
                iv,
                steps,
            ),
            PricingModel::European => {
                bs_price(right, spot, strike, risk_free_rate, dividend_yield, tte, iv)
            }
        }
    }
}
