use roots::find_root_brent;

use super::{ContractTerms, Greeks, GreeksObservation};
use crate::chain::config::GreeksConfig;
use crate::error::{RepairError, Result};
use crate::models::bs::bs_greeks;
use crate::models::pricing::{PricingInputs, PricingModel};

/// Lowest volatility considered by the implied-volatility search
const MIN_VOL: f64 = 1e-4;

/// Upper bound the search may widen to when `max_vol` does not bracket
const VOL_CEILING: f64 = 1e3;

/// One calendar day in years; theta is reported per day
const ONE_DAY: f64 = 1.0 / 365.0;

/// Greeks engine fed with price observations of a contract and its mirror.
pub trait GreeksEngine {
    fn update(&mut self, observation: GreeksObservation);
    fn greeks(&self) -> Result<Greeks>;
}

/// Creates one engine per contract.
pub trait GreeksEngineFactory: Send + Sync {
    fn create(&self, terms: &ContractTerms) -> Box<dyn GreeksEngine>;
}

/// Finite-difference Greeks at the volatility implied by both legs.
///
/// The latest observation is inverted to an implied volatility for the
/// contract and for its mirror with Brent's method; the two are averaged
/// (or whichever solved is used). A leg already priced at its floor value
/// by the lowest volatility carries no volatility information and is left
/// out of the average. European contracts take the closed-form
/// Greeks at that volatility; American ones bump the tree in spot,
/// volatility, time and rate with central differences where possible.
#[derive(Debug, Clone)]
pub struct ImpliedGreeksEngine {
    terms: ContractTerms,
    settings: GreeksConfig,
    last: Option<GreeksObservation>,
}

impl ImpliedGreeksEngine {
    pub fn new(terms: ContractTerms, settings: GreeksConfig) -> Self {
        Self {
            terms,
            settings,
            last: None,
        }
    }

    fn inputs(&self, spot: f64, iv: f64) -> PricingInputs {
        PricingInputs {
            iv,
            spot,
            strike: self.terms.strike,
            tte: self.terms.tte,
            risk_free_rate: self.terms.risk_free_rate,
            dividend_yield: self.terms.dividend_yield,
            right: self.terms.right,
        }
    }

    fn price(&self, inputs: &PricingInputs) -> f64 {
        self.terms.model.price(inputs)
    }

    /// Volatility reproducing `target` for the given leg.
    ///
    /// The upper bound starts at `max_vol` and doubles up to
    /// [`VOL_CEILING`] while the target price stays out of reach.
    fn implied_vol(&self, spot: f64, target: f64, mirror: bool) -> LegVol {
        if !target.is_finite() || target < 0.0 {
            return LegVol::Unbracketed;
        }
        let mut base = self.inputs(spot, MIN_VOL);
        if mirror {
            base.right = base.right.opposite();
        }
        let objective = |vol: f64| -> f64 {
            self.price(&PricingInputs { iv: vol, ..base }) - target
        };

        let tol = self.settings.solver_tol;
        let lo = objective(MIN_VOL);
        if lo.abs() <= tol {
            return LegVol::Flat;
        }
        if lo > 0.0 {
            return LegVol::Unbracketed;
        }

        let mut upper = self.settings.max_vol.max(MIN_VOL * 2.0);
        loop {
            let f = objective(upper);
            if f.is_nan() || (f < 0.0 && upper >= VOL_CEILING) {
                return LegVol::Unbracketed;
            }
            if f >= 0.0 {
                break;
            }
            upper = (upper * 2.0).min(VOL_CEILING);
        }

        match find_root_brent(MIN_VOL, upper, &objective, &mut tol.clone()) {
            Ok(vol) => LegVol::Solved(vol),
            Err(_) => LegVol::Unbracketed,
        }
    }

    /// Volatility at which the Greeks are taken for `obs`.
    fn blended_vol(&self, obs: &GreeksObservation) -> Result<f64> {
        let own = self.implied_vol(obs.underlying_price, obs.option_price, false);
        let mirror = self.implied_vol(obs.underlying_price, obs.mirror_price, true);
        match (own, mirror) {
            (LegVol::Solved(a), LegVol::Solved(b)) => Ok(0.5 * (a + b)),
            (LegVol::Solved(v), _) | (_, LegVol::Solved(v)) => Ok(v),
            // Both legs at their floor: any small volatility reproduces them
            (LegVol::Flat, LegVol::Flat) => Ok(MIN_VOL),
            _ => Err(RepairError::Numerical(format!(
                "no implied volatility reproduces price {} / mirror {} at strike {}",
                obs.option_price, obs.mirror_price, self.terms.strike
            ))),
        }
    }

    fn differentiate(&self, spot: f64, iv: f64) -> Greeks {
        if self.terms.model == PricingModel::European {
            let t = &self.terms;
            if let Some(greeks) = bs_greeks(
                t.right,
                spot,
                t.strike,
                t.risk_free_rate,
                t.dividend_yield,
                t.tte,
                iv,
            ) {
                return greeks;
            }
        }

        let base = self.inputs(spot, iv);
        let p0 = self.price(&base);

        let h = spot * self.settings.spot_bump;
        let p_up = self.price(&PricingInputs { spot: spot + h, ..base });
        let p_dn = self.price(&PricingInputs { spot: spot - h, ..base });
        let delta = (p_up - p_dn) / (2.0 * h);
        let gamma = (p_up - 2.0 * p0 + p_dn) / (h * h);

        let dv = self.settings.vol_bump;
        let vega = if iv > dv {
            let v_up = self.price(&PricingInputs { iv: iv + dv, ..base });
            let v_dn = self.price(&PricingInputs { iv: iv - dv, ..base });
            (v_up - v_dn) / (2.0 * dv)
        } else {
            (self.price(&PricingInputs { iv: iv + dv, ..base }) - p0) / dv
        };

        let dt = ONE_DAY.min(self.terms.tte);
        let theta = if dt > 0.0 {
            let p_later = self.price(&PricingInputs {
                tte: self.terms.tte - dt,
                ..base
            });
            (p_later - p0) / (dt / ONE_DAY)
        } else {
            0.0
        };

        let dr = self.settings.rate_bump;
        let r = self.terms.risk_free_rate;
        let r_up = self.price(&PricingInputs {
            risk_free_rate: r + dr,
            ..base
        });
        let r_dn = self.price(&PricingInputs {
            risk_free_rate: r - dr,
            ..base
        });
        let rho = (r_up - r_dn) / (2.0 * dr);

        Greeks {
            delta,
            gamma,
            // per volatility point and per rate point
            vega: vega * 0.01,
            theta,
            rho: rho * 0.01,
        }
    }
}

impl GreeksEngine for ImpliedGreeksEngine {
    fn update(&mut self, observation: GreeksObservation) {
        self.last = Some(observation);
    }

    fn greeks(&self) -> Result<Greeks> {
        let obs = self.last.ok_or_else(|| {
            RepairError::InvalidInput("greeks requested before any observation".into())
        })?;
        if !(obs.underlying_price > 0.0) {
            return Err(RepairError::InvalidInput(format!(
                "underlying price must be positive, got {}",
                obs.underlying_price
            )));
        }

        let iv = self.blended_vol(&obs)?;
        Ok(self.differentiate(obs.underlying_price, iv))
    }
}

/// Outcome of inverting one leg's price.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LegVol {
    Solved(f64),
    /// Price already reached at the lowest volatility
    Flat,
    Unbracketed,
}

/// Factory for [`ImpliedGreeksEngine`].
#[derive(Debug, Clone, Default)]
pub struct ImpliedGreeksFactory {
    pub settings: GreeksConfig,
}

impl GreeksEngineFactory for ImpliedGreeksFactory {
    fn create(&self, terms: &ContractTerms) -> Box<dyn GreeksEngine> {
        Box::new(ImpliedGreeksEngine::new(*terms, self.settings.clone()))
    }
}
