// Black-Scholes-Merton closed form for European options with a continuous
// dividend yield. Used directly for European-style contracts and as the
// reference the binomial tree converges to.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::chain::types::OptionRight;
use crate::models::greeks::Greeks;

fn norm_cdf(x: f64) -> f64 {
    // 0.5 * [1 + erf(x / sqrt(2))]
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Intrinsic value discounted as a zero-volatility forward payoff.
#[allow(non_snake_case)]
fn degenerate_price(right: OptionRight, S: f64, K: f64, r: f64, q: f64, T: f64) -> f64 {
    let forward_leg = S * (-q * T).exp();
    let strike_leg = K * (-r * T).exp();
    match right {
        OptionRight::Call => (forward_leg - strike_leg).max(0.0),
        OptionRight::Put => (strike_leg - forward_leg).max(0.0),
    }
}

/// Price of a European call option under Black-Scholes assumptions.
#[allow(non_snake_case)]
pub fn bs_call_price(S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return degenerate_price(OptionRight::Call, S, K, r, q, T.max(0.0));
    }
    let d1 = ((S / K).ln() + (r - q + 0.5 * sigma.powi(2)) * T) / (sigma * T.sqrt());
    let d2 = d1 - sigma * T.sqrt();
    S * (-q * T).exp() * norm_cdf(d1) - K * (-r * T).exp() * norm_cdf(d2)
}

/// Price of a European put option under Black-Scholes assumptions.
#[allow(non_snake_case)]
pub fn bs_put_price(S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return degenerate_price(OptionRight::Put, S, K, r, q, T.max(0.0));
    }
    let d1 = ((S / K).ln() + (r - q + 0.5 * sigma.powi(2)) * T) / (sigma * T.sqrt());
    let d2 = d1 - sigma * T.sqrt();
    K * (-r * T).exp() * norm_cdf(-d2) - S * (-q * T).exp() * norm_cdf(-d1)
}

#[allow(non_snake_case)]
pub fn bs_price(right: OptionRight, S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    match right {
        OptionRight::Call => bs_call_price(S, K, r, q, T, sigma),
        OptionRight::Put => bs_put_price(S, K, r, q, T, sigma),
    }
}

/// Closed-form Black-Scholes-Merton Greeks.
///
/// Same units as the finite-difference engine: vega and rho per point,
/// theta per calendar day. `None` when T or sigma is not positive.
#[allow(non_snake_case)]
pub fn bs_greeks(
    right: OptionRight,
    S: f64,
    K: f64,
    r: f64,
    q: f64,
    T: f64,
    sigma: f64,
) -> Option<Greeks> {
    if !(T > 0.0) || !(sigma > 0.0) {
        return None;
    }
    let n = Normal::new(0.0, 1.0).ok()?;
    let sqrt_t = T.sqrt();
    let d1 = ((S / K).ln() + (r - q + 0.5 * sigma * sigma) * T) / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;
    let df_q = (-q * T).exp();
    let df_r = (-r * T).exp();
    let pdf_d1 = n.pdf(d1);

    let gamma = df_q * pdf_d1 / (S * sigma * sqrt_t);
    let vega = S * df_q * pdf_d1 * sqrt_t;
    let decay = -S * df_q * pdf_d1 * sigma / (2.0 * sqrt_t);

    let (delta, theta, rho) = match right {
        OptionRight::Call => (
            df_q * n.cdf(d1),
            decay - r * K * df_r * n.cdf(d2) + q * S * df_q * n.cdf(d1),
            K * T * df_r * n.cdf(d2),
        ),
        OptionRight::Put => (
            -df_q * n.cdf(-d1),
            decay + r * K * df_r * n.cdf(-d2) - q * S * df_q * n.cdf(-d1),
            -K * T * df_r * n.cdf(-d2),
        ),
    };

    Some(Greeks {
        delta,
        gamma,
        vega: vega * 0.01,
        theta: theta / 365.0,
        rho: rho * 0.01,
    })
}
