//! Cox-Ross-Rubinstein binomial tree with early exercise.
//!
//! Prices American-style contracts on a recombining tree built on the
//! forward drift `r - q`. Node values are rolled back with the larger of
//! continuation and immediate exercise.

use crate::chain::types::OptionRight;
use crate::models::bs::bs_price;

fn payoff(right: OptionRight, spot: f64, strike: f64) -> f64 {
    match right {
        OptionRight::Call => (spot - strike).max(0.0),
        OptionRight::Put => (strike - spot).max(0.0),
    }
}

/// American option price on an `steps`-step CRR tree.
///
/// Falls back to the closed form when the tree is degenerate (no time or
/// no volatility), where early exercise is worth at most intrinsic.
#[allow(clippy::too_many_arguments)]
pub fn american_price(
    right: OptionRight,
    spot: f64,
    strike: f64,
    r: f64,
    q: f64,
    t: f64,
    sigma: f64,
    steps: usize,
) -> f64 {
    if t <= 0.0 || sigma <= 0.0 || steps == 0 {
        return bs_price(right, spot, strike, r, q, t, sigma).max(payoff(right, spot, strike));
    }

    let dt = t / steps as f64;
    let u = (sigma * dt.sqrt()).exp();
    let d = 1.0 / u;
    let growth = ((r - q) * dt).exp();
    let disc = (-r * dt).exp();
    let p_up = ((growth - d) / (u - d)).clamp(0.0, 1.0);
    let p_down = 1.0 - p_up;

    // Terminal payoffs, index = number of up moves
    let mut values: Vec<f64> = (0..=steps)
        .map(|i| {
            let node_spot = spot * u.powi(i as i32) * d.powi((steps - i) as i32);
            payoff(right, node_spot, strike)
        })
        .collect();

    for step in (0..steps).rev() {
        for i in 0..=step {
            let hold = disc * (p_up * values[i + 1] + p_down * values[i]);
            let node_spot = spot * u.powi(i as i32) * d.powi((step - i) as i32);
            values[i] = hold.max(payoff(right, node_spot, strike));
        }
    }

    values[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bs::{bs_call_price, bs_put_price};

    #[test]
    fn call_without_dividends_matches_european() {
        // Early exercise of a call is never optimal when q = 0
        let tree = american_price(OptionRight::Call, 100.0, 100.0, 0.05, 0.0, 1.0, 0.2, 500);
        let bs = bs_call_price(100.0, 100.0, 0.05, 0.0, 1.0, 0.2);
        assert!((tree - bs).abs() < 0.02, "tree {tree} vs bs {bs}");
    }

    #[test]
    fn put_carries_early_exercise_premium() {
        let tree = american_price(OptionRight::Put, 100.0, 110.0, 0.08, 0.0, 1.0, 0.2, 300);
        let bs = bs_put_price(100.0, 110.0, 0.08, 0.0, 1.0, 0.2);
        assert!(tree > bs, "american {tree} should exceed european {bs}");
        assert!(tree >= 10.0);
    }

    #[test]
    fn degenerate_inputs_return_intrinsic() {
        let v = american_price(OptionRight::Put, 90.0, 100.0, 0.05, 0.0, 0.0, 0.2, 100);
        assert!((v - 10.0).abs() < 1e-12);
    }
}
