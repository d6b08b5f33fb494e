//! Term-structure interpolation of ATM implied volatility
//!
//! A snapshot holds many expiries; downstream rank/percentile features want a
//! single constant-maturity ATM IV per date. This module brackets the target
//! tenor with the nearest listed expiries, picks an ATM proxy inside each
//! expiry, and blends the two linearly in calendar days.
//!
//! # Selection
//!
//! - **Near expiry**: latest expiry on or before the target date
//! - **Far expiry**: earliest expiry on or after the target date
//! - **ATM proxy**: the quote whose delta is closest to the target delta
//!   (0.5 by default); ties keep the first quote in file order
//!
//! # Blend
//!
//! ```text
//! iv = (near_iv * (far - target) + far_iv * (target - near)) / (far - near)
//! ```
//!
//! When the target falls exactly on a listed expiry the near and far
//! expiries coincide and that expiry's ATM IV is returned unchanged.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::types::AtmQuote;
use crate::error::BracketSide;

/// Quotes grouped by expiry, each group in file order
pub type ExpiryGroups = BTreeMap<NaiveDate, Vec<AtmQuote>>;

/// Near and far expiries around `target`.
///
/// Returns the missing side when the target is not bracketed.
pub fn bracket_expiries(
    groups: &ExpiryGroups,
    target: NaiveDate,
) -> std::result::Result<(NaiveDate, NaiveDate), BracketSide> {
    let near = groups
        .range(..=target)
        .next_back()
        .map(|(expiry, _)| *expiry)
        .ok_or(BracketSide::Near)?;
    let far = groups
        .range(target..)
        .next()
        .map(|(expiry, _)| *expiry)
        .ok_or(BracketSide::Far)?;
    Ok((near, far))
}

/// Quote whose delta is nearest `target_delta`; the first one wins ties.
pub fn select_atm(quotes: &[AtmQuote], target_delta: f64) -> Option<&AtmQuote> {
    let mut best: Option<&AtmQuote> = None;
    for quote in quotes {
        let distance = (quote.delta - target_delta).abs();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some(b) if (b.delta - target_delta).abs() <= distance => {}
            _ => best = Some(quote),
        }
    }
    best
}

/// Linear blend in calendar days between the near and far ATM IVs.
pub fn blend_atm_iv(
    near: (NaiveDate, f64),
    far: (NaiveDate, f64),
    target: NaiveDate,
) -> f64 {
    let (near_expiry, near_iv) = near;
    let (far_expiry, far_iv) = far;
    if near_expiry == far_expiry {
        return near_iv;
    }

    let far_to_target = (far_expiry - target).num_days() as f64;
    let target_to_near = (target - near_expiry).num_days() as f64;
    let far_to_near = (far_expiry - near_expiry).num_days() as f64;

    (near_iv * far_to_target + far_iv * target_to_near) / far_to_near
}

/// Constant-maturity ATM IV at `target`, or the unbracketed side.
pub fn atm_iv_at(
    groups: &ExpiryGroups,
    target: NaiveDate,
    target_delta: f64,
) -> std::result::Result<f64, BracketSide> {
    let (near, far) = bracket_expiries(groups, target)?;

    // Groups are never empty: they are built from at least one quote
    let near_iv = groups
        .get(&near)
        .and_then(|q| select_atm(q, target_delta))
        .map(|q| q.iv)
        .ok_or(BracketSide::Near)?;
    if near == far {
        return Ok(near_iv);
    }
    let far_iv = groups
        .get(&far)
        .and_then(|q| select_atm(q, target_delta))
        .map(|q| q.iv)
        .ok_or(BracketSide::Far)?;

    Ok(blend_atm_iv((near, near_iv), (far, far_iv), target))
}
