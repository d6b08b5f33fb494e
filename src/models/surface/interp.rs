use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::types::*;
use crate::chain::types::ContractRow;
use crate::error::{RepairError, Result};
use crate::models::utils::{moneyness, year_fraction};

/// Resolution at which two moneyness values count as the same node
const MONEYNESS_KEY_SCALE: f64 = 1e8;

/// Compute sorted (moneyness, IV) nodes from contract rows.
///
/// Rows with IV <= 0 are skipped so failed quotes never shape the surface.
/// Rows landing on the same moneyness (a call and a put at one strike and
/// expiry) are averaged, leaving strictly increasing abscissae.
pub fn prepare_points(rows: &[ContractRow], spot: f64, date: NaiveDate) -> Vec<MoneynessPoint> {
    let mut buckets: BTreeMap<i64, (f64, f64, usize)> = BTreeMap::new();

    for row in rows {
        if !(row.iv > 0.0) {
            continue;
        }
        let x = moneyness(spot, row.strike(), year_fraction(date, row.expiry()));
        if !x.is_finite() {
            continue;
        }
        let key = (x * MONEYNESS_KEY_SCALE).round() as i64;
        let entry = buckets.entry(key).or_insert((0.0, 0.0, 0));
        entry.0 += x;
        entry.1 += row.iv;
        entry.2 += 1;
    }

    buckets
        .into_values()
        .map(|(x_sum, iv_sum, n)| MoneynessPoint {
            moneyness: x_sum / n as f64,
            iv: iv_sum / n as f64,
        })
        .collect()
}

/// Akima cubic with Fritsch-Carlson slope limiting.
///
/// Node slopes start from Akima's weighted secant average and are then
/// limited so every segment is monotone between its endpoint values. The
/// curve therefore never leaves `[min(y), max(y)]` inside the fitted range.
#[derive(Debug, Clone)]
pub struct AkimaSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    slopes: Vec<f64>,
    extrapolation: Extrapolation,
}

impl AkimaSpline {
    /// Fit through strictly increasing `xs`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, extrapolation: Extrapolation) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(RepairError::InvalidInput(format!(
                "abscissae and ordinates differ in length: {} vs {}",
                xs.len(),
                ys.len()
            )));
        }
        if xs.is_empty() {
            return Err(RepairError::InsufficientPoints { found: 0, required: 1 });
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(RepairError::InvalidInput(
                "abscissae must be strictly increasing".into(),
            ));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(RepairError::InvalidInput("non-finite surface node".into()));
        }

        let slopes = akima_slopes(&xs, &ys);
        Ok(Self {
            xs,
            ys,
            slopes,
            extrapolation,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn value(&self, x: f64) -> Result<f64> {
        let n = self.xs.len();
        let (lo, hi) = self.domain();

        if n == 1 {
            return match self.extrapolation {
                Extrapolation::Error if x != lo => Err(RepairError::OutOfDomain { x, lo, hi }),
                _ => Ok(self.ys[0]),
            };
        }

        if x < lo || x > hi {
            let (x0, y0, m0) = if x < lo {
                (lo, self.ys[0], self.slopes[0])
            } else {
                (hi, self.ys[n - 1], self.slopes[n - 1])
            };
            return match self.extrapolation {
                Extrapolation::Flat => Ok(y0),
                Extrapolation::Linear => Ok(y0 + m0 * (x - x0)),
                Extrapolation::Error => Err(RepairError::OutOfDomain { x, lo, hi }),
            };
        }

        // First node strictly greater than x, clamped to a valid segment
        let upper = self.xs.partition_point(|&xi| xi <= x).clamp(1, n - 1);
        let i = upper - 1;
        Ok(hermite_eval(
            self.xs[i],
            self.xs[i + 1],
            self.ys[i],
            self.ys[i + 1],
            self.slopes[i],
            self.slopes[i + 1],
            x,
        ))
    }
}

fn akima_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n == 1 {
        return vec![0.0];
    }

    let secants: Vec<f64> = (0..n - 1)
        .map(|i| (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]))
        .collect();

    if n == 2 {
        return vec![secants[0], secants[0]];
    }

    // Secants padded with two linearly extended values on each side:
    // m[k + 2] = secants[k]
    let mut m = vec![0.0; n + 3];
    m[2..n + 1].copy_from_slice(&secants);
    m[1] = 2.0 * m[2] - m[3];
    m[0] = 2.0 * m[1] - m[2];
    m[n + 1] = 2.0 * m[n] - m[n - 1];
    m[n + 2] = 2.0 * m[n + 1] - m[n];

    let mut d: Vec<f64> = (0..n)
        .map(|i| {
            let w_left = (m[i + 3] - m[i + 2]).abs();
            let w_right = (m[i + 1] - m[i]).abs();
            if w_left + w_right <= f64::EPSILON {
                0.5 * (m[i + 1] + m[i + 2])
            } else {
                (w_left * m[i + 1] + w_right * m[i + 2]) / (w_left + w_right)
            }
        })
        .collect();

    // Local extrema and plateaus get a flat tangent
    for k in 1..n - 1 {
        if secants[k - 1] * secants[k] <= 0.0 {
            d[k] = 0.0;
        }
    }

    for (k, &delta) in secants.iter().enumerate() {
        if delta == 0.0 {
            d[k] = 0.0;
            d[k + 1] = 0.0;
            continue;
        }
        if d[k] * delta < 0.0 {
            d[k] = 0.0;
        }
        if d[k + 1] * delta < 0.0 {
            d[k + 1] = 0.0;
        }
        let alpha = d[k] / delta;
        let beta = d[k + 1] / delta;
        let radius = alpha * alpha + beta * beta;
        if radius > 9.0 {
            let tau = 3.0 / radius.sqrt();
            d[k] = tau * alpha * delta;
            d[k + 1] = tau * beta * delta;
        }
    }

    d
}

#[inline]
fn hermite_eval(x0: f64, x1: f64, y0: f64, y1: f64, m0: f64, m1: f64, x: f64) -> f64 {
    let h = x1 - x0;
    let s = (x - x0) / h;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    h00 * y0 + h10 * h * m0 + h01 * y1 + h11 * h * m1
}

/// IV surface over standardized moneyness for one snapshot date.
#[derive(Debug, Clone)]
pub struct SurfaceInterpolator {
    spot: f64,
    date: NaiveDate,
    points: Vec<MoneynessPoint>,
    spline: AkimaSpline,
}

impl SurfaceInterpolator {
    /// Fit the surface from the snapshot's contract rows.
    ///
    /// Only rows with IV > 0 are used. Fails with `InsufficientPoints` when
    /// no row qualifies.
    pub fn fit(
        rows: &[ContractRow],
        spot: f64,
        date: NaiveDate,
        extrapolation: Extrapolation,
    ) -> Result<Self> {
        if !(spot > 0.0) || !spot.is_finite() {
            return Err(RepairError::InvalidInput(format!(
                "underlying close must be positive, got {spot}"
            )));
        }

        let points = prepare_points(rows, spot, date);
        if points.is_empty() {
            return Err(RepairError::InsufficientPoints { found: 0, required: 1 });
        }

        let (xs, ys): (Vec<f64>, Vec<f64>) = points.iter().map(|p| (p.moneyness, p.iv)).unzip();
        let spline = AkimaSpline::new(xs, ys, extrapolation)?;

        Ok(Self {
            spot,
            date,
            points,
            spline,
        })
    }

    /// Fitted nodes, sorted by moneyness
    pub fn points(&self) -> &[MoneynessPoint] {
        &self.points
    }

    pub fn moneyness_of(&self, strike: f64, expiry: NaiveDate) -> f64 {
        moneyness(self.spot, strike, year_fraction(self.date, expiry))
    }

    /// IV at a strike/expiry, read off the fitted moneyness curve.
    pub fn interpolated_iv(&self, strike: f64, expiry: NaiveDate) -> Result<f64> {
        if !(strike > 0.0) {
            return Err(RepairError::InvalidInput(format!(
                "strike must be positive, got {strike}"
            )));
        }
        self.spline.value(self.moneyness_of(strike, expiry))
    }
}
