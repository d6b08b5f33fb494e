use chrono::NaiveDate;
use serde::Serialize;

use crate::chain::types::AtmIvSample;

/// IV rank and percentile of one date against its trailing history.
///
/// - rank: `(current - min) / (max - min)`, 0 when the history is flat
/// - percentile: share of samples strictly below the current IV
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IvStats {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub rank: f64,
    pub percentile: f64,
    pub samples: usize,
}

impl IvStats {
    /// Statistics for `date`, or `None` when the history has no sample on it.
    pub fn from_samples(samples: &[AtmIvSample], date: NaiveDate) -> Option<IvStats> {
        let current = samples.iter().find(|s| s.date == date)?.iv;

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.iv), hi.max(s.iv))
            });
        let rank = if max > min {
            (current - min) / (max - min)
        } else {
            0.0
        };
        let below = samples.iter().filter(|s| s.iv < current).count();

        Some(IvStats {
            current,
            min,
            max,
            rank,
            percentile: below as f64 / samples.len() as f64,
            samples: samples.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(day: u32, iv: f64) -> AtmIvSample {
        AtmIvSample {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            iv,
        }
    }

    #[test]
    fn rank_and_percentile() {
        let history = [sample(2, 0.10), sample(3, 0.30), sample(4, 0.20), sample(5, 0.15)];
        let stats = IvStats::from_samples(&history, sample(4, 0.0).date).unwrap();
        assert_eq!(stats.current, 0.20);
        assert!((stats.rank - 0.5).abs() < 1e-12);
        assert_eq!(stats.percentile, 0.5);
        assert_eq!(stats.samples, 4);
    }

    #[test]
    fn flat_history_has_zero_rank() {
        let history = [sample(2, 0.2), sample(3, 0.2)];
        let stats = IvStats::from_samples(&history, sample(3, 0.0).date).unwrap();
        assert_eq!(stats.rank, 0.0);
        assert_eq!(stats.percentile, 0.0);
    }

    #[test]
    fn needs_a_sample_on_the_date() {
        let history = [sample(2, 0.2)];
        assert!(IvStats::from_samples(&history, sample(3, 0.0).date).is_none());
    }
}
