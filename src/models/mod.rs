pub mod bs;
pub mod greeks;
pub mod pricing;
pub mod surface;
pub mod tree;

/// Utility functions shared by the surface and pricing code
pub mod utils {
    use chrono::NaiveDate;

    /// Days in the year used for time-to-maturity
    pub const DAYS_PER_YEAR: f64 = 365.0;

    /// Time to maturity in years on a calendar-day basis.
    ///
    /// Contracts expiring on the snapshot date still have their last session
    /// to run, so the day count is floored at one.
    pub fn year_fraction(date: NaiveDate, expiry: NaiveDate) -> f64 {
        let days = (expiry - date).num_days().max(1);
        days as f64 / DAYS_PER_YEAR
    }

    /// Standardized moneyness: ln(S/K) / sqrt(T)
    pub fn moneyness(spot: f64, strike: f64, tte: f64) -> f64 {
        (spot / strike).ln() / tte.sqrt()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn same_day_expiry_keeps_one_day() {
            let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
            assert_eq!(year_fraction(d, d), 1.0 / 365.0);
        }

        #[test]
        fn moneyness_sign_follows_spot() {
            assert!(moneyness(100.0, 90.0, 0.25) > 0.0);
            assert!(moneyness(100.0, 110.0, 0.25) < 0.0);
            assert_eq!(moneyness(100.0, 100.0, 0.25), 0.0);
        }
    }
}
