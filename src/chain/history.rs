//! Rolling ATM IV history of one underlying.
//!
//! The cache lives for one underlying's pass of a run. Each `update` scans
//! only the snapshots in the trailing window that have not been seen yet:
//! extraction runs in parallel over the pending files, then results are
//! merged on the calling thread in date order.

use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::chain::atm::{AtmIv, AtmIvExtractor};
use crate::chain::snapshot::date_from_path;
use crate::chain::types::AtmIvSample;
use crate::error::{RepairError, Result};

pub struct IvHistoryCache {
    dir: PathBuf,
    extension: String,
    window_days: i64,
    samples: BTreeMap<NaiveDate, f64>,
    /// Dates whose snapshot yields no ATM IV; never rescanned
    unavailable: BTreeSet<NaiveDate>,
}

impl IvHistoryCache {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>, window_days: i64) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            window_days,
            samples: BTreeMap::new(),
            unavailable: BTreeSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First date inside the window ending at `date`
    pub fn window_start(&self, date: NaiveDate) -> NaiveDate {
        date - Duration::days(self.window_days)
    }

    /// Snapshots in the window ending at `date` not yet cached or known
    /// unavailable, in date order. Files whose name is not a date are ignored.
    pub fn pending_files(&self, date: NaiveDate) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let start = self.window_start(date);
        let mut pending = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let file_date = match date_from_path(&path) {
                Ok(d) => d,
                Err(_) => {
                    debug!("skipping {}", path.display());
                    continue;
                }
            };
            if file_date < start || file_date > date {
                continue;
            }
            if self.samples.contains_key(&file_date) || self.unavailable.contains(&file_date) {
                continue;
            }
            pending.push((file_date, path));
        }
        pending.sort();
        Ok(pending)
    }

    /// Extend the cache with the window ending at `date` and return the
    /// cached IVs inside that window in date order.
    pub fn update(&mut self, date: NaiveDate, extractor: &AtmIvExtractor) -> Result<Vec<f64>> {
        let pending = self.pending_files(date)?;
        if !pending.is_empty() {
            let scanned: Vec<(NaiveDate, Result<AtmIv>)> = pending
                .par_iter()
                .map(|(d, path)| (*d, extractor.extract_path(path)))
                .collect();

            let mut found = Vec::with_capacity(scanned.len());
            for (d, result) in scanned {
                match result {
                    Ok(AtmIv::Value(iv)) => found.push((d, iv)),
                    Ok(AtmIv::Unavailable) => {
                        self.unavailable.insert(d);
                    }
                    Err(RepairError::NoAtmBracket { side, target, .. }) => {
                        warn!(
                            "{}: no expiry {} {} for {}, ATM IV unavailable",
                            self.dir.display(),
                            side,
                            target,
                            d
                        );
                        self.unavailable.insert(d);
                    }
                    Err(e) => return Err(e),
                }
            }
            let added = self.merge(found);
            info!(
                "{}: scanned {} snapshots, {} new ATM IV samples",
                self.dir.display(),
                pending.len(),
                added
            );
        }
        Ok(self.values(date))
    }

    /// Insert extracted samples; only finite positive IVs are kept.
    /// Returns the number inserted.
    pub fn merge<I>(&mut self, samples: I) -> usize
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut added = 0;
        for (date, iv) in samples {
            if iv.is_finite() && iv > 0.0 {
                self.samples.insert(date, iv);
                added += 1;
            } else {
                self.unavailable.insert(date);
            }
        }
        added
    }

    /// Cached IVs in the window ending at `date`, in date order
    pub fn values(&self, date: NaiveDate) -> Vec<f64> {
        self.samples
            .range(self.window_start(date)..=date)
            .map(|(_, iv)| *iv)
            .collect()
    }

    /// Cached samples in the window ending at `date`
    pub fn samples(&self, date: NaiveDate) -> Vec<AtmIvSample> {
        self.samples
            .range(self.window_start(date)..=date)
            .map(|(d, iv)| AtmIvSample { date: *d, iv: *iv })
            .collect()
    }

    pub fn is_unavailable(&self, date: NaiveDate) -> bool {
        self.unavailable.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn merge_filters_sentinel_and_non_finite() {
        let mut cache = IvHistoryCache::new("unused", "csv", 365);
        let added = cache.merge([
            (d(2024, 1, 2), 0.2),
            (d(2024, 1, 3), AtmIv::sentinel()),
            (d(2024, 1, 4), f64::NAN),
            (d(2024, 1, 5), 0.0),
        ]);
        assert_eq!(added, 1);
        assert_eq!(cache.values(d(2024, 1, 5)), vec![0.2]);
        assert!(cache.is_unavailable(d(2024, 1, 3)));
    }

    #[test]
    fn values_are_limited_to_window() {
        let mut cache = IvHistoryCache::new("unused", "csv", 365);
        cache.merge([
            (d(2022, 12, 31), 0.5),
            (d(2023, 1, 2), 0.3),
            (d(2024, 1, 2), 0.2),
            (d(2024, 1, 3), 0.25),
        ]);
        assert_eq!(cache.values(d(2024, 1, 2)), vec![0.3, 0.2]);
        assert_eq!(cache.len(), 4);
    }
}
