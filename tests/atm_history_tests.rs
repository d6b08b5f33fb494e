
use approx::assert_relative_eq;
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;

use surface_repair::{
    extract_atm_iv, AtmIv, AtmIvExtractor, BracketSide, CorrectionOutcome, HistoryConfig,
    IvHistoryCache, RepairConfig, RepairError, RunController,
};
use test_utils::*;

// ================================================================================================
// ATM IV EXTRACTION
// ================================================================================================

/// Tests that a target landing on a listed expiry returns that expiry's
/// delta-nearest IV unchanged.
#[test]
fn test_target_on_expiry_returns_exact_iv() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = atm_chain("SPY", &[("240119", 0.19), ("240201", 0.2137), ("240315", 0.25)]);
    let path = write_snapshot(&tmp.path().join("SPY"), date(2024, 1, 2), 100.0, &rows);

    let iv = extract_atm_iv(&path, &HistoryConfig::default()).unwrap();
    assert_eq!(iv, AtmIv::Value(0.2137));
}

/// Tests the linear blend in calendar days between bracketing expiries.
#[test]
fn test_blend_between_bracketing_expiries() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = atm_chain("SPY", &[("240119", 0.20), ("240216", 0.30)]);
    let path = write_snapshot(&tmp.path().join("SPY"), date(2024, 1, 2), 100.0, &rows);

    let iv = extract_atm_iv(&path, &HistoryConfig::default())
        .unwrap()
        .value()
        .unwrap();
    // target 2024-02-01: 13 days after near, 15 days before far
    assert_relative_eq!(iv, (0.20 * 15.0 + 0.30 * 13.0) / 28.0, epsilon = 1e-12);
    assert!(iv > 0.20 && iv < 0.30);
}

/// Tests that equal delta distances keep the first row in file order and
/// that zero-IV rows are never selected.
#[test]
fn test_delta_ties_and_zero_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = vec![
        TestContract::new(osi("SPY", "240201", 'C', 100.0), 0.0, 0.50),
        TestContract::new(osi("SPY", "240201", 'C', 101.0), 0.24, 0.75),
        TestContract::new(osi("SPY", "240201", 'C', 99.0), 0.26, 0.25),
        TestContract::new(osi("SPY", "240201", 'C', 120.0), 0.31, 0.10),
    ];
    let path = write_snapshot(&tmp.path().join("SPY"), date(2024, 1, 2), 100.0, &rows);

    let iv = extract_atm_iv(&path, &HistoryConfig::default()).unwrap();
    assert_eq!(iv, AtmIv::Value(0.24));
}

/// Tests that a snapshot without a delta column yields no ATM IV.
#[test]
fn test_missing_delta_column_is_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = atm_chain("SPY", &[("240119", 0.20), ("240216", 0.30)]);
    let text = snapshot_text("SPY", 100.0, &rows).replacen(",delta,", ",d,", 1);
    let path = write_raw(&tmp.path().join("SPY"), date(2024, 1, 2), &text);

    let iv = extract_atm_iv(&path, &HistoryConfig::default()).unwrap();
    assert_eq!(iv, AtmIv::Unavailable);
    assert_eq!(iv.or_sentinel(), AtmIv::sentinel());
    assert_eq!(AtmIv::sentinel(), -1.0);
}

/// Tests that an unbracketed target names the missing side.
#[test]
fn test_unbracketed_target_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("SPY");
    let extractor = AtmIvExtractor::default();

    let short_chain = atm_chain("SPY", &[("240119", 0.2)]);
    let short = write_snapshot(&dir, date(2024, 1, 2), 100.0, &short_chain);
    match extractor.extract_path(&short) {
        Err(RepairError::NoAtmBracket { side, target, .. }) => {
            assert_eq!(side, BracketSide::Far);
            assert_eq!(target, date(2024, 2, 1));
        }
        other => panic!("expected NoAtmBracket, got {other:?}"),
    }

    let long_chain = atm_chain("SPY", &[("240621", 0.2)]);
    let long = write_snapshot(&dir, date(2024, 1, 3), 100.0, &long_chain);
    assert!(matches!(
        extractor.extract_path(&long),
        Err(RepairError::NoAtmBracket { side: BracketSide::Near, .. })
    ));
}

// ================================================================================================
// IV HISTORY
// ================================================================================================

/// Tests incremental scanning: unavailable dates are remembered, files
/// outside the window or not named by date are skipped.
#[test]
fn test_history_scan_and_window() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("SPY");
    let expiries = |iv: f64| atm_chain("SPY", &[("240119", iv), ("240315", iv)]);

    write_snapshot(&dir, date(2024, 1, 2), 100.0, &expiries(0.20));
    write_snapshot(&dir, date(2024, 1, 3), 100.0, &expiries(0.22));
    // No expiry after the target date
    write_snapshot(&dir, date(2024, 1, 4), 100.0, &atm_chain("SPY", &[("240119", 0.5)]));
    write_snapshot(&dir, date(2024, 1, 5), 100.0, &expiries(0.18));
    // Outside a 365-day window ending 2024-01-05
    let stale = atm_chain("SPY", &[("221215", 0.4), ("230120", 0.4)]);
    write_snapshot(&dir, date(2022, 12, 1), 100.0, &stale);
    fs::write(dir.join("notes.csv"), "not a snapshot").unwrap();
    fs::write(dir.join("20240103.bak"), "stale").unwrap();

    let extractor = AtmIvExtractor::default();
    let mut cache = IvHistoryCache::new(&dir, "csv", 365);

    let values = cache.update(date(2024, 1, 3), &extractor).unwrap();
    assert_eq!(values.len(), 2);
    assert_relative_eq!(values[0], 0.20, epsilon = 1e-12);
    assert_relative_eq!(values[1], 0.22, epsilon = 1e-12);

    let values = cache.update(date(2024, 1, 5), &extractor).unwrap();
    assert_eq!(values.len(), 3);
    assert_relative_eq!(values[2], 0.18, epsilon = 1e-12);
    assert!(cache.is_unavailable(date(2024, 1, 4)));
    assert_eq!(cache.len(), 3);

    // Nothing left to scan in the window
    assert!(cache.pending_files(date(2024, 1, 5)).unwrap().is_empty());
}

/// Tests that the merged history does not depend on arrival order.
#[test]
fn test_merge_is_order_independent() {
    let samples: Vec<_> = (0..120)
        .map(|i| {
            let day = date(2023, 6, 1) + chrono::Duration::days(i);
            let iv = if i % 17 == 0 {
                AtmIv::sentinel()
            } else {
                0.15 + 0.001 * ((i * 37) % 100) as f64
            };
            (day, iv)
        })
        .collect();

    let mut ordered = IvHistoryCache::new("unused", "csv", 365);
    ordered.merge(samples.iter().copied());

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..5 {
        let mut shuffled = samples.clone();
        shuffled.shuffle(&mut rng);
        let mut cache = IvHistoryCache::new("unused", "csv", 365);
        cache.merge(shuffled);

        let end = date(2023, 12, 31);
        assert_eq!(cache.values(end), ordered.values(end));
        assert_eq!(cache.samples(end), ordered.samples(end));
    }
    assert!(ordered.values(date(2023, 12, 31)).iter().all(|v| *v > 0.0));
}

// ================================================================================================
// RUN CONTROLLER
// ================================================================================================

fn run_config(root: &std::path::Path) -> RepairConfig {
    RepairConfig {
        data_root: root.to_path_buf(),
        underlyings: vec!["SPY".to_string()],
        ..RepairConfig::fast()
    }
}

fn chain_with_zero_row(atm_iv: f64) -> Vec<TestContract> {
    let mut rows = atm_chain("SPY", &[("240119", atm_iv), ("240315", atm_iv + 0.02)]);
    rows.push(TestContract::new(osi("SPY", "240315", 'C', 105.0), 0.0, 0.0));
    rows
}

/// Tests a two-date run: both files corrected, history and stats reported.
#[test]
fn test_run_corrects_and_reports_stats() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("SPY");
    write_snapshot(&dir, date(2024, 1, 2), 100.0, &chain_with_zero_row(0.20));
    write_snapshot(&dir, date(2024, 1, 3), 100.0, &chain_with_zero_row(0.24));

    let controller = RunController::new(run_config(tmp.path())).unwrap();
    // Out of order and duplicated on purpose
    let report = controller
        .run(&[date(2024, 1, 3), date(2024, 1, 2), date(2024, 1, 3)])
        .unwrap();

    assert_eq!(report.underlyings.len(), 1);
    let spy = &report.underlyings[0];
    assert_eq!(spy.dates.len(), 2);
    assert_eq!(spy.dates[0].date, date(2024, 1, 2));
    assert_eq!(spy.dates[0].outcome, CorrectionOutcome::Corrected { rows: 1 });
    assert_eq!(report.corrected_rows(), 2);

    let last = spy.dates[1].stats.expect("stats for 2024-01-03");
    assert_eq!(last.samples, 2);
    assert_eq!(last.rank, 1.0);
    assert_eq!(last.percentile, 0.5);

    let stats_path = tmp.path().join("stats.csv");
    report.write_csv(&stats_path).unwrap();
    let text = fs::read_to_string(&stats_path).unwrap();
    assert!(text.lines().next().unwrap().contains("percentile"));
    assert_eq!(text.lines().count(), 3);

    // A rerun finds nothing left to correct
    let again = controller.run(&[date(2024, 1, 2)]).unwrap();
    assert_eq!(
        again.underlyings[0].dates[0].outcome,
        CorrectionOutcome::NothingToCorrect
    );
}

/// Tests that a missing snapshot aborts the run while earlier writes stay.
#[test]
fn test_missing_snapshot_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("SPY");
    let first = write_snapshot(&dir, date(2024, 1, 2), 100.0, &chain_with_zero_row(0.20));

    let controller = RunController::new(run_config(tmp.path())).unwrap();
    let err = controller
        .run(&[date(2024, 1, 2), date(2024, 1, 3)])
        .unwrap_err();
    match err {
        RepairError::MissingFile { underlying, date: missing, .. } => {
            assert_eq!(underlying, "SPY");
            assert_eq!(missing, date(2024, 1, 3));
        }
        other => panic!("expected MissingFile, got {other:?}"),
    }

    // The zero row of the first date was already repaired
    let iv: f64 = field(&first, 8, 3).parse().unwrap();
    assert!(iv > 0.0);
}

/// Tests that underlyings default to the sorted sub-directories.
#[test]
fn test_underlyings_from_data_root() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["QQQ", "IWM", "SPY"] {
        fs::create_dir_all(tmp.path().join(name)).unwrap();
    }
    fs::write(tmp.path().join("README"), "").unwrap();

    let config = RepairConfig {
        data_root: tmp.path().to_path_buf(),
        ..RepairConfig::fast()
    };
    let controller = RunController::new(config).unwrap();
    assert_eq!(controller.underlyings().unwrap(), vec!["IWM", "QQQ", "SPY"]);
}
