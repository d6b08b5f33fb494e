use log::{debug, info, warn};
use std::path::Path;

use crate::chain::snapshot::{SnapshotFile, COL_CLOSE, COL_IV, COL_SECURITY_ID, COL_TICKER};
use crate::chain::types::ContractRow;
use crate::error::{RepairError, Result};
use crate::models::greeks::GreeksRecomputer;
use crate::models::surface::{Extrapolation, SurfaceInterpolator};

/// Columns the corrector needs before it touches a file
pub const CORRECTOR_COLUMNS: [&str; 4] = [COL_IV, COL_SECURITY_ID, COL_TICKER, COL_CLOSE];

/// What happened to one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// Required headers absent; file left as it was
    MissingColumns(Vec<&'static str>),
    /// No contract row had a zero IV; file left as it was
    NothingToCorrect,
    /// Zero-IV rows exist but no row has a usable IV to fit a surface
    NoSurface { zero_rows: usize },
    /// Rows rewritten with interpolated IV and recomputed Greeks
    Corrected { rows: usize },
}

impl CorrectionOutcome {
    pub fn corrected_rows(&self) -> usize {
        match self {
            CorrectionOutcome::Corrected { rows } => *rows,
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CorrectionOutcome::MissingColumns(_) => "missing_columns",
            CorrectionOutcome::NothingToCorrect => "nothing_to_correct",
            CorrectionOutcome::NoSurface { .. } => "no_surface",
            CorrectionOutcome::Corrected { .. } => "corrected",
        }
    }
}

/// Rewrites zero-IV rows of a snapshot from the surface of its valid rows.
pub struct SnapshotCorrector<'a> {
    recomputer: &'a GreeksRecomputer,
    extrapolation: Extrapolation,
    european_roots: &'a [String],
}

impl<'a> SnapshotCorrector<'a> {
    pub fn new(
        recomputer: &'a GreeksRecomputer,
        extrapolation: Extrapolation,
        european_roots: &'a [String],
    ) -> Self {
        Self {
            recomputer,
            extrapolation,
            european_roots,
        }
    }

    /// Correct the snapshot at `path` in place.
    ///
    /// Only rows whose IV parses to exactly zero change: their IV and the
    /// five Greek fields after it are overwritten. The file is replaced
    /// atomically and only when at least one row changed.
    pub fn correct(&self, path: &Path) -> Result<CorrectionOutcome> {
        let mut snapshot = SnapshotFile::read(path)?;

        let missing = snapshot.columns().missing(&CORRECTOR_COLUMNS);
        if !missing.is_empty() {
            info!("{}: missing columns {:?}, left unchanged", path.display(), missing);
            return Ok(CorrectionOutcome::MissingColumns(missing));
        }

        let rows = snapshot
            .contract_rows()
            .map(|row| snapshot.contract_row(row, self.european_roots))
            .collect::<Result<Vec<ContractRow>>>()?;

        let targets: Vec<&ContractRow> = rows.iter().filter(|r| r.iv == 0.0).collect();
        if targets.is_empty() {
            debug!("{}: no zero IV rows", path.display());
            return Ok(CorrectionOutcome::NothingToCorrect);
        }

        let date = snapshot.date();
        let spot = snapshot.underlying_close()?;
        let surface = match SurfaceInterpolator::fit(&rows, spot, date, self.extrapolation) {
            Ok(surface) => surface,
            Err(RepairError::InsufficientPoints { .. }) => {
                warn!(
                    "{}: {} zero IV rows but no valid IV to interpolate from",
                    path.display(),
                    targets.len()
                );
                return Ok(CorrectionOutcome::NoSurface {
                    zero_rows: targets.len(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut updates = Vec::with_capacity(targets.len());
        for row in &targets {
            let iv = surface.interpolated_iv(row.strike(), row.expiry())?;
            let greeks = self
                .recomputer
                .recompute(&row.symbol, row.style, iv, spot, date)?;
            debug!(
                "{} row {}: iv={:.6} delta={:.4} vega={:.4} theta={:.4}",
                row.ticker, row.row, iv, greeks.delta, greeks.vega, greeks.theta
            );
            updates.push((
                row.row,
                [iv, greeks.delta, greeks.gamma, greeks.vega, greeks.theta, greeks.rho],
            ));
        }

        for (row, values) in updates.iter().copied() {
            snapshot.overwrite_iv_and_greeks(row, values)?;
        }
        snapshot.write_atomic()?;

        info!(
            "{}: corrected {} of {} contracts from {} surface points",
            path.display(),
            updates.len(),
            rows.len(),
            surface.points().len()
        );
        Ok(CorrectionOutcome::Corrected {
            rows: updates.len(),
        })
    }
}
