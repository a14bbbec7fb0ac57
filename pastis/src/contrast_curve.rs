//! Contrast versus wavefront-error RMS ("hockey-stick" curve).
//!
//! For each RMS level, random aberrations are drawn and their mean dark-hole
//! contrast is evaluated three ways: with the reference simulator, with the
//! analytical model and with the PASTIS matrix. Agreement between the matrix
//! and the simulator at small RMS validates the matrix; the RMS where they
//! part marks the end of the quadratic regime.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::aberration::random_rms_aberration;
use crate::error::PastisError;
use crate::matrix::PastisMatrix;
use crate::probe::ContrastProbe;

/// Contrast of one aberration from the three predictors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContrastComparison {
    pub simulator: f64,
    pub analytical: f64,
    pub matrix: f64,
}

impl ContrastComparison {
    /// `|matrix - simulator| / simulator`.
    pub fn matrix_relative_error(&self) -> f64 {
        (self.matrix - self.simulator).abs() / self.simulator.abs().max(f64::MIN_POSITIVE)
    }
}

/// Mean contrasts over all realizations drawn at one RMS level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub rms_nm: f64,
    pub realizations: usize,
    pub simulator: f64,
    pub analytical: f64,
    pub matrix: f64,
}

/// Evaluate one aberration with every predictor.
pub fn compare_contrasts<S, A>(
    aberration_nm: &[f64],
    simulator: &S,
    analytical: &A,
    matrix: &PastisMatrix,
) -> Result<ContrastComparison, PastisError>
where
    S: ContrastProbe + ?Sized,
    A: ContrastProbe + ?Sized,
{
    Ok(ContrastComparison {
        simulator: simulator.mean_contrast(aberration_nm)?,
        analytical: analytical.mean_contrast(aberration_nm)?,
        matrix: matrix.contrast(aberration_nm)?,
    })
}

/// `points` RMS values spaced evenly in log10 between `10^lower` and `10^upper` nm.
pub fn log_spaced_rms(lower_exp: f64, upper_exp: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![10f64.powf(lower_exp)],
        _ => {
            let step = (upper_exp - lower_exp) / (points - 1) as f64;
            (0..points)
                .map(|k| 10f64.powf(lower_exp + step * k as f64))
                .collect()
        }
    }
}

/// Sweep of random aberrations over `rms_values`.
#[derive(Debug, Clone)]
pub struct ContrastSweep {
    realizations: usize,
    obscured_segment: Option<usize>,
    seed: u64,
}

impl ContrastSweep {
    pub fn new(realizations: usize, seed: u64) -> Self {
        Self {
            realizations,
            obscured_segment: None,
            seed,
        }
    }

    /// Keep the obscured segment at zero in every drawn aberration.
    pub fn with_obscured_segment(mut self, obscured: Option<usize>) -> Self {
        self.obscured_segment = obscured;
        self
    }

    /// The aberrations used at one RMS level; identical for identical seeds.
    pub fn realizations_at(&self, level: usize, rms_nm: f64, segments: usize) -> Vec<Vec<f64>> {
        (0..self.realizations)
            .map(|k| {
                let seed = self
                    .seed
                    .wrapping_add((level * self.realizations + k) as u64);
                let mut rng = StdRng::seed_from_u64(seed);
                random_rms_aberration(segments, rms_nm, self.obscured_segment, &mut rng)
            })
            .collect()
    }

    /// Mean contrast of each predictor at every RMS level.
    ///
    /// Realizations within a level are evaluated in parallel. `on_point` is
    /// called after each level completes.
    ///
    /// # Errors
    /// `InvalidConfig` for zero realizations; `Dimension` when the predictors
    /// disagree on the segment count; probe errors propagate.
    pub fn run<S, A, F>(
        &self,
        simulator: &S,
        analytical: &A,
        matrix: &PastisMatrix,
        rms_values: &[f64],
        on_point: F,
    ) -> Result<Vec<SweepPoint>, PastisError>
    where
        S: ContrastProbe + ?Sized,
        A: ContrastProbe + ?Sized,
        F: Fn(&SweepPoint),
    {
        if self.realizations == 0 {
            return Err(PastisError::InvalidConfig(
                "contrast sweep needs at least one realization".to_string(),
            ));
        }
        let n = matrix.segment_count();
        for found in [simulator.segment_count(), analytical.segment_count()] {
            if found != n {
                return Err(PastisError::Dimension { expected: n, found });
            }
        }
        info!(
            "Contrast sweep over {} RMS levels, {} realizations each",
            rms_values.len(),
            self.realizations
        );

        let mut points = Vec::with_capacity(rms_values.len());
        for (level, &rms_nm) in rms_values.iter().enumerate() {
            let comparisons = self
                .realizations_at(level, rms_nm, n)
                .par_iter()
                .map(|a| compare_contrasts(a, simulator, analytical, matrix))
                .collect::<Result<Vec<_>, PastisError>>()?;

            let count = comparisons.len() as f64;
            let mean = |f: fn(&ContrastComparison) -> f64| comparisons.iter().map(f).sum::<f64>() / count;
            let point = SweepPoint {
                rms_nm,
                realizations: comparisons.len(),
                simulator: mean(|c| c.simulator),
                analytical: mean(|c| c.analytical),
                matrix: mean(|c| c.matrix),
            };
            debug!(
                "{:.3} nm: simulator {:.3e}, analytical {:.3e}, matrix {:.3e}",
                rms_nm, point.simulator, point.analytical, point.matrix
            );
            on_point(&point);
            points.push(point);
        }
        Ok(points)
    }
}
