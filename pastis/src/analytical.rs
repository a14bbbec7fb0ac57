//! Analytical dark-hole contrast model for a segmented aperture.
//!
//! For small aberrations of one local Zernike mode, the coronagraphic
//! focal-plane intensity factorizes into a single-segment envelope times an
//! interference term over baselines:
//!
//! ```text
//! I(p) = |F[Z·S](p)|² · ( Σ_i c_i² + 2 Σ_k A_k cos(2π b_k·p / (D·sampling)) )
//! ```
//!
//! where `c_i` are the per-segment coefficients in radians, `b_k` the baseline
//! vectors and `A_k = Σ c_i c_j` over the pairs sharing baseline `k`. The
//! envelope and every cosine plane are computed once per model; evaluating a
//! new aberration is a weighted sum of planes.

use std::sync::Arc;

use log::{debug, warn};
use ndarray::{Array2, Array3, ArrayView2};
use rustfft::num_complex::Complex64;
use shared::algo::fill_planes_in_parallel;
use shared::image_proc::{annulus_mask, masked_mean};

use crate::aperture::SegmentedAperture;
use crate::baselines::BaselineSet;
use crate::calibration::CalibrationSet;
use crate::config::{OpticsConfig, PastisConfig};
use crate::error::PastisError;
use crate::mft::matrix_fourier_transform;
use crate::probe::ContrastProbe;
use crate::segments::hex::circumradius;
use crate::segments::mask::{active_pupil, render_indexed_mask, segment_footprint};
use crate::zernike::ZernikeMode;

/// Precomputed analytical model for one aperture, optics setup and mode.
#[derive(Debug, Clone)]
pub struct AnalyticalModel {
    aperture: Arc<SegmentedAperture>,
    optics: OpticsConfig,
    mode: ZernikeMode,
    factors: Vec<f64>,
    calibrated: bool,
    coronagraph_floor: f64,
    envelope: Array2<f64>,
    cosines: Array3<f64>,
    dark_hole: Array2<bool>,
}

impl AnalyticalModel {
    /// Uncalibrated model (unit factors) with a zero coronagraph floor.
    pub fn new(aperture: Arc<SegmentedAperture>, optics: &OpticsConfig, mode: ZernikeMode) -> Self {
        let size = optics.image_size_px();
        let config = aperture.config();
        let freq_step = 1.0 / (optics.sampling * config.pupil_diameter_m());

        let envelope = segment_envelope(&aperture, mode, freq_step, size);
        let cosines = cosine_cube(aperture.baselines(), freq_step, size);
        let (inner, outer) = optics.dark_hole_radii_px();
        let dark_hole = annulus_mask((size, size), inner, outer);

        debug!(
            "Analytical model for {}: {}x{} grid, {} baselines, {} dark-hole pixels",
            mode,
            size,
            size,
            cosines.shape()[0],
            dark_hole.iter().filter(|&&v| v).count()
        );

        let factors = vec![1.0; aperture.segment_count()];
        Self {
            aperture,
            optics: optics.clone(),
            mode,
            factors,
            calibrated: false,
            coronagraph_floor: 0.0,
            envelope,
            cosines,
            dark_hole,
        }
    }

    /// Model as described by a run configuration, calibrated when tables are given.
    pub fn from_config(
        aperture: Arc<SegmentedAperture>,
        config: &PastisConfig,
        calibration: Option<&CalibrationSet>,
    ) -> Result<Self, PastisError> {
        let model = Self::new(aperture, &config.optics, config.mode()?)
            .with_coronagraph_floor(config.coronagraph_floor);
        Ok(match calibration {
            Some(set) => model.with_calibration(set),
            None => model,
        })
    }

    /// Apply per-segment calibration factors for this model's mode.
    ///
    /// Segments without a factor keep 1.0 and are reported with `warn!`. A set
    /// without a table for this mode leaves the model uncalibrated.
    pub fn with_calibration(mut self, calibration: &CalibrationSet) -> Self {
        if calibration.get(self.mode).is_none() {
            warn!("No calibration table for {}; model stays uncalibrated", self.mode);
            return self;
        }
        self.factors = calibration.factors_or_unity(self.mode, self.aperture.segment_count());
        self.calibrated = true;
        self
    }

    pub fn with_coronagraph_floor(mut self, floor: f64) -> Self {
        self.coronagraph_floor = floor;
        self
    }

    pub fn aperture(&self) -> &SegmentedAperture {
        &self.aperture
    }

    pub fn optics(&self) -> &OpticsConfig {
        &self.optics
    }

    pub fn mode(&self) -> ZernikeMode {
        self.mode
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn calibration_factors(&self) -> &[f64] {
        &self.factors
    }

    pub fn coronagraph_floor(&self) -> f64 {
        self.coronagraph_floor
    }

    pub fn image_size(&self) -> usize {
        self.envelope.nrows()
    }

    pub fn envelope(&self) -> ArrayView2<'_, f64> {
        self.envelope.view()
    }

    pub fn dark_hole(&self) -> ArrayView2<'_, bool> {
        self.dark_hole.view()
    }

    /// Per-segment coefficients in radians, ready for the interference sum.
    ///
    /// Converts nm to radians, zeroes the obscured segment, removes the mean
    /// over active segments for piston, then applies calibration factors.
    pub fn prepare_coefficients(&self, aberration_nm: &[f64]) -> Result<Vec<f64>, PastisError> {
        self.aperture.check_aberration(aberration_nm)?;
        let mut coefficients: Vec<f64> = aberration_nm
            .iter()
            .map(|&nm| self.optics.nm_to_rad(nm))
            .collect();

        let obscured = self.aperture.obscured_segment();
        if let Some(k) = obscured {
            if coefficients[k] != 0.0 {
                warn!(
                    "Ignoring {:.3} nm on obscured segment {}",
                    aberration_nm[k], k
                );
                coefficients[k] = 0.0;
            }
        }

        if self.mode.is_piston() {
            let active = coefficients.len() - usize::from(obscured.is_some());
            let mean = coefficients.iter().sum::<f64>() / active as f64;
            for (i, c) in coefficients.iter_mut().enumerate() {
                if Some(i) != obscured {
                    *c -= mean;
                }
            }
        }

        for (c, factor) in coefficients.iter_mut().zip(&self.factors) {
            *c *= factor;
        }
        Ok(coefficients)
    }

    /// Full focal-plane intensity on the model grid, floor excluded.
    pub fn intensity(&self, aberration_nm: &[f64]) -> Result<Array2<f64>, PastisError> {
        let coefficients = self.prepare_coefficients(aberration_nm)?;
        let self_term: f64 = coefficients.iter().map(|c| c * c).sum();
        let generic = self.aperture.baselines().generic_coefficients(&coefficients)?;

        let mut interference = Array2::from_elem(self.envelope.dim(), self_term);
        for (plane, &weight) in self.cosines.outer_iter().zip(&generic) {
            if weight != 0.0 {
                interference.scaled_add(2.0 * weight, &plane);
            }
        }
        Ok(&self.envelope * &interference)
    }

    /// Intensity inside the dark hole, zero elsewhere.
    pub fn dark_hole_image(&self, aberration_nm: &[f64]) -> Result<Array2<f64>, PastisError> {
        let mut image = self.intensity(aberration_nm)?;
        image.zip_mut_with(&self.dark_hole, |v, &inside| {
            if !inside {
                *v = 0.0;
            }
        });
        Ok(image)
    }

    /// Dark-hole mean of `envelope·cos(b_ij)` per rad², the coupling of segments `i` and `j`.
    ///
    /// For `i == j` this is the dark-hole mean of the envelope alone.
    pub fn pair_cross_term(&self, i: usize, j: usize) -> f64 {
        let weighted = match self.aperture.baselines().baseline_id(i, j) {
            None => self.envelope.clone(),
            Some(id) => &self.envelope * &self.cosines.index_axis(ndarray::Axis(0), id - 1),
        };
        masked_mean(&weighted.view(), &self.dark_hole.view()).unwrap_or(0.0)
    }

    fn dark_hole_mean(&self, image: &Array2<f64>) -> Result<f64, PastisError> {
        masked_mean(&image.view(), &self.dark_hole.view())
            .ok_or_else(|| PastisError::InvalidConfig("dark hole contains no pixels".to_string()))
    }
}

impl ContrastProbe for AnalyticalModel {
    fn segment_count(&self) -> usize {
        self.aperture.segment_count()
    }

    fn mean_contrast(&self, aberration_nm: &[f64]) -> Result<f64, PastisError> {
        let image = self.intensity(aberration_nm)?;
        Ok(self.dark_hole_mean(&image)? + self.coronagraph_floor)
    }
}

/// `|F[Z·S]|²` of a single segment, normalized to the peak of the unaberrated
/// direct PSF of the full active aperture.
fn segment_envelope(
    aperture: &SegmentedAperture,
    mode: ZernikeMode,
    freq_step: f64,
    size: usize,
) -> Array2<f64> {
    let config = aperture.config();
    let dx = config.pixel_scale_m();
    let radius = circumradius(config.segment_flat_to_flat_m);

    let footprint = segment_footprint(config, 0.0);
    let half = (footprint.nrows() / 2) as f64;
    let pupil = Array2::from_shape_fn(footprint.dim(), |(r, c)| {
        if footprint[[r, c]] {
            let x = (c as f64 - half) * dx;
            let y = (r as f64 - half) * dx;
            Complex64::new(mode.evaluate_xy(x, y, radius), 0.0)
        } else {
            Complex64::new(0.0, 0.0)
        }
    });

    let mask = render_indexed_mask(config);
    let active_pixels = active_pupil(&mask.view(), config.obscured_segment)
        .iter()
        .filter(|&&v| v)
        .count() as f64;

    let field = matrix_fourier_transform(&pupil.view(), dx, freq_step, size);
    field.mapv(|v| v.norm_sqr() / (active_pixels * active_pixels))
}

/// One plane per baseline: `cos(2π (bx·px + by·py)·freq_step)` with `(px, py)`
/// pixel offsets from the grid center.
fn cosine_cube(baselines: &BaselineSet, freq_step: f64, size: usize) -> Array3<f64> {
    let center = (size / 2) as f64;
    let vectors: Vec<_> = baselines.baselines().iter().map(|b| b.vector).collect();

    fill_planes_in_parallel((vectors.len(), size, size), |k, plane| {
        let b = vectors[k];
        for ((r, c), value) in plane.indexed_iter_mut() {
            let px = c as f64 - center;
            let py = r as f64 - center;
            *value = (2.0 * std::f64::consts::PI * (b.x * px + b.y * py) * freq_step).cos();
        }
    })
}
