//! Per-segment calibration of the analytical model against a simulator.
//!
//! For each active segment `k`, the simulator and the uncalibrated analytical
//! model are poked with the calibration amplitude on `k` alone. The factor
//! that makes the model reproduce the simulator contrast above the
//! coronagraph floor is `sqrt((c_sim - c_floor) / c_model)`.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info, warn};
use ndarray::Array2;
use rayon::prelude::*;

use crate::analytical::AnalyticalModel;
use crate::error::PastisError;
use crate::io::{read_fits_images, take_image, write_fits_images, FitsDataType, FitsImage};
use crate::probe::ContrastProbe;
use crate::zernike::ZernikeMode;

/// Calibration factors of one local mode, one per segment.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    mode: ZernikeMode,
    factors: Vec<f64>,
}

impl CalibrationTable {
    pub fn new(mode: ZernikeMode, factors: Vec<f64>) -> Self {
        Self { mode, factors }
    }

    pub fn unity(mode: ZernikeMode, segments: usize) -> Self {
        Self::new(mode, vec![1.0; segments])
    }

    pub fn mode(&self) -> ZernikeMode {
        self.mode
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub fn factor(&self, segment: usize) -> Option<f64> {
        self.factors.get(segment).copied()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Store the table as a 1×N image with a `NOLL` keyword.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PastisError> {
        let data = Array2::from_shape_vec((1, self.factors.len()), self.factors.clone())
            .map_err(|e| PastisError::InvalidConfig(e.to_string()))?;
        let image = FitsImage::new("CALIBRATION", FitsDataType::Float64(data))
            .with_key("NOLL", self.mode.noll() as f64);
        write_fits_images(&[image], path)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PastisError> {
        let mut images = read_fits_images(path, &["NOLL"])?;
        let image = take_image(&mut images, "CALIBRATION")?;
        let mode = ZernikeMode::new(image.key("NOLL")?.round() as u8)?;
        Ok(Self::new(mode, image.data.iter().copied().collect()))
    }
}

/// Calibration tables keyed by mode.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSet {
    tables: BTreeMap<ZernikeMode, CalibrationTable>,
}

impl CalibrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any previous one for the same mode.
    pub fn insert(&mut self, table: CalibrationTable) {
        self.tables.insert(table.mode(), table);
    }

    pub fn get(&self, mode: ZernikeMode) -> Option<&CalibrationTable> {
        self.tables.get(&mode)
    }

    pub fn modes(&self) -> impl Iterator<Item = ZernikeMode> + '_ {
        self.tables.keys().copied()
    }

    /// Factor for `segment`, or `MissingCalibration`.
    pub fn require(&self, mode: ZernikeMode, segment: usize) -> Result<f64, PastisError> {
        self.get(mode)
            .and_then(|table| table.factor(segment))
            .ok_or_else(|| PastisError::MissingCalibration {
                mode: mode.to_string(),
                segment,
            })
    }

    /// Factors for all segments, falling back to 1.0 with a warning.
    pub fn factors_or_unity(&self, mode: ZernikeMode, segments: usize) -> Vec<f64> {
        (0..segments)
            .map(|segment| match self.require(mode, segment) {
                Ok(factor) => factor,
                Err(e) => {
                    warn!("{e}; using 1.0");
                    1.0
                }
            })
            .collect()
    }
}

/// Compute calibration factors for `model`'s mode against `simulator`.
///
/// # Arguments
/// * `model` - Uncalibrated analytical model
/// * `simulator` - Reference probe, e.g. a [`crate::probe::SimulatorProbe`]
/// * `amplitude_nm` - Aberration applied to one segment at a time
///
/// # Errors
/// `InvalidConfig` when `model` is already calibrated; probe and dimension
/// errors from either side.
pub fn calibrate<P>(
    model: &AnalyticalModel,
    simulator: &P,
    amplitude_nm: f64,
) -> Result<CalibrationTable, PastisError>
where
    P: ContrastProbe + ?Sized,
{
    if model.is_calibrated() {
        return Err(PastisError::InvalidConfig(
            "calibration needs an uncalibrated model".to_string(),
        ));
    }
    let n = model.segment_count();
    if simulator.segment_count() != n {
        return Err(PastisError::Dimension {
            expected: n,
            found: simulator.segment_count(),
        });
    }

    let floor = simulator.mean_contrast(&vec![0.0; n])?;
    let model_floor = model.coronagraph_floor();
    let obscured = model.aperture().obscured_segment();
    info!(
        "Calibrating {} on {} segments at {} nm (simulator floor {:.3e})",
        model.mode(),
        n,
        amplitude_nm,
        floor
    );

    let factors = (0..n)
        .into_par_iter()
        .map(|segment| {
            if Some(segment) == obscured {
                return Ok(0.0);
            }
            let mut aberration = vec![0.0; n];
            aberration[segment] = amplitude_nm;

            let c_sim = simulator.mean_contrast(&aberration)?;
            let c_model = model.mean_contrast(&aberration)? - model_floor;
            let excess = c_sim - floor;
            debug!("Segment {segment}: simulator {c_sim:.4e}, model {c_model:.4e}");

            if excess <= 0.0 || c_model <= 0.0 {
                warn!(
                    "Segment {segment}: cannot calibrate (simulator excess {excess:.3e}, model {c_model:.3e}); factor set to 0"
                );
                return Ok(0.0);
            }
            Ok((excess / c_model).sqrt())
        })
        .collect::<Result<Vec<f64>, PastisError>>()?;

    Ok(CalibrationTable::new(model.mode(), factors))
}
