//! Contrast probes: anything that turns a segment aberration vector into a
//! mean dark-hole contrast.
//!
//! The analytical model is a probe on its own. Full diffraction simulators
//! implement [`DiffractionSimulator`] and are wrapped in a [`SimulatorProbe`],
//! which averages their images over the dark hole and retries transient
//! failures.

use log::warn;
use ndarray::Array2;
use shared::image_proc::{annulus_mask, masked_mean};

use crate::config::{OpticsConfig, PastisConfig};
use crate::error::{PastisError, ProbeError};
use crate::zernike::ZernikeMode;

/// Mean dark-hole contrast for a per-segment aberration vector in nm.
///
/// Probes are shared across rayon workers, so implementations must be `Sync`.
pub trait ContrastProbe: Sync {
    fn segment_count(&self) -> usize;

    fn mean_contrast(&self, aberration_nm: &[f64]) -> Result<f64, PastisError>;
}

/// A focal-plane simulator of the coronagraph.
pub trait DiffractionSimulator: Sync {
    fn segment_count(&self) -> usize;

    /// Normalized focal-plane intensity on the model image grid.
    fn dark_hole_image(
        &self,
        aberration_nm: &[f64],
        mode: ZernikeMode,
    ) -> Result<Array2<f64>, ProbeError>;
}

/// Adapts a [`DiffractionSimulator`] to [`ContrastProbe`].
pub struct SimulatorProbe<S> {
    simulator: S,
    mode: ZernikeMode,
    dark_hole: Array2<bool>,
    max_attempts: usize,
}

impl<S: DiffractionSimulator> SimulatorProbe<S> {
    pub fn new(simulator: S, optics: &OpticsConfig, mode: ZernikeMode, max_attempts: usize) -> Self {
        let size = optics.image_size_px();
        let (inner, outer) = optics.dark_hole_radii_px();
        Self {
            simulator,
            mode,
            dark_hole: annulus_mask((size, size), inner, outer),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(simulator: S, config: &PastisConfig) -> Result<Self, PastisError> {
        Ok(Self::new(
            simulator,
            &config.optics,
            config.mode()?,
            config.probe_max_attempts,
        ))
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn mode(&self) -> ZernikeMode {
        self.mode
    }
}

impl<S: DiffractionSimulator> ContrastProbe for SimulatorProbe<S> {
    fn segment_count(&self) -> usize {
        self.simulator.segment_count()
    }

    fn mean_contrast(&self, aberration_nm: &[f64]) -> Result<f64, PastisError> {
        let n = self.segment_count();
        if aberration_nm.len() != n {
            return Err(PastisError::Dimension {
                expected: n,
                found: aberration_nm.len(),
            });
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.simulator.dark_hole_image(aberration_nm, self.mode) {
                Ok(image) => {
                    return masked_mean(&image.view(), &self.dark_hole.view()).ok_or_else(|| {
                        PastisError::Probe {
                            attempts: attempt,
                            source: ProbeError::Fatal(format!(
                                "image shape {:?} does not match dark hole {:?}",
                                image.dim(),
                                self.dark_hole.dim()
                            )),
                        }
                    });
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "Probe attempt {}/{} failed: {}; retrying",
                        attempt, self.max_attempts, e
                    );
                }
                Err(e) => {
                    return Err(PastisError::Probe {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}
