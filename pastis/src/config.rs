//! Aperture, optics and run configuration for segmented-aperture contrast models.
//!
//! A [`PastisConfig`] describes everything a run needs: the hexagonal segment
//! layout, the focal-plane sampling and dark-hole extent, the local Zernike
//! mode under study and the calibration amplitude. Configurations are plain
//! serde structs stored as JSON and are immutable once a run starts.
//!
//! # Key Features
//!
//! - **Hexagonal layout**: ring count, segment size and gap set the pitch and
//!   pupil diameter
//! - **Dark hole**: inner/outer working angles in λ/D, focal-plane sampling in
//!   pixels per λ/D
//! - **Redundancy tolerances**: explicit, or derived from the segment pitch
//! - **Predefined models**: the 37-segment and 7-segment apertures
//!
//! # Examples
//!
//! ```rust
//! use pastis::config::models::HEX_37;
//!
//! let config = HEX_37.clone();
//! assert_eq!(config.aperture.segment_count(), 37);
//! assert_eq!(config.expected_baseline_count(), 63);
//!
//! let optics = &config.optics;
//! println!("image grid: {} px", optics.image_size_px());
//! println!("1 nm = {:.4} rad", optics.nm_to_rad(1.0));
//! ```

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::baselines::RedundancyTolerance;
use crate::error::PastisError;
use crate::segments::hex;
use crate::zernike::ZernikeMode;

/// Margin in λ/D added around the outer working angle when sizing the image grid.
pub const IMAGE_MARGIN_LAMBDA_D: f64 = 3.0;

/// Geometry of a hexagonal segmented primary and its pupil rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureConfig {
    /// Number of segment rings around the central segment
    pub rings: usize,

    /// Flat-to-flat width of a single segment in meters
    pub segment_flat_to_flat_m: f64,

    /// Gap between neighbouring segments in meters
    pub gap_m: f64,

    /// Segment that never transmits light (typically the central one)
    pub obscured_segment: Option<usize>,

    /// Pupil array width in pixels (spans the full aperture diameter)
    pub pupil_px: usize,

    /// Pixels shaved off the segment template before eroding the pupil
    pub erosion_margin_px: f64,
}

impl ApertureConfig {
    pub fn segment_count(&self) -> usize {
        hex::segment_count(self.rings)
    }

    /// Center-to-center distance of neighbouring segments in meters.
    pub fn pitch_m(&self) -> f64 {
        self.segment_flat_to_flat_m + self.gap_m
    }

    /// Width of the pupil array in meters, (2r + 1) pitches.
    pub fn pupil_diameter_m(&self) -> f64 {
        (2 * self.rings + 1) as f64 * self.pitch_m()
    }

    /// Pupil pixel size in meters
    pub fn pixel_scale_m(&self) -> f64 {
        self.pupil_diameter_m() / self.pupil_px as f64
    }

    pub fn is_obscured(&self, segment: usize) -> bool {
        self.obscured_segment == Some(segment)
    }

    /// Indices of all segments that transmit light.
    pub fn active_segments(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.segment_count()).filter(move |&i| !self.is_obscured(i))
    }

    pub fn active_segment_count(&self) -> usize {
        self.active_segments().count()
    }
}

/// Focal-plane sampling and dark-hole definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsConfig {
    pub wavelength_nm: f64,

    /// Focal-plane pixels per λ/D
    pub sampling: f64,

    /// Inner working angle in λ/D
    pub iwa: f64,

    /// Outer working angle in λ/D
    pub owa: f64,
}

impl OpticsConfig {
    /// Width of the square focal-plane grid, 2·round(sampling·(owa + 3)).
    pub fn image_size_px(&self) -> usize {
        2 * (self.sampling * (self.owa + IMAGE_MARGIN_LAMBDA_D)).round() as usize
    }

    /// Convert a wavefront error in nanometers to phase in radians.
    pub fn nm_to_rad(&self, nm: f64) -> f64 {
        2.0 * PI * nm / self.wavelength_nm
    }

    /// Dark-hole radii in focal-plane pixels, (inner, outer).
    pub fn dark_hole_radii_px(&self) -> (f64, f64) {
        (self.iwa * self.sampling, self.owa * self.sampling)
    }

    /// Side of the zero-padded FFT grid for a pupil of `pupil_px` pixels.
    pub fn fft_size_px(&self, pupil_px: usize) -> usize {
        (self.sampling * pupil_px as f64).round() as usize
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastisConfig {
    pub name: String,
    pub aperture: ApertureConfig,

    /// Baseline redundancy tolerances; derived from the pitch when absent
    #[serde(default)]
    pub tolerance: Option<RedundancyTolerance>,

    pub optics: OpticsConfig,

    /// Noll index of the local Zernike mode applied on every segment
    pub mode_noll: u8,

    /// Aberration amplitude in nm used for calibration and matrix probing
    pub calibration_aberration_nm: f64,

    /// Contrast of the unaberrated coronagraph added to every mean contrast
    #[serde(default)]
    pub coronagraph_floor: f64,

    /// Attempts per probe call before a transient failure becomes fatal
    #[serde(default = "default_probe_attempts")]
    pub probe_max_attempts: usize,
}

fn default_probe_attempts() -> usize {
    3
}

impl PastisConfig {
    /// Read a configuration from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PastisError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Write this configuration as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PastisError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Tolerances to use for baseline classification.
    pub fn redundancy_tolerance(&self) -> RedundancyTolerance {
        self.tolerance
            .unwrap_or_else(|| RedundancyTolerance::from_pitch(self.aperture.pitch_m()))
    }

    pub fn mode(&self) -> Result<ZernikeMode, PastisError> {
        ZernikeMode::new(self.mode_noll)
    }

    /// Number of distinct baselines the layout implies.
    pub fn expected_baseline_count(&self) -> usize {
        hex::expected_baseline_count(self.aperture.rings)
    }

    /// Check value ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), PastisError> {
        let a = &self.aperture;
        let o = &self.optics;
        let invalid = |msg: String| Err(PastisError::InvalidConfig(msg));

        if a.segment_flat_to_flat_m <= 0.0 {
            return invalid(format!(
                "segment flat-to-flat must be positive, got {}",
                a.segment_flat_to_flat_m
            ));
        }
        if a.gap_m < 0.0 {
            return invalid(format!("gap must be non-negative, got {}", a.gap_m));
        }
        if a.pupil_px < 8 {
            return invalid(format!("pupil_px too small: {}", a.pupil_px));
        }
        if a.erosion_margin_px < 0.0 {
            return invalid(format!(
                "erosion margin must be non-negative, got {}",
                a.erosion_margin_px
            ));
        }
        if let Some(obscured) = a.obscured_segment {
            if obscured >= a.segment_count() {
                return invalid(format!(
                    "obscured segment {obscured} out of range for {} segments",
                    a.segment_count()
                ));
            }
        }
        if o.wavelength_nm <= 0.0 {
            return invalid(format!("wavelength must be positive, got {}", o.wavelength_nm));
        }
        if o.sampling < 1.0 {
            return invalid(format!("sampling must be at least 1 px per λ/D, got {}", o.sampling));
        }
        if o.iwa < 0.0 || o.owa <= o.iwa {
            return invalid(format!(
                "dark hole needs 0 <= iwa < owa, got iwa={} owa={}",
                o.iwa, o.owa
            ));
        }
        if self.calibration_aberration_nm <= 0.0 {
            return invalid(format!(
                "calibration aberration must be positive, got {}",
                self.calibration_aberration_nm
            ));
        }
        if self.probe_max_attempts == 0 {
            return invalid("probe_max_attempts must be at least 1".to_string());
        }
        if let Some(tol) = self.tolerance {
            if tol.length <= 0.0 || tol.cross <= 0.0 {
                return invalid(format!("tolerances must be positive, got {tol:?}"));
            }
        }
        self.mode()?;
        Ok(())
    }

    pub fn with_wavelength(mut self, wavelength_nm: f64) -> Self {
        self.optics.wavelength_nm = wavelength_nm;
        self
    }

    pub fn with_mode(mut self, noll: u8) -> Self {
        self.mode_noll = noll;
        self
    }
}

pub mod models {
    use super::*;

    /// 37-segment, 3-ring aperture with the central segment obscured.
    pub static HEX_37: Lazy<PastisConfig> = Lazy::new(|| PastisConfig {
        name: "Hex 37".to_string(),
        aperture: ApertureConfig {
            rings: 3,
            segment_flat_to_flat_m: 0.9,
            gap_m: 0.06,
            obscured_segment: Some(0),
            pupil_px: 256,
            erosion_margin_px: 1.5,
        },
        tolerance: None,
        optics: OpticsConfig {
            wavelength_nm: 640.0,
            sampling: 4.0,
            iwa: 6.0,
            owa: 11.0,
        },
        mode_noll: 1,
        calibration_aberration_nm: 1.0,
        coronagraph_floor: 0.0,
        probe_max_attempts: 3,
    });

    /// Single-ring 7-segment aperture, small enough for quick end-to-end runs.
    pub static HEX_7: Lazy<PastisConfig> = Lazy::new(|| PastisConfig {
        name: "Hex 7".to_string(),
        aperture: ApertureConfig {
            rings: 1,
            segment_flat_to_flat_m: 0.9,
            gap_m: 0.06,
            obscured_segment: Some(0),
            pupil_px: 96,
            erosion_margin_px: 1.5,
        },
        tolerance: None,
        optics: OpticsConfig {
            wavelength_nm: 640.0,
            sampling: 2.0,
            iwa: 2.0,
            owa: 8.0,
        },
        mode_noll: 1,
        calibration_aberration_nm: 1.0,
        coronagraph_floor: 0.0,
        probe_max_attempts: 3,
    });
}
