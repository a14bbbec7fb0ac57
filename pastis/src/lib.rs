//! Pair-based analytical contrast modelling for segmented-aperture coronagraphs
//!
//! This crate predicts the mean dark-hole contrast of a coronagraph behind a
//! hexagonal segmented primary as a quadratic form in the per-segment
//! aberrations. It resolves redundant segment-pair baselines, evaluates the
//! analytical interference model, calibrates it against a reference
//! simulator, and measures the PASTIS matrix with any contrast probe.

pub mod aberration;
pub mod analytical;
pub mod aperture;
pub mod baselines;
pub mod calibration;
pub mod config;
pub mod contrast_curve;
pub mod coronagraph;
pub mod error;
pub mod io;
pub mod matrix;
pub mod mft;
pub mod probe;
pub mod segments;
pub mod shared_args;
pub mod zernike;

// Re-exports for easier access
pub use analytical::AnalyticalModel;
pub use aperture::SegmentedAperture;
pub use baselines::{Baseline, BaselineSet, RedundancyTolerance};
pub use calibration::{calibrate, CalibrationSet, CalibrationTable};
pub use config::{ApertureConfig, OpticsConfig, PastisConfig};
pub use contrast_curve::{compare_contrasts, ContrastComparison, ContrastSweep, SweepPoint};
pub use coronagraph::PerfectCoronagraph;
pub use error::{PastisError, ProbeError};
pub use matrix::{MatrixBuilder, MatrixHeader, PastisMatrix, RawContrastMatrix};
pub use probe::{ContrastProbe, DiffractionSimulator, SimulatorProbe};
pub use segments::SegmentGeometry;
pub use zernike::ZernikeMode;
