//! Image processing building blocks for pupil masks and focal-plane images.
//!
//! # Module Organization
//!
//! - **thresholding**: connected-component labeling of binary masks
//! - **morphology**: binary erosion by an arbitrary structuring element
//! - **aperture_photometry**: annular (dark-hole) masks and masked statistics
//! - **crop**: centered sub-array extraction
//! - **fft**: centered 2-D Fourier transforms

pub mod aperture_photometry;
pub mod crop;
pub mod fft;
pub mod morphology;
pub mod thresholding;

pub use aperture_photometry::{annulus_mask, masked_mean};
pub use crop::crop_center;
pub use fft::fft2_centered;
pub use morphology::{binary_erosion, StructuringElement};
pub use thresholding::{connected_components, label_centroids};
