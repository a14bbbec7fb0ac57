//! Segment layout: lattice, pupil rendering and center extraction.
//!
//! # Module Organization
//!
//! - **hex**: hexagonal lattice sites, counts and the point-in-hexagon test
//! - **mask**: indexed pupil rendering and segment templates
//! - **centers**: erosion-based center extraction from a rendered pupil

pub mod centers;
pub mod hex;
pub mod mask;

use log::{debug, info};
use nalgebra::Vector2;
use ndarray::Array3;

use crate::config::ApertureConfig;
use crate::error::PastisError;

pub use centers::extract_segment_centers;
pub use mask::{active_pupil, render_indexed_mask, segment_template};

/// Segment centers of one aperture, in meters and ring order.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGeometry {
    positions: Vec<Vector2<f64>>,
    obscured: Option<usize>,
    pitch_m: f64,
}

impl SegmentGeometry {
    pub fn from_positions(positions: Vec<Vector2<f64>>, obscured: Option<usize>, pitch_m: f64) -> Self {
        Self {
            positions,
            obscured,
            pitch_m,
        }
    }

    /// Exact lattice centers, no rendering involved.
    pub fn ideal(aperture: &ApertureConfig) -> Self {
        Self::from_positions(
            hex::lattice_positions(aperture.rings, aperture.pitch_m()),
            aperture.obscured_segment,
            aperture.pitch_m(),
        )
    }

    /// Centers measured on the rendered pupil.
    ///
    /// # Errors
    /// Propagates [`extract_segment_centers`] failures, e.g. a `Geometry`
    /// mismatch when the gap is too small to separate segments.
    pub fn from_mask(aperture: &ApertureConfig) -> Result<Self, PastisError> {
        let mask = render_indexed_mask(aperture);
        let template = segment_template(aperture);
        debug!(
            "Rendered {}x{} pupil, erosion template of {} px",
            aperture.pupil_px,
            aperture.pupil_px,
            template.len()
        );

        let centers = extract_segment_centers(&mask.view(), &template, aperture.segment_count())?;
        let dx = aperture.pixel_scale_m();
        let positions = centers
            .into_iter()
            .map(|(row, col)| mask::pixel_to_position(row, col, aperture.pupil_px, dx))
            .collect::<Vec<_>>();

        let ideal = hex::lattice_positions(aperture.rings, aperture.pitch_m());
        let worst = positions
            .iter()
            .zip(&ideal)
            .map(|(p, q)| (p - q).norm())
            .fold(0.0, f64::max);
        info!(
            "Extracted {} segment centers (max offset from lattice {:.2} px)",
            positions.len(),
            worst / dx
        );

        Ok(Self::from_positions(positions, aperture.obscured_segment, aperture.pitch_m()))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector2<f64>] {
        &self.positions
    }

    pub fn position(&self, segment: usize) -> Vector2<f64> {
        self.positions[segment]
    }

    pub fn obscured(&self) -> Option<usize> {
        self.obscured
    }

    pub fn is_obscured(&self, segment: usize) -> bool {
        self.obscured == Some(segment)
    }

    pub fn pitch_m(&self) -> f64 {
        self.pitch_m
    }

    /// Vector from segment `j` to segment `i`, `P[i] - P[j]`.
    pub fn relative_vector(&self, i: usize, j: usize) -> Vector2<f64> {
        self.positions[i] - self.positions[j]
    }

    /// All relative vectors as an N×N×2 array, `[i, j, :] = P[i] - P[j]`.
    pub fn relative_vectors(&self) -> Array3<f64> {
        let n = self.len();
        Array3::from_shape_fn((n, n, 2), |(i, j, axis)| self.relative_vector(i, j)[axis])
    }
}
