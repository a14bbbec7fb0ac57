//! Immutable segmented-aperture context shared by models and probes.

use std::path::Path;

use log::info;
use nalgebra::Vector2;
use ndarray::Array2;

use crate::baselines::{Baseline, BaselineSet, RedundancyTolerance};
use crate::config::ApertureConfig;
use crate::error::PastisError;
use crate::io::{read_fits_images, take_image, write_fits_images, FitsDataType, FitsImage};
use crate::segments::{hex, SegmentGeometry};

/// Aperture configuration with its segment centers and resolved baselines.
///
/// Built once per run and shared read-only (typically behind an `Arc`).
#[derive(Debug, Clone)]
pub struct SegmentedAperture {
    config: ApertureConfig,
    geometry: SegmentGeometry,
    baselines: BaselineSet,
}

impl SegmentedAperture {
    /// Measure segment centers on the rendered pupil and resolve baselines.
    ///
    /// # Errors
    /// `Geometry`/`GeometryMapping` when centers cannot be extracted.
    pub fn from_mask(
        config: &ApertureConfig,
        tolerance: RedundancyTolerance,
    ) -> Result<Self, PastisError> {
        let geometry = SegmentGeometry::from_mask(config)?;
        Ok(Self::from_geometry(config, geometry, tolerance))
    }

    /// Use exact lattice centers.
    pub fn ideal(config: &ApertureConfig, tolerance: RedundancyTolerance) -> Self {
        Self::from_geometry(config, SegmentGeometry::ideal(config), tolerance)
    }

    pub fn from_geometry(
        config: &ApertureConfig,
        geometry: SegmentGeometry,
        tolerance: RedundancyTolerance,
    ) -> Self {
        let baselines = BaselineSet::resolve(&geometry, tolerance);
        info!(
            "Aperture with {} segments ({} active): {} distinct baselines",
            geometry.len(),
            config.active_segment_count(),
            baselines.len()
        );
        Self {
            config: config.clone(),
            geometry,
            baselines,
        }
    }

    pub fn config(&self) -> &ApertureConfig {
        &self.config
    }

    pub fn geometry(&self) -> &SegmentGeometry {
        &self.geometry
    }

    pub fn baselines(&self) -> &BaselineSet {
        &self.baselines
    }

    pub fn segment_count(&self) -> usize {
        self.geometry.len()
    }

    pub fn obscured_segment(&self) -> Option<usize> {
        self.config.obscured_segment
    }

    /// Check the baseline count against the one implied by the ring count.
    pub fn validate(&self) -> Result<(), PastisError> {
        self.baselines
            .validate_count(hex::expected_baseline_count(self.config.rings))
    }

    /// Fail unless `aberration` has one entry per segment.
    pub fn check_aberration(&self, aberration: &[f64]) -> Result<(), PastisError> {
        if aberration.len() != self.segment_count() {
            return Err(PastisError::Dimension {
                expected: self.segment_count(),
                found: aberration.len(),
            });
        }
        Ok(())
    }

    /// Store positions, projection index and baseline table.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PastisError> {
        let n = self.segment_count();
        let positions =
            Array2::from_shape_fn((n, 2), |(i, axis)| self.geometry.position(i)[axis]);
        let projection = self.baselines.projection().mapv(|id| id as i64);
        let table = Array2::from_shape_fn((self.baselines.len(), 4), |(k, col)| {
            let b = &self.baselines.baselines()[k];
            match col {
                0 => b.pair.0 as f64,
                1 => b.pair.1 as f64,
                2 => b.vector.x,
                _ => b.vector.y,
            }
        });

        let tolerance = self.baselines.tolerance();
        let obscured = self
            .config
            .obscured_segment
            .map(|k| k as f64)
            .unwrap_or(-1.0);

        let images = vec![
            FitsImage::new("POSITIONS", FitsDataType::Float64(positions))
                .with_key("PITCH", self.geometry.pitch_m())
                .with_key("OBSCURED", obscured),
            FitsImage::new("PROJECTION", FitsDataType::Int64(projection)),
            FitsImage::new("BASELINES", FitsDataType::Float64(table))
                .with_key("LENTOL", tolerance.length)
                .with_key("CROSSTOL", tolerance.cross),
        ];
        write_fits_images(&images, path)?;
        Ok(())
    }

    /// Load a cached aperture written by [`SegmentedAperture::save`].
    ///
    /// # Errors
    /// `Dimension` when the cached segment count differs from `config`.
    pub fn load<P: AsRef<Path>>(config: &ApertureConfig, path: P) -> Result<Self, PastisError> {
        let mut images = read_fits_images(path, &["PITCH", "OBSCURED", "LENTOL", "CROSSTOL"])?;
        let positions = take_image(&mut images, "POSITIONS")?;
        let projection = take_image(&mut images, "PROJECTION")?;
        let table = take_image(&mut images, "BASELINES")?;

        let n = positions.data.nrows();
        if n != config.segment_count() {
            return Err(PastisError::Dimension {
                expected: config.segment_count(),
                found: n,
            });
        }

        let pitch = positions.key("PITCH")?;
        let geometry = SegmentGeometry::from_positions(
            positions
                .data
                .rows()
                .into_iter()
                .map(|row| Vector2::new(row[0], row[1]))
                .collect(),
            config.obscured_segment,
            pitch,
        );

        let tolerance = RedundancyTolerance::new(table.key("LENTOL")?, table.key("CROSSTOL")?);
        let baselines = table
            .data
            .rows()
            .into_iter()
            .enumerate()
            .map(|(k, row)| Baseline {
                id: k + 1,
                pair: (row[0] as usize, row[1] as usize),
                vector: Vector2::new(row[2], row[3]),
            })
            .collect();
        let projection = projection.data.mapv(|v| v.round() as usize);
        let baselines = BaselineSet::from_parts(baselines, projection, tolerance, n)?;

        Ok(Self {
            config: config.clone(),
            geometry,
            baselines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{HEX_37, HEX_7};
    use tempfile::tempdir;

    #[test]
    fn test_ideal_hex37_validates() {
        let config = HEX_37.clone();
        let aperture = SegmentedAperture::ideal(&config.aperture, config.redundancy_tolerance());
        aperture.validate().unwrap();
        assert_eq!(aperture.baselines().len(), 63);
    }

    #[test]
    fn test_check_aberration_length() {
        let config = HEX_7.clone();
        let aperture = SegmentedAperture::ideal(&config.aperture, config.redundancy_tolerance());
        aperture.check_aberration(&[0.0; 7]).unwrap();
        assert!(matches!(
            aperture.check_aberration(&[0.0; 6]),
            Err(PastisError::Dimension {
                expected: 7,
                found: 6
            })
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hex7_baselines.fits");

        let config = HEX_7.clone();
        let aperture = SegmentedAperture::from_mask(&config.aperture, config.redundancy_tolerance()).unwrap();
        aperture.save(&path).unwrap();

        let loaded = SegmentedAperture::load(&config.aperture, &path).unwrap();
        assert_eq!(loaded.baselines(), aperture.baselines());
        assert_eq!(loaded.geometry(), aperture.geometry());

        let wrong = HEX_37.aperture.clone();
        assert!(SegmentedAperture::load(&wrong, &path).is_err());
    }
}
