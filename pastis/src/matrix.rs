//! PASTIS matrix construction and evaluation.
//!
//! The contrast of any small aberration `a` is the quadratic form
//! `aᵀ·M·a + c₀`. `M` is measured by poking pairs of segments with a fixed
//! amplitude: the diagonal comes from single-segment pokes, the off-diagonal
//! terms from the excess of a pair poke over its two single pokes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

use crate::error::PastisError;
use crate::io::{read_fits_images, take_image, write_fits_images, FitsDataType, FitsImage};
use crate::probe::ContrastProbe;

/// Mean dark-hole contrast of every pair poke, symmetric.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContrastMatrix {
    pub values: Array2<f64>,
    /// Contrast with no aberration
    pub floor: f64,
    pub amplitude_nm: f64,
}

/// Labels stored alongside a saved matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixHeader {
    pub wavelength_nm: f64,
    pub noll: u8,
}

/// Symmetric contrast-per-nm² matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct PastisMatrix {
    matrix: Array2<f64>,
    floor: f64,
    amplitude_nm: f64,
}

impl PastisMatrix {
    pub fn new(matrix: Array2<f64>, floor: f64, amplitude_nm: f64) -> Self {
        Self {
            matrix,
            floor,
            amplitude_nm,
        }
    }

    /// Turn pair-poke contrasts into the PASTIS matrix.
    ///
    /// `M[i,i] = Raw[i,i] - c₀`, `M[i,j] = (Raw[i,j] + c₀ - Raw[i,i] - Raw[j,j]) / 2`,
    /// all divided by the squared poke amplitude.
    pub fn from_raw(raw: &RawContrastMatrix) -> Self {
        let n = raw.values.nrows();
        let c0 = raw.floor;
        let amp2 = raw.amplitude_nm * raw.amplitude_nm;
        let v = &raw.values;

        // Upper triangle only, mirrored, so M[i,j] and M[j,i] are bit-identical
        let mut matrix = Array2::<f64>::zeros((n, n));
        for (i, j) in segment_pairs_non_repeating(n) {
            let m = if i == j {
                v[[i, i]] - c0
            } else {
                (v[[i, j]] + c0 - v[[i, i]] - v[[j, j]]) / 2.0
            };
            matrix[[i, j]] = m / amp2;
            matrix[[j, i]] = m / amp2;
        }
        Self::new(matrix, c0, raw.amplitude_nm)
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn amplitude_nm(&self) -> f64 {
        self.amplitude_nm
    }

    pub fn segment_count(&self) -> usize {
        self.matrix.nrows()
    }

    /// Predicted mean contrast, `aᵀ·M·a + c₀`.
    pub fn contrast(&self, aberration_nm: &[f64]) -> Result<f64, PastisError> {
        let n = self.segment_count();
        if aberration_nm.len() != n {
            return Err(PastisError::Dimension {
                expected: n,
                found: aberration_nm.len(),
            });
        }
        let a = Array1::from(aberration_nm.to_vec());
        Ok(a.dot(&self.matrix.dot(&a)) + self.floor)
    }

    /// Largest `|M[i,j] - M[j,i]|`.
    pub fn asymmetry(&self) -> f64 {
        let n = self.segment_count();
        (0..n)
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .map(|(i, j)| (self.matrix[[i, j]] - self.matrix[[j, i]]).abs())
            .fold(0.0, f64::max)
    }

    /// Save the matrix, optionally with the raw pair contrasts.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        header: &MatrixHeader,
        raw: Option<&RawContrastMatrix>,
    ) -> Result<(), PastisError> {
        let mut images = vec![FitsImage::new("PASTIS", FitsDataType::Float64(self.matrix.clone()))
            .with_key("AMPNM", self.amplitude_nm)
            .with_key("FLOOR", self.floor)
            .with_key("WAVELNM", header.wavelength_nm)
            .with_key("NOLL", header.noll as f64)];
        if let Some(raw) = raw {
            images.push(
                FitsImage::new("RAW", FitsDataType::Float64(raw.values.clone()))
                    .with_key("AMPNM", raw.amplitude_nm)
                    .with_key("FLOOR", raw.floor),
            );
        }
        write_fits_images(&images, path)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, MatrixHeader), PastisError> {
        let mut images = read_fits_images(path, &["AMPNM", "FLOOR", "WAVELNM", "NOLL"])?;
        let image = take_image(&mut images, "PASTIS")?;
        let header = MatrixHeader {
            wavelength_nm: image.key("WAVELNM")?,
            noll: image.key("NOLL")?.round() as u8,
        };
        let matrix = Self::new(image.data.clone(), image.key("FLOOR")?, image.key("AMPNM")?);
        Ok((matrix, header))
    }
}

/// Pairs `(i, j)` with `i <= j`, row by row.
pub fn segment_pairs_non_repeating(n: usize) -> Vec<(usize, usize)> {
    (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect()
}

/// Measures a PASTIS matrix with any [`ContrastProbe`].
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    amplitude_nm: f64,
    obscured_segment: Option<usize>,
}

impl MatrixBuilder {
    pub fn new(amplitude_nm: f64) -> Self {
        Self {
            amplitude_nm,
            obscured_segment: None,
        }
    }

    /// Skip probing pairs that involve a segment known to be obscured.
    ///
    /// A poke on the obscured segment changes nothing, so those pairs are
    /// filled from the partner's single poke without calling the probe.
    pub fn with_obscured_segment(mut self, obscured: Option<usize>) -> Self {
        self.obscured_segment = obscured;
        self
    }

    /// Probe the floor and every pair poke.
    ///
    /// Pairs are probed in parallel. Setting `cancel` makes pending pairs
    /// fail with `Cancelled`, which aborts the whole batch. `on_pair` is
    /// called once per completed probe (e.g. to advance a progress bar).
    pub fn measure<P, F>(
        &self,
        probe: &P,
        cancel: &AtomicBool,
        on_pair: F,
    ) -> Result<RawContrastMatrix, PastisError>
    where
        P: ContrastProbe + ?Sized,
        F: Fn() + Sync,
    {
        let n = probe.segment_count();
        let floor = probe.mean_contrast(&vec![0.0; n])?;
        info!(
            "Probing {} segment pairs at {} nm (floor {:.3e})",
            n * (n + 1) / 2,
            self.amplitude_nm,
            floor
        );

        let skip = |i: usize, j: usize| {
            self.obscured_segment
                .map(|k| i == k || j == k)
                .unwrap_or(false)
        };

        let results = segment_pairs_non_repeating(n)
            .into_par_iter()
            .map(|(i, j)| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(PastisError::Cancelled);
                }
                if skip(i, j) {
                    return Ok(((i, j), None));
                }

                let mut aberration = vec![0.0; n];
                aberration[i] = self.amplitude_nm;
                aberration[j] = self.amplitude_nm;
                let contrast = probe.mean_contrast(&aberration)?;
                on_pair();
                Ok(((i, j), Some(contrast)))
            })
            .collect::<Result<Vec<_>, PastisError>>()?;

        let mut values = Array2::<f64>::zeros((n, n));
        let mut skipped = Vec::new();
        for ((i, j), contrast) in results {
            match contrast {
                Some(value) => {
                    values[[i, j]] = value;
                    values[[j, i]] = value;
                }
                None => skipped.push((i, j)),
            }
        }

        // A poke that includes the obscured segment equals the poke of its partner alone
        for (i, j) in skipped {
            let partner = match self.obscured_segment {
                Some(k) if i == k => j,
                _ => i,
            };
            let value = if skip(partner, partner) {
                floor
            } else {
                values[[partner, partner]]
            };
            values[[i, j]] = value;
            values[[j, i]] = value;
        }
        debug!(
            "Raw contrast range {:.3e}..{:.3e}",
            values.iter().copied().fold(f64::INFINITY, f64::min),
            values.iter().copied().fold(0.0, f64::max)
        );

        Ok(RawContrastMatrix {
            values,
            floor,
            amplitude_nm: self.amplitude_nm,
        })
    }

    /// Measure and convert in one go.
    pub fn build<P>(&self, probe: &P, cancel: &AtomicBool) -> Result<(PastisMatrix, RawContrastMatrix), PastisError>
    where
        P: ContrastProbe + ?Sized,
    {
        let raw = self.measure(probe, cancel, || {})?;
        Ok((PastisMatrix::from_raw(&raw), raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    /// Exact quadratic probe `aᵀ·Q·a + floor`.
    struct QuadraticProbe {
        q: Array2<f64>,
        floor: f64,
    }

    impl ContrastProbe for QuadraticProbe {
        fn segment_count(&self) -> usize {
            self.q.nrows()
        }

        fn mean_contrast(&self, aberration_nm: &[f64]) -> Result<f64, PastisError> {
            let a = Array1::from(aberration_nm.to_vec());
            Ok(a.dot(&self.q.dot(&a)) + self.floor)
        }
    }

    fn quadratic_probe() -> QuadraticProbe {
        let q = Array2::from_shape_fn((5, 5), |(i, j)| {
            if i == j {
                2.0 + i as f64
            } else {
                0.1 * (i + j) as f64
            }
        });
        QuadraticProbe { q, floor: 1e-3 }
    }

    #[test]
    fn test_recovers_quadratic_form() {
        let probe = quadratic_probe();
        let (matrix, raw) = MatrixBuilder::new(0.5)
            .build(&probe, &AtomicBool::new(false))
            .unwrap();

        assert_relative_eq!(raw.floor, 1e-3);
        for ((i, j), &m) in matrix.matrix().indexed_iter() {
            assert_relative_eq!(m, probe.q[[i, j]], epsilon = 1e-10);
        }
        assert_eq!(matrix.asymmetry(), 0.0);

        let a = [0.3, -1.0, 0.0, 2.0, 0.5];
        assert_relative_eq!(
            matrix.contrast(&a).unwrap(),
            probe.mean_contrast(&a).unwrap(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_from_raw_is_exactly_symmetric() {
        // Values chosen so the two summation orders round differently
        let values = ndarray::arr2(&[
            [0.1 + 1e-3, 0.7, 0.3 + 1e-17],
            [0.7, 0.2 + 1e-3, 0.9],
            [0.3 + 1e-17, 0.9, 0.3 + 1e-3],
        ]);
        let raw = RawContrastMatrix {
            values,
            floor: 1e-3,
            amplitude_nm: 1.0,
        };
        let matrix = PastisMatrix::from_raw(&raw);
        assert_eq!(matrix.asymmetry(), 0.0);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(matrix.matrix()[[i, j]].to_bits(), matrix.matrix()[[j, i]].to_bits());
            }
        }
        assert_relative_eq!(matrix.matrix()[[0, 1]], (0.7 + 1e-3 - 0.101 - 0.201) / 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_contrast_dimension_error() {
        let matrix = PastisMatrix::new(Array2::eye(3), 0.0, 1.0);
        assert!(matches!(
            matrix.contrast(&[1.0, 2.0]),
            Err(PastisError::Dimension {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_cancelled_build() {
        let probe = quadratic_probe();
        let result = MatrixBuilder::new(1.0).build(&probe, &AtomicBool::new(true));
        assert!(matches!(result, Err(PastisError::Cancelled)));
    }

    #[test]
    fn test_obscured_rows_skip_probe() {
        let probe = quadratic_probe();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let raw = MatrixBuilder::new(1.0)
            .with_obscured_segment(Some(0))
            .measure(&probe, &AtomicBool::new(false), || {
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        // 15 pairs, 5 of them involve segment 0
        assert_eq!(calls.load(Ordering::Relaxed), 10);

        let matrix = PastisMatrix::from_raw(&raw);
        for j in 0..5 {
            assert_eq!(matrix.matrix()[[0, j]], 0.0);
        }
    }

    #[test]
    fn test_pairs() {
        let pairs = segment_pairs_non_repeating(3);
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_fits_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pastis_matrix.fits");

        let probe = quadratic_probe();
        let (matrix, raw) = MatrixBuilder::new(1.0)
            .build(&probe, &AtomicBool::new(false))
            .unwrap();
        let header = MatrixHeader {
            wavelength_nm: 640.0,
            noll: 2,
        };
        matrix.save(&path, &header, Some(&raw)).unwrap();

        let (loaded, loaded_header) = PastisMatrix::load(&path).unwrap();
        assert_eq!(loaded, matrix);
        assert_eq!(loaded_header, header);
    }
}
