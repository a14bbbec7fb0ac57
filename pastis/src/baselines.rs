//! Redundant baseline classification.
//!
//! Two segment pairs share a baseline when their relative vectors have the
//! same length and are parallel or anti-parallel. Every distinct baseline gets
//! an id 1..=K, and the N×N projection index maps each pair to its id.
//!
//! # Clustering
//!
//! Candidate pairs `i < j` are sorted by vector length. Each candidate is
//! compared only with the following candidates whose length is still within
//! the length tolerance, and matching candidates are merged in a disjoint-set
//! forest. The resulting classes do not depend on pair scan order.
//!
//! Each class is represented by its member with the smallest flattened index
//! `i·N + j`, and classes are numbered in ascending order of that index.

use log::debug;
use nalgebra::{Vector2, Vector3};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use shared::algo::DisjointSet;

use crate::error::PastisError;
use crate::segments::SegmentGeometry;

/// Thresholds deciding when two relative vectors are the same baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedundancyTolerance {
    /// Maximum length difference, meters
    pub length: f64,

    /// Maximum cross-product magnitude, square meters
    pub cross: f64,
}

impl RedundancyTolerance {
    pub fn new(length: f64, cross: f64) -> Self {
        Self { length, cross }
    }

    /// Tolerances scaled to the segment pitch.
    ///
    /// Distinct lattice baselines differ in length by at least ~0.095 pitch
    /// and non-parallel ones have a cross product of at least ~0.87 pitch².
    pub fn from_pitch(pitch: f64) -> Self {
        Self {
            length: 0.04 * pitch,
            cross: 0.25 * pitch * pitch,
        }
    }

    pub fn same_baseline(&self, a: &Vector2<f64>, b: &Vector2<f64>) -> bool {
        (a.norm() - b.norm()).abs() < self.length && cross_magnitude(a, b) < self.cross
    }
}

/// Magnitude of `a × b` with both vectors embedded at z = 0.
fn cross_magnitude(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    Vector3::new(a.x, a.y, 0.0)
        .cross(&Vector3::new(b.x, b.y, 0.0))
        .norm()
}

/// One distinct baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Id in 1..=K
    pub id: usize,

    /// Representative pair `(m, n)`, `m < n`
    pub pair: (usize, usize),

    /// `P[m] - P[n]` in meters
    pub vector: Vector2<f64>,
}

/// Resolved baselines and the pair-to-baseline projection index.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineSet {
    baselines: Vec<Baseline>,
    projection: Array2<usize>,
    tolerance: RedundancyTolerance,
}

struct Candidate {
    pair: (usize, usize),
    vector: Vector2<f64>,
    length: f64,
}

impl BaselineSet {
    /// Classify every segment pair of `geometry` into distinct baselines.
    pub fn resolve(geometry: &SegmentGeometry, tolerance: RedundancyTolerance) -> Self {
        let n = geometry.len();

        let mut candidates: Vec<Candidate> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| {
                let vector = geometry.relative_vector(i, j);
                Candidate {
                    pair: (i, j),
                    vector,
                    length: vector.norm(),
                }
            })
            .collect();
        candidates.sort_by(|a, b| a.length.total_cmp(&b.length));

        let mut classes = DisjointSet::new(candidates.len());
        for a in 0..candidates.len() {
            for b in a + 1..candidates.len() {
                if candidates[b].length - candidates[a].length >= tolerance.length {
                    break;
                }
                if cross_magnitude(&candidates[a].vector, &candidates[b].vector) < tolerance.cross {
                    classes.union(a, b);
                }
            }
        }

        // Representative of each class: smallest flattened pair index
        let flat = |(i, j): (usize, usize)| i * n + j;
        let mut representative = vec![usize::MAX; candidates.len()];
        for (k, candidate) in candidates.iter().enumerate() {
            let root = classes.find(k);
            let current = representative[root];
            if current == usize::MAX || flat(candidate.pair) < flat(candidates[current].pair) {
                representative[root] = k;
            }
        }

        let mut roots: Vec<usize> = (0..candidates.len())
            .filter(|&k| representative[k] != usize::MAX)
            .collect();
        roots.sort_by_key(|&root| flat(candidates[representative[root]].pair));

        let mut id_of_root = vec![0usize; candidates.len()];
        let baselines: Vec<Baseline> = roots
            .iter()
            .enumerate()
            .map(|(index, &root)| {
                id_of_root[root] = index + 1;
                let rep = &candidates[representative[root]];
                Baseline {
                    id: index + 1,
                    pair: rep.pair,
                    vector: rep.vector,
                }
            })
            .collect();

        let mut projection = Array2::<usize>::zeros((n, n));
        for (k, candidate) in candidates.iter().enumerate() {
            let id = id_of_root[classes.find(k)];
            let (i, j) = candidate.pair;
            projection[[i, j]] = id;
            projection[[j, i]] = id;
        }

        debug!(
            "Resolved {} baselines from {} segment pairs",
            baselines.len(),
            candidates.len()
        );

        Self {
            baselines,
            projection,
            tolerance,
        }
    }

    /// Rebuild a set from persisted parts, checking their consistency.
    ///
    /// # Errors
    /// `Dimension` when the projection is not `segment_count`×`segment_count`;
    /// `Tolerance` when the ids in the projection do not match the table;
    /// `InvalidConfig` when the projection is not symmetric with a zero
    /// diagonal or a representative pair is out of range or mislabelled.
    pub fn from_parts(
        baselines: Vec<Baseline>,
        projection: Array2<usize>,
        tolerance: RedundancyTolerance,
        segment_count: usize,
    ) -> Result<Self, PastisError> {
        let (rows, cols) = projection.dim();
        for found in [rows, cols] {
            if found != segment_count {
                return Err(PastisError::Dimension {
                    expected: segment_count,
                    found,
                });
            }
        }

        for i in 0..segment_count {
            if projection[[i, i]] != 0 {
                return Err(PastisError::InvalidConfig(format!(
                    "projection diagonal ({i}, {i}) is {}",
                    projection[[i, i]]
                )));
            }
            for j in i + 1..segment_count {
                if projection[[i, j]] != projection[[j, i]] {
                    return Err(PastisError::InvalidConfig(format!(
                        "projection not symmetric at ({i}, {j}): {} vs {}",
                        projection[[i, j]],
                        projection[[j, i]]
                    )));
                }
            }
        }

        let max_id = projection.iter().copied().max().unwrap_or(0);
        if max_id != baselines.len() {
            return Err(PastisError::Tolerance {
                expected: baselines.len(),
                found: max_id,
            });
        }

        for (k, baseline) in baselines.iter().enumerate() {
            let (m, n) = baseline.pair;
            if baseline.id != k + 1 || m >= n || n >= segment_count {
                return Err(PastisError::InvalidConfig(format!(
                    "baseline #{} has invalid representative pair ({m}, {n})",
                    baseline.id
                )));
            }
            if projection[[m, n]] != baseline.id {
                return Err(PastisError::InvalidConfig(format!(
                    "representative pair ({m}, {n}) of baseline #{} is labelled {}",
                    baseline.id,
                    projection[[m, n]]
                )));
            }
        }

        Ok(Self {
            baselines,
            projection,
            tolerance,
        })
    }

    /// Number of distinct baselines, K.
    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.projection.nrows()
    }

    pub fn baselines(&self) -> &[Baseline] {
        &self.baselines
    }

    /// Baseline with the given id (1-based).
    pub fn baseline(&self, id: usize) -> Option<&Baseline> {
        id.checked_sub(1).and_then(|k| self.baselines.get(k))
    }

    pub fn projection(&self) -> ArrayView2<'_, usize> {
        self.projection.view()
    }

    /// Baseline id joining segments `i` and `j`; `None` when `i == j`.
    pub fn baseline_id(&self, i: usize, j: usize) -> Option<usize> {
        match self.projection[[i, j]] {
            0 => None,
            id => Some(id),
        }
    }

    /// All pairs `i < j` that share baseline `id`.
    pub fn pairs(&self, id: usize) -> Vec<(usize, usize)> {
        let n = self.segment_count();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.projection[[i, j]] == id)
            .collect()
    }

    pub fn tolerance(&self) -> RedundancyTolerance {
        self.tolerance
    }

    /// Fail when the resolved count differs from the count the layout implies.
    pub fn validate_count(&self, expected: usize) -> Result<(), PastisError> {
        if self.len() != expected {
            return Err(PastisError::Tolerance {
                expected,
                found: self.len(),
            });
        }
        Ok(())
    }

    /// Sum of `c[i]·c[j]` over the pairs `i < j` of every baseline, indexed by id - 1.
    pub fn generic_coefficients(&self, coefficients: &[f64]) -> Result<Vec<f64>, PastisError> {
        let n = self.segment_count();
        if coefficients.len() != n {
            return Err(PastisError::Dimension {
                expected: n,
                found: coefficients.len(),
            });
        }
        let mut generic = vec![0.0; self.len()];
        for i in 0..n {
            if coefficients[i] == 0.0 {
                continue;
            }
            for j in i + 1..n {
                let id = self.projection[[i, j]];
                if id > 0 {
                    generic[id - 1] += coefficients[i] * coefficients[j];
                }
            }
        }
        Ok(generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{HEX_37, HEX_7};
    use crate::segments::hex;

    fn hex37() -> SegmentGeometry {
        SegmentGeometry::ideal(&HEX_37.aperture)
    }

    #[test]
    fn test_hex7_has_nine_baselines() {
        let geometry = SegmentGeometry::ideal(&HEX_7.aperture);
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));
        assert_eq!(set.len(), 9);
        set.validate_count(hex::expected_baseline_count(1)).unwrap();
    }

    #[test]
    fn test_hex37_count_and_projection_symmetry() {
        let geometry = hex37();
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));
        assert_eq!(set.len(), 63);

        let p = set.projection();
        for i in 0..37 {
            assert_eq!(p[[i, i]], 0);
            for j in 0..37 {
                assert_eq!(p[[i, j]], p[[j, i]]);
                if i != j {
                    assert!(p[[i, j]] >= 1 && p[[i, j]] <= 63);
                }
            }
        }
    }

    #[test]
    fn test_ids_follow_representative_order() {
        let geometry = hex37();
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));

        let flat: Vec<usize> = set.baselines().iter().map(|b| b.pair.0 * 37 + b.pair.1).collect();
        assert!(flat.windows(2).all(|w| w[0] < w[1]));

        // Segment 0 pairs with every other segment first, so baseline 1 is (0, 1)
        assert_eq!(set.baseline(1).unwrap().pair, (0, 1));
        for b in set.baselines() {
            assert_eq!(set.baseline_id(b.pair.0, b.pair.1), Some(b.id));
            assert!(b.pair.0 < b.pair.1);
            // The representative is the smallest flattened pair of its class
            let first = set.pairs(b.id)[0];
            assert_eq!(first, b.pair);
        }
    }

    #[test]
    fn test_members_share_length_and_direction() {
        let geometry = hex37();
        let tol = RedundancyTolerance::from_pitch(geometry.pitch_m());
        let set = BaselineSet::resolve(&geometry, tol);
        for b in set.baselines() {
            for (i, j) in set.pairs(b.id) {
                assert!(tol.same_baseline(&geometry.relative_vector(i, j), &b.vector));
            }
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let geometry = hex37();
        let tol = RedundancyTolerance::from_pitch(geometry.pitch_m());
        assert_eq!(BaselineSet::resolve(&geometry, tol), BaselineSet::resolve(&geometry, tol));
    }

    #[test]
    fn test_loose_tolerance_merges_baselines() {
        let geometry = hex37();
        let pitch = geometry.pitch_m();
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::new(0.5 * pitch, 2.0 * pitch * pitch));
        assert!(set.len() < 63);
        assert!(matches!(
            set.validate_count(63),
            Err(PastisError::Tolerance { expected: 63, .. })
        ));
    }

    #[test]
    fn test_generic_coefficients() {
        let geometry = SegmentGeometry::ideal(&HEX_7.aperture);
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));

        let mut c = vec![0.0; 7];
        c[1] = 2.0;
        c[4] = 3.0;
        let generic = set.generic_coefficients(&c).unwrap();
        let id = set.baseline_id(1, 4).unwrap();
        assert_eq!(generic[id - 1], 6.0);
        assert_eq!(generic.iter().filter(|&&g| g != 0.0).count(), 1);
    }

    #[test]
    fn test_generic_coefficients_length_mismatch() {
        let geometry = SegmentGeometry::ideal(&HEX_7.aperture);
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));
        assert!(matches!(
            set.generic_coefficients(&[1.0; 4]),
            Err(PastisError::Dimension {
                expected: 7,
                found: 4
            })
        ));
    }

    #[test]
    fn test_from_parts_accepts_resolved_set() {
        let geometry = SegmentGeometry::ideal(&HEX_7.aperture);
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));
        let rebuilt = BaselineSet::from_parts(
            set.baselines().to_vec(),
            set.projection().to_owned(),
            set.tolerance(),
            7,
        )
        .unwrap();
        assert_eq!(rebuilt, set);
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_ids() {
        let geometry = SegmentGeometry::ideal(&HEX_7.aperture);
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));
        let mut baselines = set.baselines().to_vec();
        baselines.pop();
        assert!(matches!(
            BaselineSet::from_parts(baselines, set.projection().to_owned(), set.tolerance(), 7),
            Err(PastisError::Tolerance { .. })
        ));
    }

    #[test]
    fn test_from_parts_rejects_corrupt_projection() {
        let geometry = SegmentGeometry::ideal(&HEX_7.aperture);
        let set = BaselineSet::resolve(&geometry, RedundancyTolerance::from_pitch(geometry.pitch_m()));
        let tolerance = set.tolerance();
        let baselines = set.baselines().to_vec();

        // Wrong segment count
        assert!(matches!(
            BaselineSet::from_parts(baselines.clone(), set.projection().to_owned(), tolerance, 37),
            Err(PastisError::Dimension {
                expected: 37,
                found: 7
            })
        ));

        // Asymmetric entry
        let mut projection = set.projection().to_owned();
        let other = if projection[[1, 2]] == 1 { 2 } else { 1 };
        projection[[1, 2]] = other;
        assert!(matches!(
            BaselineSet::from_parts(baselines.clone(), projection, tolerance, 7),
            Err(PastisError::InvalidConfig(_))
        ));

        // Non-zero diagonal
        let mut projection = set.projection().to_owned();
        projection[[3, 3]] = 1;
        assert!(matches!(
            BaselineSet::from_parts(baselines.clone(), projection, tolerance, 7),
            Err(PastisError::InvalidConfig(_))
        ));

        // Representative pair out of range
        let mut bad = baselines;
        bad[0].pair = (0, 9);
        assert!(matches!(
            BaselineSet::from_parts(bad, set.projection().to_owned(), tolerance, 7),
            Err(PastisError::InvalidConfig(_))
        ));
    }
}
