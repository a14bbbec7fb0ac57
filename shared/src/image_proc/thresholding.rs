//! Connected-component labeling of binary masks.
//!
//! Two-pass labeling with a union-find equivalence table, using
//! 4-connectivity (horizontal and vertical neighbours only).

use ndarray::{Array2, ArrayView2};

use crate::algo::DisjointSet;

/// Connected component labeling using the two-pass union-find algorithm.
///
/// # Algorithm
/// 1. **First pass**: scan the mask, assign provisional labels and record
///    equivalences between touching labels
/// 2. **Union-find**: resolve equivalences
/// 3. **Second pass**: relabel with consecutive labels in scan order
///
/// # Arguments
/// * `mask` - Binary mask, `true` marks foreground
///
/// # Returns
/// Label image with 0 for background and 1..=n for the n components. Labels
/// are assigned in row-major order of each component's first pixel.
pub fn connected_components(mask: &ArrayView2<bool>) -> Array2<usize> {
    let (height, width) = mask.dim();
    let mut labels = Array2::<usize>::zeros((height, width));

    // Index 0 is reserved for background so provisional labels start at 1
    let mut equivalences = DisjointSet::new(1);

    for i in 0..height {
        for j in 0..width {
            if !mask[[i, j]] {
                continue;
            }

            let up = if i > 0 { labels[[i - 1, j]] } else { 0 };
            let left = if j > 0 { labels[[i, j - 1]] } else { 0 };

            labels[[i, j]] = match (up, left) {
                (0, 0) => equivalences.push(),
                (0, l) | (l, 0) => l,
                (u, l) => {
                    equivalences.union(u, l);
                    u.min(l)
                }
            };
        }
    }

    let roots = equivalences.roots();
    let mut relabel = vec![0usize; roots.len()];
    let mut next_label = 1;

    for provisional in 1..roots.len() {
        let root = roots[provisional];
        if relabel[root] == 0 {
            relabel[root] = next_label;
            next_label += 1;
        }
        relabel[provisional] = relabel[root];
    }

    labels.mapv_inplace(|label| relabel[label]);
    labels
}

/// Mean (row, col) position of every labeled component.
///
/// # Arguments
/// * `labels` - Label image from [`connected_components`]
///
/// # Returns
/// Vector indexed by `label - 1` holding `(row, col, pixel_count)`
pub fn label_centroids(labels: &ArrayView2<usize>) -> Vec<(f64, f64, usize)> {
    let max_label = labels.iter().copied().max().unwrap_or(0);
    let mut sums = vec![(0.0, 0.0, 0usize); max_label];

    for ((row, col), &label) in labels.indexed_iter() {
        if label > 0 {
            let entry = &mut sums[label - 1];
            entry.0 += row as f64;
            entry.1 += col as f64;
            entry.2 += 1;
        }
    }

    sums.into_iter()
        .map(|(r, c, n)| (r / n as f64, c / n as f64, n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Creates a binary test mask from rows of 1s and 0s
    fn create_test_mask(pattern: &[&[u8]]) -> Array2<bool> {
        let height = pattern.len();
        let width = pattern[0].len();
        Array2::from_shape_fn((height, width), |(i, j)| pattern[i][j] != 0)
    }

    #[test]
    fn test_empty_mask() {
        let mask = Array2::from_elem((5, 5), false);
        let labels = connected_components(&mask.view());
        assert!(labels.iter().all(|&l| l == 0));
        assert!(label_centroids(&labels.view()).is_empty());
    }

    #[test]
    fn test_two_separate_blobs() {
        let mask = create_test_mask(&[
            &[1, 1, 0, 0, 0],
            &[1, 1, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 1, 1],
            &[0, 0, 0, 1, 1],
        ]);

        let labels = connected_components(&mask.view());
        assert_eq!(labels[[0, 0]], 1);
        assert_eq!(labels[[4, 4]], 2);

        let centroids = label_centroids(&labels.view());
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids[0], (0.5, 0.5, 4));
        assert_eq!(centroids[1], (3.5, 3.5, 4));
    }

    #[test]
    fn test_u_shape_merges_into_one_label() {
        let mask = create_test_mask(&[
            &[1, 0, 1],
            &[1, 0, 1],
            &[1, 1, 1],
        ]);

        let labels = connected_components(&mask.view());
        assert!(labels.iter().filter(|&&l| l > 0).all(|&l| l == 1));
    }

    #[test]
    fn test_diagonal_is_not_connected() {
        let mask = create_test_mask(&[&[1, 0], &[0, 1]]);
        let labels = connected_components(&mask.view());
        assert_eq!(labels[[0, 0]], 1);
        assert_eq!(labels[[1, 1]], 2);
    }
}
