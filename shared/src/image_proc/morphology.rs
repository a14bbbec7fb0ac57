//! Binary morphology on boolean masks.

use ndarray::{Array2, ArrayView2};

use crate::algo::map_rows_in_parallel;

/// A structuring element stored as a list of (row, col) offsets from its center.
///
/// Offsets are kept sorted from the farthest to the nearest so that erosion
/// rejects off-center pixels after only a handful of probes.
#[derive(Debug, Clone)]
pub struct StructuringElement {
    offsets: Vec<(isize, isize)>,
}

impl StructuringElement {
    /// Build an element from a boolean footprint whose center is at `(rows / 2, cols / 2)`.
    pub fn from_footprint(footprint: &ArrayView2<bool>) -> Self {
        let (rows, cols) = footprint.dim();
        let center_row = (rows / 2) as isize;
        let center_col = (cols / 2) as isize;

        let offsets = footprint
            .indexed_iter()
            .filter(|(_, &on)| on)
            .map(|((r, c), _)| (r as isize - center_row, c as isize - center_col))
            .collect();

        Self::from_offsets(offsets)
    }

    /// Build an element from explicit offsets.
    pub fn from_offsets(mut offsets: Vec<(isize, isize)>) -> Self {
        offsets.sort_by_key(|&(dr, dc)| std::cmp::Reverse(dr * dr + dc * dc));
        Self { offsets }
    }

    /// Number of active pixels in the element
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

/// Binary erosion of `mask` by `element`.
///
/// A pixel survives when every offset of the element, placed on that pixel,
/// lands on a foreground pixel. Offsets falling outside the mask count as
/// background. Rows are processed in parallel.
///
/// # Arguments
/// * `mask` - Binary input mask
/// * `element` - Structuring element
///
/// # Returns
/// Eroded mask with the same shape as the input. An empty element leaves the
/// mask unchanged.
pub fn binary_erosion(mask: &ArrayView2<bool>, element: &StructuringElement) -> Array2<bool> {
    let (height, width) = mask.dim();

    map_rows_in_parallel((height, width), |row, out_row| {
        for col in 0..width {
            if !mask[[row, col]] {
                continue;
            }

            out_row[col] = element.offsets.iter().all(|&(dr, dc)| {
                let r = row as isize + dr;
                let c = col as isize + dc;
                r >= 0
                    && c >= 0
                    && (r as usize) < height
                    && (c as usize) < width
                    && mask[[r as usize, c as usize]]
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross() -> StructuringElement {
        StructuringElement::from_offsets(vec![(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)])
    }

    #[test]
    fn test_offsets_sorted_far_to_near() {
        let element = cross();
        assert_eq!(element.offsets().last(), Some(&(0, 0)));
        assert_eq!(element.len(), 5);
    }

    #[test]
    fn test_erosion_shrinks_square() {
        let mut mask = Array2::from_elem((7, 7), false);
        for r in 1..6 {
            for c in 1..6 {
                mask[[r, c]] = true;
            }
        }

        let eroded = binary_erosion(&mask.view(), &cross());
        let survivors: Vec<_> = eroded
            .indexed_iter()
            .filter(|(_, &v)| v)
            .map(|(idx, _)| idx)
            .collect();

        assert_eq!(survivors.len(), 9);
        assert!(eroded[[3, 3]]);
        assert!(!eroded[[1, 1]]);
    }

    #[test]
    fn test_erosion_treats_border_as_background() {
        let mask = Array2::from_elem((3, 3), true);
        let eroded = binary_erosion(&mask.view(), &cross());
        assert!(eroded[[1, 1]]);
        assert_eq!(eroded.iter().filter(|&&v| v).count(), 1);
    }

    #[test]
    fn test_footprint_center() {
        let footprint = Array2::from_shape_fn((3, 3), |(r, c)| r == 1 || c == 1);
        let element = StructuringElement::from_footprint(&footprint.view());
        let mut offsets = element.offsets().to_vec();
        offsets.sort();
        assert_eq!(offsets, vec![(-1, 0), (0, -1), (0, 0), (0, 1), (1, 0)]);
    }
}
