//! Annular masks and masked statistics for focal-plane images.
//!
//! The coronagraph "dark hole" is an annulus between an inner and an outer
//! working angle centered on the star. These helpers build that mask on a
//! pixel grid and average an image over it.

use ndarray::{Array2, ArrayView2};

/// Build an annular mask centered at `(rows / 2, cols / 2)`.
///
/// A pixel is inside the annulus when `inner_radius <= r < outer_radius`,
/// where `r` is the distance of the pixel center from the grid center.
///
/// # Arguments
/// * `shape` - Mask shape as (rows, cols)
/// * `inner_radius` - Inner radius in pixels (excluded below)
/// * `outer_radius` - Outer radius in pixels (excluded at and above)
pub fn annulus_mask(shape: (usize, usize), inner_radius: f64, outer_radius: f64) -> Array2<bool> {
    let (rows, cols) = shape;
    let center_row = (rows / 2) as f64;
    let center_col = (cols / 2) as f64;

    Array2::from_shape_fn(shape, |(r, c)| {
        let dy = r as f64 - center_row;
        let dx = c as f64 - center_col;
        let distance = (dx * dx + dy * dy).sqrt();
        distance >= inner_radius && distance < outer_radius
    })
}

/// Mean of `image` over the pixels where `mask` is true.
///
/// # Returns
/// `None` when the shapes differ or the mask is empty.
pub fn masked_mean(image: &ArrayView2<f64>, mask: &ArrayView2<bool>) -> Option<f64> {
    if image.dim() != mask.dim() {
        return None;
    }

    let (sum, count) = image
        .iter()
        .zip(mask.iter())
        .filter(|(_, &inside)| inside)
        .fold((0.0, 0usize), |(s, n), (&v, _)| (s + v, n + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
