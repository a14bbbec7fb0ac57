//! Pupil rendering on a pixel grid.
//!
//! Pixel `(row, col)` of an `n`×`n` pupil array has its center at
//! `x = (col + 0.5 - n/2)·dx`, `y = (row + 0.5 - n/2)·dx`, so the aperture is
//! symmetric about the array center.

use nalgebra::Vector2;
use ndarray::{Array2, ArrayView2};
use shared::algo::map_rows_in_parallel;
use shared::image_proc::StructuringElement;

use super::hex::{circumradius, inside_hexagon, lattice_positions};
use crate::config::ApertureConfig;

/// Physical position of a (possibly fractional) pupil pixel coordinate.
pub fn pixel_to_position(row: f64, col: f64, size: usize, pixel_scale: f64) -> Vector2<f64> {
    let half = size as f64 / 2.0;
    Vector2::new((col + 0.5 - half) * pixel_scale, (row + 0.5 - half) * pixel_scale)
}

/// Render the segment layout as an index map.
///
/// Background pixels are 0, pixels of segment `k` hold `k + 1`. Every segment
/// is drawn, including an obscured one.
pub fn render_indexed_mask(aperture: &ApertureConfig) -> Array2<u32> {
    let size = aperture.pupil_px;
    let dx = aperture.pixel_scale_m();
    let flat = aperture.segment_flat_to_flat_m;
    let reach = circumradius(flat);
    let centers = lattice_positions(aperture.rings, aperture.pitch_m());

    map_rows_in_parallel((size, size), |row, out_row| {
        for col in 0..size {
            let p = pixel_to_position(row as f64, col as f64, size, dx);
            let hit = centers.iter().position(|c| {
                let d = p - c;
                d.x.abs() <= reach && d.y.abs() <= reach && inside_hexagon(d.x, d.y, flat)
            });
            if let Some(k) = hit {
                out_row[col] = k as u32 + 1;
            }
        }
    })
}

/// Transmitting pupil: every segment pixel except those of the obscured segment.
pub fn active_pupil(mask: &ArrayView2<u32>, obscured: Option<usize>) -> Array2<bool> {
    let blocked = obscured.map(|k| k as u32 + 1);
    mask.mapv(|v| v != 0 && Some(v) != blocked)
}

/// Footprint of a single segment shrunk by `margin_px` on every side.
///
/// The footprint array is odd-sized so that its center pixel sits on the
/// segment center.
pub fn segment_footprint(aperture: &ApertureConfig, margin_px: f64) -> Array2<bool> {
    let dx = aperture.pixel_scale_m();
    let flat = (aperture.segment_flat_to_flat_m - 2.0 * margin_px * dx).max(0.0);
    let half = (circumradius(aperture.segment_flat_to_flat_m) / dx).ceil() as usize + 1;
    let size = 2 * half + 1;

    Array2::from_shape_fn((size, size), |(r, c)| {
        let x = (c as f64 - half as f64) * dx;
        let y = (r as f64 - half as f64) * dx;
        inside_hexagon(x, y, flat)
    })
}

/// Structuring element for center extraction, built from [`segment_footprint`].
pub fn segment_template(aperture: &ApertureConfig) -> StructuringElement {
    StructuringElement::from_footprint(&segment_footprint(aperture, aperture.erosion_margin_px).view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{HEX_37, HEX_7};

    #[test]
    fn test_all_segments_rendered() {
        let aperture = HEX_7.aperture.clone();
        let mask = render_indexed_mask(&aperture);
        assert_eq!(mask.dim(), (96, 96));

        for k in 1..=7u32 {
            let count = mask.iter().filter(|&&v| v == k).count();
            assert!(count > 500, "segment {} has only {} pixels", k - 1, count);
        }
        assert_eq!(mask.iter().copied().max(), Some(7));
    }

    #[test]
    fn test_center_pixel_belongs_to_segment_zero() {
        let aperture = HEX_37.aperture.clone();
        let mask = render_indexed_mask(&aperture);
        assert_eq!(mask[[128, 128]], 1);
        assert_eq!(mask[[0, 0]], 0);
    }

    #[test]
    fn test_active_pupil_drops_obscured_segment() {
        let aperture = HEX_7.aperture.clone();
        let mask = render_indexed_mask(&aperture);
        let pupil = active_pupil(&mask.view(), Some(0));
        let center_pixels = mask.iter().filter(|&&v| v == 1).count();
        let all_pixels = mask.iter().filter(|&&v| v != 0).count();
        assert_eq!(pupil.iter().filter(|&&v| v).count(), all_pixels - center_pixels);
    }

    #[test]
    fn test_footprint_shrinks_with_margin() {
        let aperture = HEX_7.aperture.clone();
        let full = segment_footprint(&aperture, 0.0);
        let shrunk = segment_footprint(&aperture, 2.0);
        let count = |m: &Array2<bool>| m.iter().filter(|&&v| v).count();
        assert!(count(&shrunk) < count(&full));
        let (rows, cols) = full.dim();
        assert!(full[[rows / 2, cols / 2]]);
    }
}
