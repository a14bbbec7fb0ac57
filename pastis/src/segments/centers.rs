//! Segment center extraction from a rendered pupil.

use log::debug;
use ndarray::ArrayView2;
use shared::image_proc::{binary_erosion, connected_components, label_centroids, StructuringElement};

use crate::error::PastisError;

/// Locate segment centers in an indexed pupil mask.
///
/// The aperture is eroded by `template` so that only a small blob survives
/// near each segment center. Every blob is mapped to the segment index under
/// its centroid. The blobs only validate the layout (one blob per segment,
/// none on background); the reported center is the centroid of the full
/// segment footprint in `mask`.
///
/// # Arguments
/// * `mask` - Indexed pupil (0 background, `k + 1` for segment `k`)
/// * `template` - Single-segment structuring element, slightly shrunk
/// * `expected` - Number of segments the layout implies
///
/// # Returns
/// Fractional `(row, col)` pixel centers, indexed by segment.
///
/// # Errors
/// `Geometry` when the number of blobs differs from `expected`;
/// `GeometryMapping` when a blob lands on background, on an unknown index, or
/// on a segment already claimed by another blob.
pub fn extract_segment_centers(
    mask: &ArrayView2<u32>,
    template: &StructuringElement,
    expected: usize,
) -> Result<Vec<(f64, f64)>, PastisError> {
    let aperture = mask.mapv(|v| v != 0);
    let eroded = binary_erosion(&aperture.view(), template);
    let labels = connected_components(&eroded.view());
    let blobs = label_centroids(&labels.view());

    debug!(
        "Erosion left {} blobs ({} surviving pixels)",
        blobs.len(),
        eroded.iter().filter(|&&v| v).count()
    );

    if blobs.len() != expected {
        return Err(PastisError::Geometry {
            expected,
            found: blobs.len(),
        });
    }

    let (rows, cols) = mask.dim();
    let mut claimed = vec![false; expected];
    for &(row, col, _) in &blobs {
        let r = (row.round() as usize).min(rows - 1);
        let c = (col.round() as usize).min(cols - 1);
        let index = mask[[r, c]];
        if index == 0 {
            return Err(PastisError::GeometryMapping(format!(
                "blob at ({row:.1}, {col:.1}) lies on background"
            )));
        }
        let segment = (index - 1) as usize;
        if segment >= expected {
            return Err(PastisError::GeometryMapping(format!(
                "blob at ({row:.1}, {col:.1}) maps to segment {segment}, beyond {expected} segments"
            )));
        }
        if claimed[segment] {
            return Err(PastisError::GeometryMapping(format!(
                "segment {segment} matched by more than one blob"
            )));
        }
        claimed[segment] = true;
    }

    Ok(footprint_centroids(mask, expected))
}

/// Centroid of every segment footprint in an indexed mask.
pub fn footprint_centroids(mask: &ArrayView2<u32>, segments: usize) -> Vec<(f64, f64)> {
    let mut sums = vec![(0.0, 0.0, 0usize); segments];
    for ((r, c), &v) in mask.indexed_iter() {
        if v == 0 || v as usize > segments {
            continue;
        }
        let entry = &mut sums[v as usize - 1];
        entry.0 += r as f64;
        entry.1 += c as f64;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(sr, sc, n)| {
            if n == 0 {
                (f64::NAN, f64::NAN)
            } else {
                (sr / n as f64, sc / n as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::HEX_7;
    use crate::segments::mask::{render_indexed_mask, segment_template};
    use ndarray::Array2;

    #[test]
    fn test_extracts_every_segment() {
        let aperture = HEX_7.aperture.clone();
        let mask = render_indexed_mask(&aperture);
        let template = segment_template(&aperture);
        let centers = extract_segment_centers(&mask.view(), &template, 7).unwrap();

        assert_eq!(centers.len(), 7);
        // Central segment sits on the array center, between pixels 47 and 48
        assert!((centers[0].0 - 47.5).abs() < 0.5);
        assert!((centers[0].1 - 47.5).abs() < 0.5);
    }

    #[test]
    fn test_centers_are_footprint_centroids() {
        let aperture = HEX_7.aperture.clone();
        let mask = render_indexed_mask(&aperture);
        let template = segment_template(&aperture);
        let centers = extract_segment_centers(&mask.view(), &template, 7).unwrap();
        assert_eq!(centers, footprint_centroids(&mask.view(), 7));
    }

    #[test]
    fn test_wrong_expected_count() {
        let aperture = HEX_7.aperture.clone();
        let mask = render_indexed_mask(&aperture);
        let template = segment_template(&aperture);
        let err = extract_segment_centers(&mask.view(), &template, 6).unwrap_err();
        assert!(matches!(
            err,
            PastisError::Geometry {
                expected: 6,
                found: 7
            }
        ));
    }

    #[test]
    fn test_footprint_centroids_of_squares() {
        let mut mask = Array2::<u32>::zeros((10, 10));
        for r in 1..4 {
            for c in 1..4 {
                mask[[r, c]] = 1;
                mask[[r + 5, c + 5]] = 2;
            }
        }
        let centroids = footprint_centroids(&mask.view(), 3);
        assert_eq!(centroids[0], (2.0, 2.0));
        assert_eq!(centroids[1], (7.0, 7.0));
        assert!(centroids[2].0.is_nan());
    }
}
