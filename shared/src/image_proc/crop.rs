//! Centered sub-array extraction.

use ndarray::{s, Array2, ArrayView2};

/// Cut a `size` x `size` box out of the center of `image`.
///
/// The box is aligned so that the input center pixel `(rows / 2, cols / 2)`
/// lands on the output center pixel `(size / 2, size / 2)`. Parts of the box
/// falling outside the input are zero-filled.
pub fn crop_center<T>(image: &ArrayView2<T>, size: usize) -> Array2<T>
where
    T: Clone + Default,
{
    let (rows, cols) = image.dim();
    let row_start = (rows / 2) as isize - (size / 2) as isize;
    let col_start = (cols / 2) as isize - (size / 2) as isize;

    let clamp = |start: isize, len: usize| -> (usize, usize, usize) {
        let src_lo = start.max(0) as usize;
        let src_hi = ((start + size as isize).max(0) as usize).min(len);
        let dst_lo = (src_lo as isize - start) as usize;
        (src_lo, src_hi.max(src_lo), dst_lo)
    };

    let (r_lo, r_hi, dr) = clamp(row_start, rows);
    let (c_lo, c_hi, dc) = clamp(col_start, cols);

    let mut out = Array2::<T>::default((size, size));
    out.slice_mut(s![dr..dr + (r_hi - r_lo), dc..dc + (c_hi - c_lo)])
        .assign(&image.slice(s![r_lo..r_hi, c_lo..c_hi]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_keeps_center() {
        let image = Array2::from_shape_fn((9, 9), |(r, c)| (r * 10 + c) as i32);
        let cropped = crop_center(&image.view(), 3);
        assert_eq!(cropped[[1, 1]], image[[4, 4]]);
        assert_eq!(cropped[[0, 0]], image[[3, 3]]);
    }

    #[test]
    fn test_crop_even_sizes() {
        let image = Array2::from_shape_fn((8, 8), |(r, c)| (r * 10 + c) as i32);
        let cropped = crop_center(&image.view(), 4);
        assert_eq!(cropped[[2, 2]], image[[4, 4]]);
        assert_eq!(cropped.dim(), (4, 4));
    }

    #[test]
    fn test_crop_larger_than_input_zero_fills() {
        let image = Array2::from_elem((2, 2), 1.0);
        let cropped = crop_center(&image.view(), 6);
        assert_eq!(cropped.iter().filter(|&&v| v == 1.0).count(), 4);
        assert_eq!(cropped[[3, 3]], 1.0);
        assert_eq!(cropped[[0, 0]], 0.0);
    }
}
