//! Centered 2-D Fourier transforms built on rustfft.
//!
//! "Centered" means the zero-frequency term sits at `(rows / 2, cols / 2)` in
//! both the input and the output, the equivalent of
//! `fftshift(fft2(ifftshift(x)))`.

use ndarray::{Array2, ArrayView2, Axis};
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Forward 2-D FFT with the origin at the array center.
///
/// # Arguments
/// * `field` - Complex input field with its origin at `(rows / 2, cols / 2)`
///
/// # Returns
/// Unnormalized spectrum with the zero frequency at `(rows / 2, cols / 2)`
pub fn fft2_centered(field: &ArrayView2<Complex64>) -> Array2<Complex64> {
    let (rows, cols) = field.dim();
    let mut data = ifftshift(field);

    let mut planner = FftPlanner::<f64>::new();

    let row_fft = planner.plan_fft_forward(cols);
    for mut row in data.axis_iter_mut(Axis(0)) {
        let mut buffer: Vec<Complex64> = row.iter().copied().collect();
        row_fft.process(&mut buffer);
        for (dst, src) in row.iter_mut().zip(buffer) {
            *dst = src;
        }
    }

    let col_fft = planner.plan_fft_forward(rows);
    for mut col in data.axis_iter_mut(Axis(1)) {
        let mut buffer: Vec<Complex64> = col.iter().copied().collect();
        col_fft.process(&mut buffer);
        for (dst, src) in col.iter_mut().zip(buffer) {
            *dst = src;
        }
    }

    fftshift(&data.view())
}

/// Move the zero-frequency term from index 0 to the array center.
pub fn fftshift<T: Copy + Default>(input: &ArrayView2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    roll(input, rows / 2, cols / 2)
}

/// Inverse of [`fftshift`]: move the array center to index 0.
pub fn ifftshift<T: Copy + Default>(input: &ArrayView2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    roll(input, rows - rows / 2, cols - cols / 2)
}

fn roll<T: Copy + Default>(input: &ArrayView2<T>, shift_rows: usize, shift_cols: usize) -> Array2<T> {
    let (rows, cols) = input.dim();
    let mut out = Array2::<T>::default((rows, cols));
    if rows == 0 || cols == 0 {
        return out;
    }
    for ((r, c), &v) in input.indexed_iter() {
        out[[(r + shift_rows) % rows, (c + shift_cols) % cols]] = v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shift_roundtrip_odd() {
        let a = Array2::from_shape_fn((5, 3), |(r, c)| (r * 3 + c) as i32);
        assert_eq!(ifftshift(&fftshift(&a.view()).view()), a);
    }

    #[test]
    fn test_fftshift_moves_origin_to_center() {
        let mut a = Array2::<i32>::zeros((4, 4));
        a[[0, 0]] = 1;
        let shifted = fftshift(&a.view());
        assert_eq!(shifted[[2, 2]], 1);
    }

    #[test]
    fn test_centered_delta_gives_flat_spectrum() {
        let mut field = Array2::from_elem((8, 8), Complex64::new(0.0, 0.0));
        field[[4, 4]] = Complex64::new(1.0, 0.0);

        let spectrum = fft2_centered(&field.view());
        for v in spectrum.iter() {
            assert_relative_eq!(v.re, 1.0, epsilon = 1e-12);
            assert_relative_eq!(v.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_field_concentrates_at_center() {
        let field = Array2::from_elem((6, 6), Complex64::new(1.0, 0.0));
        let spectrum = fft2_centered(&field.view());
        assert_relative_eq!(spectrum[[3, 3]].re, 36.0, epsilon = 1e-9);
        let off_center: f64 = spectrum
            .indexed_iter()
            .filter(|((r, c), _)| (*r, *c) != (3, 3))
            .map(|(_, v)| v.norm())
            .sum();
        assert!(off_center < 1e-9);
    }
}
