//! Matrix Fourier transform for arbitrary focal-plane sampling.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2};
use rustfft::num_complex::Complex64;

/// Fourier transform of a pupil field onto an `npix`×`npix` focal grid.
///
/// Computes `E(v, u) = Σ_y Σ_x P(y, x)·exp(-2πi (x·f_u + y·f_v))` as two dense
/// matrix products, with pupil pixel centers at `(i + 0.5 - n/2)·pixel_scale`
/// and frequencies `f_u = (u - npix/2)·freq_step`.
///
/// # Arguments
/// * `pupil` - Complex pupil field, row index along y
/// * `pixel_scale` - Pupil pixel size in meters
/// * `freq_step` - Focal-plane sampling in cycles per meter
/// * `npix` - Output grid width in pixels
pub fn matrix_fourier_transform(
    pupil: &ArrayView2<Complex64>,
    pixel_scale: f64,
    freq_step: f64,
    npix: usize,
) -> Array2<Complex64> {
    let (rows, cols) = pupil.dim();
    let by = kernel(rows, pixel_scale, freq_step, npix);
    let bx = kernel(cols, pixel_scale, freq_step, npix);

    by.dot(pupil).dot(&bx.t())
}

/// `npix`×`n` matrix of `exp(-2πi x_k f_u)`.
fn kernel(n: usize, pixel_scale: f64, freq_step: f64, npix: usize) -> Array2<Complex64> {
    let half_in = n as f64 / 2.0;
    let half_out = (npix / 2) as f64;
    Array2::from_shape_fn((npix, n), |(u, k)| {
        let x = (k as f64 + 0.5 - half_in) * pixel_scale;
        let f = (u as f64 - half_out) * freq_step;
        Complex64::from_polar(1.0, -2.0 * PI * x * f)
    })
}
