//! Reference perfect-coronagraph simulator.
//!
//! An ideal coronagraph removes the projection of the pupil field onto the
//! unaberrated pupil. What reaches the focal plane is `E - <E>` over the
//! transmitting pixels, propagated with a zero-padded FFT.

use log::debug;
use ndarray::{s, Array2};
use rustfft::num_complex::Complex64;
use shared::image_proc::{crop_center, fft2_centered};

use crate::aperture::SegmentedAperture;
use crate::config::OpticsConfig;
use crate::error::ProbeError;
use crate::probe::DiffractionSimulator;
use crate::segments::hex::circumradius;
use crate::segments::mask::{pixel_to_position, render_indexed_mask};
use crate::zernike::ZernikeMode;

/// FFT-based perfect coronagraph on the rendered pupil.
#[derive(Debug, Clone)]
pub struct PerfectCoronagraph {
    /// Segment index + 1 for transmitting pixels, 0 elsewhere (obscured included)
    segments: Array2<u32>,
    /// Offset of each pixel from its segment center, normalized by the circumradius
    rho: Array2<f64>,
    theta: Array2<f64>,
    segment_count: usize,
    optics: OpticsConfig,
    fft_size: usize,
    image_size: usize,
    pixel_count: f64,
}

impl PerfectCoronagraph {
    pub fn new(aperture: &SegmentedAperture, optics: &OpticsConfig) -> Self {
        let config = aperture.config();
        let size = config.pupil_px;
        let dx = config.pixel_scale_m();
        let radius = circumradius(config.segment_flat_to_flat_m);
        let geometry = aperture.geometry();

        let mut segments = render_indexed_mask(config);
        if let Some(k) = config.obscured_segment {
            let blocked = k as u32 + 1;
            segments.mapv_inplace(|v| if v == blocked { 0 } else { v });
        }

        let offset = |r: usize, c: usize| {
            let k = segments[[r, c]];
            if k == 0 {
                return None;
            }
            let p = pixel_to_position(r as f64, c as f64, size, dx);
            Some(p - geometry.position(k as usize - 1))
        };
        let rho = Array2::from_shape_fn((size, size), |(r, c)| {
            offset(r, c).map(|d| d.norm() / radius).unwrap_or(0.0)
        });
        let theta = Array2::from_shape_fn((size, size), |(r, c)| {
            offset(r, c).map(|d| d.y.atan2(d.x)).unwrap_or(0.0)
        });

        let pixel_count = segments.iter().filter(|&&v| v != 0).count() as f64;
        let fft_size = optics.fft_size_px(size).max(size);
        let image_size = optics.image_size_px();
        debug!(
            "Perfect coronagraph: {} px pupil ({} transmitting), {} px FFT, {} px image",
            size, pixel_count, fft_size, image_size
        );

        Self {
            segments,
            rho,
            theta,
            segment_count: aperture.segment_count(),
            optics: optics.clone(),
            fft_size,
            image_size,
            pixel_count,
        }
    }

    /// Pupil phase in radians for an aberration of `mode`.
    pub fn phase_map(&self, aberration_nm: &[f64], mode: ZernikeMode) -> Array2<f64> {
        Array2::from_shape_fn(self.segments.dim(), |(r, c)| match self.segments[[r, c]] {
            0 => 0.0,
            k => {
                self.optics.nm_to_rad(aberration_nm[k as usize - 1])
                    * mode.evaluate(self.rho[[r, c]], self.theta[[r, c]])
            }
        })
    }
}

impl DiffractionSimulator for PerfectCoronagraph {
    fn segment_count(&self) -> usize {
        self.segment_count
    }

    fn dark_hole_image(
        &self,
        aberration_nm: &[f64],
        mode: ZernikeMode,
    ) -> Result<Array2<f64>, ProbeError> {
        if aberration_nm.len() != self.segment_count {
            return Err(ProbeError::Fatal(format!(
                "aberration has {} entries, pupil has {} segments",
                aberration_nm.len(),
                self.segment_count
            )));
        }

        let phase = self.phase_map(aberration_nm, mode);
        let mut field = Array2::from_shape_fn(phase.dim(), |(r, c)| {
            if self.segments[[r, c]] == 0 {
                Complex64::new(0.0, 0.0)
            } else {
                Complex64::from_polar(1.0, phase[[r, c]])
            }
        });

        let mean = field.sum() / self.pixel_count;
        field.zip_mut_with(&self.segments, |v, &k| {
            if k != 0 {
                *v -= mean;
            }
        });

        let size = field.nrows();
        let start = self.fft_size / 2 - size / 2;
        let mut padded = Array2::from_elem((self.fft_size, self.fft_size), Complex64::new(0.0, 0.0));
        padded
            .slice_mut(s![start..start + size, start..start + size])
            .assign(&field);

        let spectrum = fft2_centered(&padded.view());
        let cropped = crop_center(&spectrum.view(), self.image_size);
        let peak = self.pixel_count * self.pixel_count;
        Ok(cropped.mapv(|v| v.norm_sqr() / peak))
    }
}
