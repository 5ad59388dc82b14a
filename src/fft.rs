//! Real-to-complex 2D FFT facade.
//!
//! Mirrors the row-then-column structure of the teacher crate's
//! `compute/fft.rs::FftConvolver`, but operates on the packed half-spectrum
//! (`W/2+1`) produced by a real-to-complex transform instead of a full
//! complex-to-complex one: `realfft` handles the row pass, `rustfft`'s plain
//! complex planner handles the column pass over the packed columns.
//!
//! The forward transform is unnormalised; [`FftHandle::inverse`] folds in
//! the `1/(H*W)` normalisation so a forward/inverse round trip recovers the
//! input.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::array::{Array2, ComplexArray2};
use crate::error::{BackendError, PlanError};

/// Cached forward/inverse plan pair for a fixed `(height, width)` shape.
///
/// Not `Sync`-shared across threads: each worker that needs to transform
/// concurrently should own (or clone the `Arc` fields of) its own handle and
/// supply its own scratch, per the crate's concurrency contract.
pub struct FftHandle {
    height: usize,
    width: usize,
    freq_width: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    col_fwd: Arc<dyn Fft<f32>>,
    col_inv: Arc<dyn Fft<f32>>,
}

impl FftHandle {
    pub fn new(height: usize, width: usize) -> Result<Self, PlanError> {
        if height == 0 || width == 0 {
            return Err(PlanError::DegenerateSize { width, height });
        }
        let mut real_planner = RealFftPlanner::<f32>::new();
        let r2c = real_planner.plan_fft_forward(width);
        let c2r = real_planner.plan_fft_inverse(width);

        let mut complex_planner = FftPlanner::<f32>::new();
        let col_fwd = complex_planner.plan_fft_forward(height);
        let col_inv = complex_planner.plan_fft_inverse(height);

        Ok(Self {
            height,
            width,
            freq_width: width / 2 + 1,
            r2c,
            c2r,
            col_fwd,
            col_inv,
        })
    }

    #[inline]
    pub fn freq_shape(&self) -> (usize, usize) {
        (self.height, self.freq_width)
    }

    /// Forward real-to-complex 2D FFT, unnormalised.
    pub fn forward(&self, image: &Array2) -> Result<ComplexArray2, BackendError> {
        if image.shape() != (self.height, self.width) {
            return Err(BackendError::ShapeMismatch {
                expected: (self.height, self.width),
                got: image.shape(),
            });
        }

        let mut out = ComplexArray2::zeros(self.height, self.freq_width);
        {
            let src = image.as_slice();
            let dst = out.as_mut_slice();
            for y in 0..self.height {
                let mut row_in = src[y * self.width..(y + 1) * self.width].to_vec();
                let row_out = &mut dst[y * self.freq_width..(y + 1) * self.freq_width];
                self.r2c
                    .process(&mut row_in, row_out)
                    .map_err(|e| BackendError::ResourceExhausted(e.to_string()))?;
            }
        }

        // Column pass: complex FFT of length `height` over each of the
        // `freq_width` packed columns.
        let mut col_buf = vec![Complex::new(0.0f32, 0.0); self.height];
        for x in 0..self.freq_width {
            for y in 0..self.height {
                col_buf[y] = out.as_slice()[y * self.freq_width + x];
            }
            self.col_fwd.process(&mut col_buf);
            let dst = out.as_mut_slice();
            for y in 0..self.height {
                dst[y * self.freq_width + x] = col_buf[y];
            }
        }

        Ok(out)
    }

    /// Inverse complex-to-real 2D FFT, normalised by `1/(H*W)`.
    pub fn inverse(&self, spectrum: &ComplexArray2) -> Result<Array2, BackendError> {
        if spectrum.shape() != (self.height, self.freq_width) {
            return Err(BackendError::ShapeMismatch {
                expected: (self.height, self.freq_width),
                got: spectrum.shape(),
            });
        }

        let mut work = spectrum.clone();

        // Column pass (inverse) first, undoing the forward column transform.
        let mut col_buf = vec![Complex::new(0.0f32, 0.0); self.height];
        for x in 0..self.freq_width {
            for y in 0..self.height {
                col_buf[y] = work.as_slice()[y * self.freq_width + x];
            }
            self.col_inv.process(&mut col_buf);
            let dst = work.as_mut_slice();
            for y in 0..self.height {
                dst[y * self.freq_width + x] = col_buf[y];
            }
        }

        let mut out = Array2::zeros(self.height, self.width);
        let scale = 1.0f32 / (self.height * self.width) as f32;
        {
            let dst = out.as_mut_slice();
            for y in 0..self.height {
                let mut row_in =
                    work.as_slice()[y * self.freq_width..(y + 1) * self.freq_width].to_vec();
                let row_out = &mut dst[y * self.width..(y + 1) * self.width];
                self.c2r
                    .process(&mut row_in, row_out)
                    .map_err(|e| BackendError::ResourceExhausted(e.to_string()))?;
                for v in row_out.iter_mut() {
                    *v *= scale;
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_input() {
        let height = 8;
        let width = 12;
        let handle = FftHandle::new(height, width).unwrap();
        let data: Vec<f32> = (0..height * width).map(|i| (i % 7) as f32 - 3.0).collect();
        let image = Array2::from_vec(height, width, data);

        let spectrum = handle.forward(&image).unwrap();
        let recovered = handle.inverse(&spectrum).unwrap();

        for (a, b) in image.as_slice().iter().zip(recovered.as_slice().iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn degenerate_size_is_rejected() {
        assert!(FftHandle::new(0, 8).is_err());
        assert!(FftHandle::new(8, 0).is_err());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let handle = FftHandle::new(4, 4).unwrap();
        let wrong = Array2::zeros(4, 5);
        assert!(handle.forward(&wrong).is_err());
    }
}
