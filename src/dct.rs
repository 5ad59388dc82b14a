//! 2D DCT-II / DCT-III facade used by the H1 resolvent's Helmholtz solve.
//!
//! Separable: a 1D DCT-II (forward) or DCT-III (inverse) plan is applied
//! along rows, then along columns, mirroring the row-then-column structure
//! of [`crate::fft::FftHandle`]. Built on `rustdct`, the DCT counterpart to
//! the `rustfft` FFT backbone the teacher crate already depends on.

use std::sync::Arc;

use rustdct::{Dct2, Dct3, DctPlanner};

use crate::array::Array2;
use crate::error::PlanError;

pub struct DctHandle {
    height: usize,
    width: usize,
    dct2_row: Arc<dyn Dct2<f32>>,
    dct3_row: Arc<dyn Dct3<f32>>,
    dct2_col: Arc<dyn Dct2<f32>>,
    dct3_col: Arc<dyn Dct3<f32>>,
}

impl DctHandle {
    pub fn new(height: usize, width: usize) -> Result<Self, PlanError> {
        if height == 0 || width == 0 {
            return Err(PlanError::DegenerateSize { width, height });
        }
        let mut planner = DctPlanner::<f32>::new();
        Ok(Self {
            height,
            width,
            dct2_row: planner.plan_dct2(width),
            dct3_row: planner.plan_dct3(width),
            dct2_col: planner.plan_dct2(height),
            dct3_col: planner.plan_dct3(height),
        })
    }

    /// Unnormalised separable 2D DCT-II: rows then columns.
    pub fn forward_2d(&self, input: &Array2) -> Array2 {
        debug_assert_eq!(input.shape(), (self.height, self.width));
        let mut out = input.clone();
        {
            let data = out.as_mut_slice();
            for row in data.chunks_exact_mut(self.width) {
                self.dct2_row.process_dct2(row);
            }
        }
        let mut col_buf = vec![0.0f32; self.height];
        for x in 0..self.width {
            for y in 0..self.height {
                col_buf[y] = out.as_slice()[y * self.width + x];
            }
            self.dct2_col.process_dct2(&mut col_buf);
            let data = out.as_mut_slice();
            for y in 0..self.height {
                data[y * self.width + x] = col_buf[y];
            }
        }
        out
    }

    /// Unnormalised separable 2D DCT-III (the un-normalised inverse of
    /// [`Self::forward_2d`] up to the caller's own `1/(4*H*W)` scaling).
    pub fn inverse_2d(&self, input: &Array2) -> Array2 {
        debug_assert_eq!(input.shape(), (self.height, self.width));
        let mut out = input.clone();
        let mut col_buf = vec![0.0f32; self.height];
        for x in 0..self.width {
            for y in 0..self.height {
                col_buf[y] = out.as_slice()[y * self.width + x];
            }
            self.dct3_col.process_dct3(&mut col_buf);
            let data = out.as_mut_slice();
            for y in 0..self.height {
                data[y * self.width + x] = col_buf[y];
            }
        }
        {
            let data = out.as_mut_slice();
            for row in data.chunks_exact_mut(self.width) {
                self.dct3_row.process_dct3(row);
            }
        }
        out
    }
}

/// Eigenvalues of the 2D discrete Laplacian with Neumann boundary conditions
/// under the DCT-II basis: `lambda[i][j] = (2*cos(pi*i/h) - 2) + (2*cos(pi*j/w) - 2)`.
///
/// This is the closed form of the two throwaway 1D DCTs of unit-difference
/// sequences computed in `original_source/src/resolvent.h::laplacian` —
/// equivalent numerically, simpler to express directly.
pub fn laplacian_eigenvalues(height: usize, width: usize) -> Array2 {
    let mut out = Array2::zeros(height, width);
    for i in 0..height {
        let ev_i = 2.0 * ((std::f64::consts::PI * i as f64 / height as f64).cos() as f32) - 2.0;
        for j in 0..width {
            let ev_j =
                2.0 * ((std::f64::consts::PI * j as f64 / width as f64).cos() as f32) - 2.0;
            out[(i, j)] = ev_i + ev_j;
        }
    }
    out
}
