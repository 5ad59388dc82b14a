//! H1 resolvent: `J_delta(u) = (delta/2)*||grad u||^2 + ((1-delta)/2)*||u||^2`,
//! `delta` in `(0, 1]`. The proximal step solves the Helmholtz problem
//! `Delta v - alpha*v = -u/(tau*delta)` with Neumann boundary conditions via
//! the 2D DCT-II/DCT-III pair in [`crate::dct`], exactly as
//! `original_source/src/resolvent.h`'s `h1_resolvent` does, but with the
//! Laplacian eigenvalues computed in closed form rather than via two
//! throwaway 1D DCTs (`spec.md` §9 Open Question).

use crate::array::Array2;
use crate::dct::{DctHandle, laplacian_eigenvalues};
use crate::error::{NumericalError, PlanError};

use super::Resolvent;

pub struct H1Resolvent {
    height: usize,
    width: usize,
    delta: f32,
    dct: DctHandle,
    eigenvalues: Array2,
}

impl H1Resolvent {
    pub fn new(height: usize, width: usize, delta: f32) -> Result<Self, PlanError> {
        let dct = DctHandle::new(height, width)?;
        let eigenvalues = laplacian_eigenvalues(height, width);
        Ok(Self {
            height,
            width,
            delta,
            dct,
            eigenvalues,
        })
    }
}

impl Resolvent for H1Resolvent {
    fn gamma(&self) -> f32 {
        1.0 - self.delta
    }

    fn evaluate(&self, tau: f32, u: &Array2, out: &mut Array2) -> Result<(), NumericalError> {
        let tau_delta = tau * self.delta;
        if tau_delta == 0.0 {
            return Err(NumericalError::DegenerateHelmholtz);
        }
        let alpha = (1.0 + tau * (1.0 - self.delta)) / tau_delta;

        let spectrum = self.dct.forward_2d(u);
        let norm = 1.0 / (4.0 * self.height as f32 * self.width as f32 * tau_delta);

        let mut scaled = Array2::zeros(self.height, self.width);
        for i in 0..self.height {
            for j in 0..self.width {
                let denom = alpha - self.eigenvalues[(i, j)];
                scaled[(i, j)] = spectrum[(i, j)] * norm / denom;
            }
        }

        *out = self.dct.inverse_2d(&scaled);
        if !out.is_finite() {
            return Err(NumericalError::NonFinite {
                step: "h1_resolvent",
            });
        }
        Ok(())
    }
}
