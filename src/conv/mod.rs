//! Convolver abstraction: apply a box kernel (or its adjoint) to an image,
//! behind two interchangeable backends.
//!
//! Modeled on the teacher crate's `CachedConvolver` (precomputed
//! frequency-domain kernels, `conv`/`conv_with_kernel` split) in
//! `compute/fft.rs`, generalized to the two backends `spec.md` section 4.2
//! requires and grounded numerically in
//! `original_source/src/convolution.h`.

mod fft_backend;
mod sat_backend;

pub use fft_backend::FftConvolver;
pub use sat_backend::SatConvolver;

use crate::array::{Array2, ComplexArray2};
use crate::error::BackendError;

/// Backend-private, immutable-after-preparation handle for a transformed
/// image. The driver never inspects the variant; it only threads it back
/// into `Convolver::conv`.
#[derive(Clone)]
pub enum PreparedImage {
    Fft(ComplexArray2),
    Sat(Array2),
}

/// Backend-private handle for a prepared kernel (forward or adjoint).
#[derive(Clone)]
pub enum PreparedKernel {
    Fft(ComplexArray2),
    Sat { h: usize, adjoint: bool },
}

/// Capability contract both backends implement.
pub trait Convolver {
    fn prepare_image(&self, image: &Array2) -> Result<PreparedImage, BackendError>;
    fn prepare_kernel(&self, h: usize, adjoint: bool) -> Result<PreparedKernel, BackendError>;
    fn conv(
        &self,
        image: &PreparedImage,
        kernel: &PreparedKernel,
        out: &mut Array2,
    ) -> Result<(), BackendError>;
}

/// Runtime-selected backend, dispatching to whichever concrete convolver the
/// driver was configured with.
pub enum ConvBackend {
    Fft(FftConvolver),
    Sat(SatConvolver),
}

impl ConvBackend {
    pub fn new(height: usize, width: usize, use_fft: bool) -> Result<Self, crate::error::PlanError> {
        if use_fft {
            Ok(ConvBackend::Fft(FftConvolver::new(height, width)?))
        } else {
            Ok(ConvBackend::Sat(SatConvolver::new(height, width)))
        }
    }
}

impl Convolver for ConvBackend {
    fn prepare_image(&self, image: &Array2) -> Result<PreparedImage, BackendError> {
        match self {
            ConvBackend::Fft(c) => c.prepare_image(image),
            ConvBackend::Sat(c) => c.prepare_image(image),
        }
    }

    fn prepare_kernel(&self, h: usize, adjoint: bool) -> Result<PreparedKernel, BackendError> {
        match self {
            ConvBackend::Fft(c) => c.prepare_kernel(h, adjoint),
            ConvBackend::Sat(c) => c.prepare_kernel(h, adjoint),
        }
    }

    fn conv(
        &self,
        image: &PreparedImage,
        kernel: &PreparedKernel,
        out: &mut Array2,
    ) -> Result<(), BackendError> {
        match self {
            ConvBackend::Fft(c) => c.conv(image, kernel, out),
            ConvBackend::Sat(c) => c.conv(image, kernel, out),
        }
    }
}

#[cfg(test)]
mod adjoint_tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_array(height: usize, width: usize, rng: &mut StdRng) -> Array2 {
        let data = (0..height * width)
            .map(|_| rng.gen_range(-0.5f32..0.5))
            .collect();
        Array2::from_vec(height, width, data)
    }

    /// Adjoint identity: <Conv(x, K_h), y> == <x, Conv(y, K*_h)> up to
    /// tolerance, for both backends. `spec.md` section 8, property 1.
    fn check_adjoint_identity(backend: &ConvBackend, h: usize, tol: f64) {
        let (height, width) = (16, 16);
        let mut rng = StdRng::seed_from_u64(42 + h as u64);
        let x = random_array(height, width, &mut rng);
        let y = random_array(height, width, &mut rng);

        let k = backend.prepare_kernel(h, false).unwrap();
        let adj_k = backend.prepare_kernel(h, true).unwrap();

        let px = backend.prepare_image(&x).unwrap();
        let mut kx = Array2::zeros(height, width);
        backend.conv(&px, &k, &mut kx).unwrap();

        let py = backend.prepare_image(&y).unwrap();
        let mut adj_ky = Array2::zeros(height, width);
        backend.conv(&py, &adj_k, &mut adj_ky).unwrap();

        let lhs = kx.dot(&y);
        let rhs = x.dot(&adj_ky);
        let scale = x.l2_norm() * y.l2_norm();
        assert!(
            (lhs - rhs).abs() <= tol * scale.max(1.0),
            "adjoint identity violated for h={}: {} vs {}",
            h,
            lhs,
            rhs
        );
    }

    #[test]
    fn fft_backend_adjoint_identity() {
        let backend = ConvBackend::new(16, 16, true).unwrap();
        for h in [2, 8] {
            check_adjoint_identity(&backend, h, 1e-4);
        }
    }

    #[test]
    fn sat_backend_adjoint_identity() {
        let backend = ConvBackend::new(16, 16, false).unwrap();
        for h in [2, 8] {
            check_adjoint_identity(&backend, h, 1e-5);
        }
    }

    #[test]
    fn backends_agree_within_tolerance() {
        let (height, width) = (32, 32);
        let mut rng = StdRng::seed_from_u64(7);
        let x = random_array(height, width, &mut rng);

        let fft = ConvBackend::new(height, width, true).unwrap();
        let sat = ConvBackend::new(height, width, false).unwrap();

        for h in [3, 11] {
            let k_fft = fft.prepare_kernel(h, false).unwrap();
            let px_fft = fft.prepare_image(&x).unwrap();
            let mut out_fft = Array2::zeros(height, width);
            fft.conv(&px_fft, &k_fft, &mut out_fft).unwrap();

            let k_sat = sat.prepare_kernel(h, false).unwrap();
            let px_sat = sat.prepare_image(&x).unwrap();
            let mut out_sat = Array2::zeros(height, width);
            sat.conv(&px_sat, &k_sat, &mut out_sat).unwrap();

            let diff: f64 = out_fft
                .as_slice()
                .iter()
                .zip(out_sat.as_slice().iter())
                .map(|(&a, &b)| ((a - b) as f64).powi(2))
                .sum::<f64>()
                .sqrt();
            let norm = out_fft.l2_norm().max(1e-12);
            assert!(diff / norm < 1e-3, "backend disagreement at h={}: {}", h, diff / norm);
        }
    }

    #[test]
    fn shift_equivariance_holds_on_torus() {
        let (height, width) = (16, 16);
        let mut rng = StdRng::seed_from_u64(3);
        let x = random_array(height, width, &mut rng);
        let shifted = x.shift(3, 2);

        let backend = ConvBackend::new(height, width, true).unwrap();
        let k = backend.prepare_kernel(5, false).unwrap();

        let mut conv_x = Array2::zeros(height, width);
        backend.conv(&backend.prepare_image(&x).unwrap(), &k, &mut conv_x).unwrap();
        let conv_x_shifted = conv_x.shift(3, 2);

        let mut conv_shifted = Array2::zeros(height, width);
        backend
            .conv(&backend.prepare_image(&shifted).unwrap(), &k, &mut conv_shifted)
            .unwrap();

        for (a, b) in conv_x_shifted.as_slice().iter().zip(conv_shifted.as_slice().iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }
}
