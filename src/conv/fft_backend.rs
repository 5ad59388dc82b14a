//! FFT-backed convolver.
//!
//! Preparing an image FFTs it; preparing a kernel builds the zero-padded
//! spatial box mask and FFTs that. `conv` multiplies the two spectra
//! pointwise and inverse-FFTs; [`crate::fft::FftHandle::inverse`] supplies
//! the single `1/(H*W)` normalisation the periodic-convolution theorem
//! needs, so neither side of this module has to track it separately.
//! Grounded in `original_source/src/convolution.h::cpu_fft_convolver`,
//! which instead folds that factor into the kernel because its own inverse
//! FFT plan is unnormalised (FFTW convention).

use crate::array::Array2;
use crate::error::BackendError;
use crate::fft::FftHandle;
use crate::kernel::build_box_mask;

use super::{Convolver, PreparedImage, PreparedKernel};

pub struct FftConvolver {
    height: usize,
    width: usize,
    fft: FftHandle,
}

impl FftConvolver {
    pub fn new(height: usize, width: usize) -> Result<Self, crate::error::PlanError> {
        Ok(Self {
            height,
            width,
            fft: FftHandle::new(height, width)?,
        })
    }
}

impl Convolver for FftConvolver {
    fn prepare_image(&self, image: &Array2) -> Result<PreparedImage, BackendError> {
        Ok(PreparedImage::Fft(self.fft.forward(image)?))
    }

    fn prepare_kernel(&self, h: usize, adjoint: bool) -> Result<PreparedKernel, BackendError> {
        let mask = build_box_mask(self.height, self.width, h, adjoint);
        Ok(PreparedKernel::Fft(self.fft.forward(&mask)?))
    }

    fn conv(
        &self,
        image: &PreparedImage,
        kernel: &PreparedKernel,
        out: &mut Array2,
    ) -> Result<(), BackendError> {
        let (PreparedImage::Fft(fi), PreparedKernel::Fft(fk)) = (image, kernel) else {
            return Err(BackendError::ShapeMismatch {
                expected: (self.height, self.width),
                got: (0, 0),
            });
        };
        let product = fi.mul_pointwise(fk);
        *out = self.fft.inverse(&product)?;
        Ok(())
    }
}
