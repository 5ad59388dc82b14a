//! Box kernel generation shared by both convolution backends.
//!
//! A box kernel of linear size `h` is a scaled binary mask; the FFT backend
//! needs its spatial-domain representation (zero-padded to the image shape,
//! wrapped to a corner) before it can transform it, while the SAT backend
//! only ever needs the descriptor `(h, is_adjoint)`. This module builds the
//! spatial mask; `src/conv/sat_backend.rs` consumes the descriptor directly.

use crate::array::Array2;

/// `1 / (sqrt(2) * h)`, the scale applied to every box kernel regardless of
/// backend (see `spec.md` section 4.2).
#[inline]
pub fn box_scale(h: usize) -> f32 {
    1.0 / (std::f32::consts::SQRT_2 * h as f32)
}

/// Build the zero-padded spatial-domain box mask for a kernel of size `h`
/// on an image of shape `(height, width)`.
///
/// - `adjoint = false` (forward kernel): the box is placed so the kernel's
///   center maps to the array's corner, i.e. entries at
///   `{(-i) mod H, (-j) mod W}` for `i, j in 0..h`.
/// - `adjoint = true`: the unreflected top-left box at `{0..h, 0..h}`.
///
/// Grounded in `original_source/src/convolution.h`'s
/// `cpu_fft_convolver::prepare_kernel`.
pub fn build_box_mask(height: usize, width: usize, h: usize, adjoint: bool) -> Array2 {
    let mut mask = Array2::zeros(height, width);
    let v = box_scale(h);
    for i0 in 0..h {
        for i1 in 0..h {
            if adjoint {
                mask[(i0, i1)] = v;
            } else {
                let y = (height - i0) % height;
                let x = (width - i1) % width;
                mask[(y, x)] = v;
            }
        }
    }
    mask
}
