//! Summed-area-table convolver for a toroidal (periodic) domain.
//!
//! Preparing an image builds a running-sum table; preparing a kernel is
//! free (just the `(h, adjoint)` descriptor, since box sums are read
//! directly off the table). `conv` evaluates a box sum per output pixel via
//! inclusion-exclusion, with wrap-around correction terms for boxes that
//! cross the bottom or right edge of the torus. Grounded in
//! `original_source/src/convolution.h::cpu_sat_convolver`.

use crate::array::Array2;
use crate::error::BackendError;
use crate::kernel::box_scale;

use super::{Convolver, PreparedImage, PreparedKernel};

pub struct SatConvolver {
    height: usize,
    width: usize,
}

impl SatConvolver {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

/// Toroidal box sum over `sat`, the closed rectangle from corner
/// `(i0, i1)` down-and-right-wrapping to corner `(j0, j1)` inclusive.
///
/// `sat[y][x]` is the running sum `sum_{y'<=y, x'<=x} image[y'][x']`
/// (ordinary top-left-origin prefix sum, no wrap baked into the table
/// itself). The wrap is handled here, by adding back the rows/columns that
/// fall off the bottom or right edge, exactly as in
/// `cpu_sat_convolver::box_sum`.
fn box_sum(sat: &Array2, height: usize, width: usize, i0: usize, i1: usize, j0: usize, j1: usize) -> f32 {
    let mut sum = sat[(i0, i1)] - sat[(i0, j1)] - sat[(j0, i1)] + sat[(j0, j1)];
    if i0 > j0 {
        sum += sat[(height - 1, j1)] - sat[(height - 1, i1)];
    }
    if i1 > j1 {
        sum += sat[(j0, width - 1)] - sat[(i0, width - 1)];
        if i0 > j0 {
            sum += sat[(height - 1, width - 1)];
        }
    }
    sum
}

impl Convolver for SatConvolver {
    fn prepare_image(&self, image: &Array2) -> Result<PreparedImage, BackendError> {
        if image.shape() != (self.height, self.width) {
            return Err(BackendError::ShapeMismatch {
                expected: (self.height, self.width),
                got: image.shape(),
            });
        }
        let mut sat = Array2::zeros(self.height, self.width);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut v = image[(y, x)];
                if y > 0 {
                    v += sat[(y - 1, x)];
                }
                if x > 0 {
                    v += sat[(y, x - 1)];
                }
                if y > 0 && x > 0 {
                    v -= sat[(y - 1, x - 1)];
                }
                sat[(y, x)] = v;
            }
        }
        Ok(PreparedImage::Sat(sat))
    }

    fn prepare_kernel(&self, h: usize, adjoint: bool) -> Result<PreparedKernel, BackendError> {
        Ok(PreparedKernel::Sat { h, adjoint })
    }

    fn conv(
        &self,
        image: &PreparedImage,
        kernel: &PreparedKernel,
        out: &mut Array2,
    ) -> Result<(), BackendError> {
        let (PreparedImage::Sat(sat), PreparedKernel::Sat { h, adjoint }) = (image, kernel) else {
            return Err(BackendError::ShapeMismatch {
                expected: (self.height, self.width),
                got: (0, 0),
            });
        };
        let (height, width) = (self.height, self.width);
        let v = box_scale(*h);

        *out = Array2::zeros(height, width);
        for i0 in 0..height {
            for i1 in 0..width {
                let (j0, j1) = if *adjoint {
                    ((i0 + height - h) % height, (i1 + width - h) % width)
                } else {
                    ((i0 + height - 1) % height, (i1 + width - 1) % width)
                };
                let (lo0, lo1, hi0, hi1) = if *adjoint {
                    (j0, j1, i0, i1)
                } else {
                    let hi0 = (i0 + h - 1) % height;
                    let hi1 = (i1 + h - 1) % width;
                    (j0, j1, hi0, hi1)
                };
                out[(i0, i1)] = v * box_sum(sat, height, width, lo0, lo1, hi0, hi1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_convolved_with_adjoint_box_recovers_scaled_box() {
        let (height, width) = (16, 16);
        let conv = SatConvolver::new(height, width);
        let mut impulse = Array2::zeros(height, width);
        impulse[(0, 0)] = 1.0;

        let k = conv.prepare_kernel(3, true).unwrap();
        let prepared = conv.prepare_image(&impulse).unwrap();
        let mut out = Array2::zeros(height, width);
        conv.conv(&prepared, &k, &mut out).unwrap();

        let expected = box_scale(3);
        for y in 0..3 {
            for x in 0..3 {
                assert!((out[(y, x)] - expected).abs() < 1e-5);
            }
        }
        assert!(out[(5, 5)].abs() < 1e-6);
    }

    #[test]
    fn box_sum_wraps_across_bottom_and_right_edge() {
        let (height, width) = (8, 8);
        let conv = SatConvolver::new(height, width);
        // Impulse at the bottom-right corner; a forward box kernel centered
        // there must wrap onto the top-left of the torus.
        let mut impulse = Array2::zeros(height, width);
        impulse[(height - 1, width - 1)] = 1.0;

        let k = conv.prepare_kernel(3, false).unwrap();
        let prepared = conv.prepare_image(&impulse).unwrap();
        let mut out = Array2::zeros(height, width);
        conv.conv(&prepared, &k, &mut out).unwrap();

        // Forward kernel of size 3 centered (wrapped) at the impulse covers
        // output pixels {height-1, 0, 1} x {width-1, 0, 1}.
        let expected = box_scale(3);
        for &y in &[height - 1, 0, 1] {
            for &x in &[width - 1, 0, 1] {
                assert!((out[(y, x)] - expected).abs() < 1e-5, "({}, {}) = {}", y, x, out[(y, x)]);
            }
        }
        assert!(out[(3, 3)].abs() < 1e-6);
    }

    #[test]
    fn uniform_image_box_sum_matches_area() {
        let (height, width) = (10, 10);
        let conv = SatConvolver::new(height, width);
        let image = Array2::from_vec(height, width, vec![1.0; height * width]);
        let k = conv.prepare_kernel(4, true).unwrap();
        let prepared = conv.prepare_image(&image).unwrap();
        let mut out = Array2::zeros(height, width);
        conv.conv(&prepared, &k, &mut out).unwrap();

        let expected = box_scale(4) * (4 * 4) as f32;
        for v in out.as_slice() {
            assert!((v - expected).abs() < 1e-4);
        }
    }
}
