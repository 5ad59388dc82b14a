//! Dense 2D array types with periodic (toroidal) indexing.
//!
//! `Array2` is the real-valued image/kernel type threaded through the
//! convolver and resolvent; `ComplexArray2` is its frequency-domain
//! counterpart, used with a packed half-width (`W/2+1`) when it holds the
//! result of a real-to-complex FFT.

use num_complex::Complex;
use std::ops::{Index, IndexMut};

/// Dense row-major 2D array of `f32`, indexed `[row = y][col = x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Array2 {
    data: Vec<f32>,
    pub height: usize,
    pub width: usize,
}

impl Array2 {
    /// Allocate a zero-filled array of the given shape.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: vec![0.0; height * width],
            height,
            width,
        }
    }

    /// Build an array from row-major data. Panics if `data.len() != height*width`.
    pub fn from_vec(height: usize, width: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), height * width, "shape/data length mismatch");
        Self { data, height, width }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Value at `(y, x)` wrapped onto the torus; accepts negative offsets.
    #[inline]
    pub fn get_wrapped(&self, y: i64, x: i64) -> f32 {
        let wy = y.rem_euclid(self.height as i64) as usize;
        let wx = x.rem_euclid(self.width as i64) as usize;
        self.data[wy * self.width + wx]
    }

    /// Return a new array equal to `self` shifted by `(dy, dx)` with
    /// toroidal wrap-around: `out[y][x] = self[(y-dy) mod H][(x-dx) mod W]`.
    pub fn shift(&self, dy: i64, dx: i64) -> Array2 {
        let mut out = Array2::zeros(self.height, self.width);
        for y in 0..self.height {
            for x in 0..self.width {
                out.data[y * self.width + x] =
                    self.get_wrapped(y as i64 - dy, x as i64 - dx);
            }
        }
        out
    }

    /// L1 norm: sum of absolute values.
    pub fn l1_norm(&self) -> f64 {
        self.data.iter().map(|&v| v.abs() as f64).sum()
    }

    /// L2 norm.
    pub fn l2_norm(&self) -> f64 {
        self.data.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>().sqrt()
    }

    /// Standard Euclidean inner product. Panics on shape mismatch.
    pub fn dot(&self, other: &Array2) -> f64 {
        assert_eq!(self.shape(), other.shape(), "dot: shape mismatch");
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum()
    }

    /// `self += alpha * other`, elementwise. Panics on shape mismatch.
    pub fn add_scaled(&mut self, other: &Array2, alpha: f32) {
        assert_eq!(self.shape(), other.shape(), "add_scaled: shape mismatch");
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += alpha * b;
        }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

impl Index<(usize, usize)> for Array2 {
    type Output = f32;
    #[inline]
    fn index(&self, (y, x): (usize, usize)) -> &f32 {
        &self.data[y * self.width + x]
    }
}

impl IndexMut<(usize, usize)> for Array2 {
    #[inline]
    fn index_mut(&mut self, (y, x): (usize, usize)) -> &mut f32 {
        &mut self.data[y * self.width + x]
    }
}

/// Dense row-major 2D array of `Complex<f32>`. When produced by a real FFT,
/// `width` is the packed half-spectrum width (`W/2+1`), not the spatial
/// width; `height` is always the spatial height.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexArray2 {
    data: Vec<Complex<f32>>,
    pub height: usize,
    pub width: usize,
}

impl ComplexArray2 {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: vec![Complex::new(0.0, 0.0); height * width],
            height,
            width,
        }
    }

    pub fn from_vec(height: usize, width: usize, data: Vec<Complex<f32>>) -> Self {
        assert_eq!(data.len(), height * width, "shape/data length mismatch");
        Self { data, height, width }
    }

    #[inline]
    pub fn as_slice(&self) -> &[Complex<f32>] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Complex<f32>] {
        &mut self.data
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Pointwise complex multiply into a new array. Panics on shape mismatch.
    pub fn mul_pointwise(&self, other: &ComplexArray2) -> ComplexArray2 {
        assert_eq!(self.shape(), other.shape(), "mul_pointwise: shape mismatch");
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a * b)
            .collect();
        ComplexArray2 {
            data,
            height: self.height,
            width: self.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_index_handles_negative_offsets() {
        let a = Array2::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.get_wrapped(-1, -1), 4.0);
        assert_eq!(a.get_wrapped(0, 0), 1.0);
        assert_eq!(a.get_wrapped(2, 2), 1.0);
    }

    #[test]
    fn shift_round_trips() {
        let a = Array2::from_vec(3, 3, (0..9).map(|i| i as f32).collect());
        let shifted = a.shift(1, 1);
        let back = shifted.shift(-1, -1);
        assert_eq!(a, back);
    }

    #[test]
    fn dot_matches_manual_sum() {
        let a = Array2::from_vec(1, 3, vec![1.0, 2.0, 3.0]);
        let b = Array2::from_vec(1, 3, vec![4.0, 5.0, 6.0]);
        assert_eq!(a.dot(&b), 1.0 * 4.0 + 2.0 * 5.0 + 3.0 * 6.0);
    }

    #[test]
    fn shift_is_periodic_under_full_cycle() {
        let a = Array2::from_vec(4, 4, (0..16).map(|i| i as f32).collect());
        let rolled = a.shift(4, 4);
        assert_eq!(a, rolled);
    }
}
