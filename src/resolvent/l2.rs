//! l2 resolvent: `J(u) = ||u||^2 / 2`, proximal step is plain pointwise
//! shrinkage towards the origin. `gamma = 1` (strongly convex with modulus
//! 1), matching `spec.md` §4.3.

use crate::array::Array2;
use crate::error::NumericalError;

use super::Resolvent;

pub struct L2Resolvent;

impl Resolvent for L2Resolvent {
    fn gamma(&self) -> f32 {
        1.0
    }

    fn evaluate(&self, tau: f32, u: &Array2, out: &mut Array2) -> Result<(), NumericalError> {
        let scale = 1.0 / (1.0 + tau);
        *out = Array2::from_vec(
            u.height,
            u.width,
            u.as_slice().iter().map(|&v| v * scale).collect(),
        );
        if !out.is_finite() {
            return Err(NumericalError::NonFinite { step: "l2_resolvent" });
        }
        Ok(())
    }
}
