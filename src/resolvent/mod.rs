//! Resolvent operators `(id + tau * dJ)^-1`, the primal proximal step of the
//! Chambolle-Pock iteration.
//!
//! Two variants per `spec.md` §4.3: `l2` pointwise shrinkage and `H1`
//! Helmholtz solve (DCT-based). Both share one capability contract so the
//! driver owns only the abstract handle, the same polymorphic-backend shape
//! as `crate::conv`.

mod h1;
mod l2;

pub use h1::H1Resolvent;
pub use l2::L2Resolvent;

use crate::array::Array2;
use crate::config::ResolventKind;
use crate::error::{NumericalError, PlanError};

/// Capability contract: evaluate the resolvent at scale `tau`, plus the
/// strong-convexity modulus `gamma` the Chambolle-Pock acceleration schedule
/// is derived from (`spec.md` §4.5 step 2.5: `theta = 1/sqrt(1 + 2*tau*gamma)`).
pub trait Resolvent {
    fn gamma(&self) -> f32;
    fn evaluate(&self, tau: f32, u: &Array2, out: &mut Array2) -> Result<(), NumericalError>;
}

/// Runtime-selected resolvent, dispatching to whichever concrete
/// implementation the driver was configured with.
pub enum ResolventImpl {
    L2(L2Resolvent),
    H1(H1Resolvent),
}

impl ResolventImpl {
    pub fn new(kind: ResolventKind, height: usize, width: usize) -> Result<Self, PlanError> {
        Ok(match kind {
            ResolventKind::L2 => ResolventImpl::L2(L2Resolvent),
            ResolventKind::H1 { delta } => {
                ResolventImpl::H1(H1Resolvent::new(height, width, delta)?)
            }
        })
    }
}

impl Resolvent for ResolventImpl {
    fn gamma(&self) -> f32 {
        match self {
            ResolventImpl::L2(r) => r.gamma(),
            ResolventImpl::H1(r) => r.gamma(),
        }
    }

    fn evaluate(&self, tau: f32, u: &Array2, out: &mut Array2) -> Result<(), NumericalError> {
        match self {
            ResolventImpl::L2(r) => r.evaluate(tau, u, out),
            ResolventImpl::H1(r) => r.evaluate(tau, u, out),
        }
    }
}
