//! Run parameters for the SMRE denoiser.
//!
//! Modeled 1:1 on `schema/config.rs`'s `SimulationConfig`/`ConfigError` pair:
//! a plain serde-derived struct with a `validate()` that returns a
//! `thiserror` enum, checked once at `ChambollePockDriver::new` time rather
//! than scattered through the iteration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which resolvent the driver evaluates each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolventKind {
    L2,
    H1 { delta: f32 },
}

impl ResolventKind {
    /// Stable tag used in the q-cache's canonical key encoding (`spec.md` §6).
    pub(crate) fn cache_tag(&self) -> u8 {
        match self {
            ResolventKind::L2 => 0,
            ResolventKind::H1 { .. } => 1,
        }
    }

    /// The resolvent parameter folded into the cache key (`delta` for H1,
    /// `0.0` for l2 — l2 has no free parameter).
    pub(crate) fn cache_param(&self) -> f32 {
        match self {
            ResolventKind::L2 => 0.0,
            ResolventKind::H1 { delta } => *delta,
        }
    }
}

fn default_quantile() -> f32 {
    0.9
}

/// Immutable per-run configuration (`spec.md` §3 "Parameters", §6 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    pub width: usize,
    pub height: usize,
    pub kernel_sizes: Vec<usize>,
    pub tau: f32,
    pub sigma: f32,
    pub max_steps: usize,
    pub tolerance: f32,
    pub monte_carlo_steps: usize,
    #[serde(default)]
    pub penalized_scan: bool,
    #[serde(default = "default_use_fft")]
    pub use_fft: bool,
    #[serde(default)]
    pub input_stddev: Option<f32>,
    pub resolvent: ResolventKind,
    /// Monte Carlo quantile used to derive `q` (`spec.md` §9 Open Question;
    /// the source hard-codes 0.9 informally, so we expose it with that
    /// default).
    #[serde(default = "default_quantile")]
    pub quantile: f32,
    /// Path to the on-disk q-cache file. `None` disables the cache (every
    /// run recomputes `q` from scratch).
    #[serde(default)]
    pub cache_path: Option<std::path::PathBuf>,
}

fn default_use_fft() -> bool {
    true
}

impl Parameters {
    /// Check the invariants `spec.md` §6's table implies. Caller bugs; never
    /// retried by the driver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.kernel_sizes.is_empty() {
            return Err(ConfigError::EmptyKernelSizes);
        }
        let limit = self.width.min(self.height);
        for &h in &self.kernel_sizes {
            if h == 0 {
                return Err(ConfigError::ZeroKernelSize);
            }
            if h > limit {
                return Err(ConfigError::KernelTooLarge { size: h, limit });
            }
        }
        if self.tau <= 0.0 {
            return Err(ConfigError::InvalidTau(self.tau));
        }
        if self.sigma <= 0.0 {
            return Err(ConfigError::InvalidSigma(self.sigma));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::InvalidMaxSteps);
        }
        if self.monte_carlo_steps == 0 {
            return Err(ConfigError::InvalidMonteCarloSteps);
        }
        if self.tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if !(0.0 < self.quantile && self.quantile < 1.0) {
            return Err(ConfigError::InvalidQuantile(self.quantile));
        }
        if let ResolventKind::H1 { delta } = self.resolvent {
            if !(0.0 < delta && delta <= 1.0) {
                return Err(ConfigError::InvalidDelta(delta));
            }
        }
        Ok(())
    }

    /// Total-norm heuristic (`spec.md` §4.5 step 1, §9 Open Question):
    /// `sum(h_i^2 / 2)`, a deliberate upper bound rather than the exact
    /// operator norm of the stacked convolutions.
    pub fn total_norm(&self) -> f32 {
        self.kernel_sizes
            .iter()
            .map(|&h| (h * h) as f32 / 2.0)
            .sum()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            kernel_sizes: vec![3, 7, 15],
            tau: 0.25,
            sigma: 0.5,
            max_steps: 200,
            tolerance: 1e-4,
            monte_carlo_steps: 200,
            penalized_scan: false,
            use_fft: true,
            input_stddev: None,
            resolvent: ResolventKind::L2,
            quantile: default_quantile(),
            cache_path: None,
        }
    }
}
