//! Error taxonomy for the SMRE denoiser.
//!
//! Each concern (configuration, plan creation, backend execution, numerics,
//! the q-cache, Monte Carlo calibration) gets its own small `thiserror` enum;
//! [`SmreError`] composes them behind `#[from]`, the way
//! `EvolutionConfigError` wraps `ConfigError` in the teacher crate.

use thiserror::Error;

/// Configuration validation failures. Caller bugs; never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("image dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("kernel_sizes must be non-empty")]
    EmptyKernelSizes,
    #[error("kernel size {size} exceeds min(width, height) = {limit}")]
    KernelTooLarge { size: usize, limit: usize },
    #[error("kernel size must be non-zero")]
    ZeroKernelSize,
    #[error("tau must be positive, got {0}")]
    InvalidTau(f32),
    #[error("sigma must be positive, got {0}")]
    InvalidSigma(f32),
    #[error("max_steps must be at least 1")]
    InvalidMaxSteps,
    #[error("monte_carlo_steps must be at least 1")]
    InvalidMonteCarloSteps,
    #[error("tolerance must be non-negative, got {0}")]
    InvalidTolerance(f32),
    #[error("quantile must be in (0, 1), got {0}")]
    InvalidQuantile(f32),
    #[error("H1 resolvent delta must be in (0, 1], got {0}")]
    InvalidDelta(f32),
}

/// The chosen backend could not build an FFT/DCT plan for the requested size.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot build a transform plan for a degenerate size {width}x{height}")]
    DegenerateSize { width: usize, height: usize },
}

/// Runtime failure inside a convolution backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("prepared image/kernel shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("backend resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Non-finite value detected after a sub-step, or a degenerate numeric input.
#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("tau * delta must be non-zero for the H1 resolvent")]
    DegenerateHelmholtz,
    #[error("non-finite value detected in {step}")]
    NonFinite { step: &'static str },
}

/// Soft error: the q-cache could not be read or written. The caller logs and
/// recomputes; this is never surfaced as a hard failure from `run`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("q-cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("q-cache entry is corrupt or undecodable: {0}")]
    Corrupt(String),
}

/// Hard error: the Monte Carlo calibration's random or FFT subsystem failed.
#[derive(Debug, Error)]
pub enum MonteCarloError {
    #[error("monte_carlo_steps must be at least 1 to compute a quantile")]
    NoSamples,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Top-level error surface for the crate. Every variant carries a stable
/// string identifier via [`SmreError::code`] so callers can map to their own
/// error conventions without matching on the enum shape.
#[derive(Debug, Error)]
pub enum SmreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Numerical(#[from] NumericalError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    MonteCarlo(#[from] MonteCarloError),
}

impl SmreError {
    /// Stable identifier for this error kind, independent of the `Display`
    /// message, so wrappers in other languages can map it to their own
    /// error conventions.
    pub fn code(&self) -> &'static str {
        match self {
            SmreError::Config(_) => "invalid_parameter",
            SmreError::Plan(_) => "plan_creation_error",
            SmreError::Backend(_) => "backend_error",
            SmreError::Numerical(_) => "numerical_error",
            SmreError::Cache(_) => "cache_io_error",
            SmreError::MonteCarlo(_) => "monte_carlo_error",
        }
    }
}
