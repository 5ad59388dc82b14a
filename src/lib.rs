//! smre - Statistical multiresolution image denoising under a convolution
//! constraint, solved with Chambolle-Pock primal-dual iteration.
//!
//! Given a noisy image `Y`, the denoiser finds the reconstruction `X` that
//! minimizes a regularizer `J(X)` subject to a family of box-kernel
//! convolution residuals `K_i * (Y - X)` staying under a data-driven
//! threshold `q_i`, calibrated by Monte Carlo simulation on white noise.
//!
//! # Architecture
//!
//! - `array`: dense row-major `Array2`/`ComplexArray2` with toroidal indexing
//! - `fft`, `dct`: transform plans backing the two convolution/resolvent
//!   strategies
//! - `kernel`: box-kernel mask construction
//! - `conv`: the FFT and summed-area-table convolution backends
//! - `resolvent`: the `l2` and `H1` proximal operators
//! - `qcache`: Monte Carlo threshold calibration with an on-disk cache
//! - `config`: run parameters and validation
//! - `driver`: the Chambolle-Pock iteration tying everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use smre::{Parameters, ChambollePockDriver, Array2};
//!
//! let params = Parameters::default();
//! let mut driver = ChambollePockDriver::new(params).unwrap();
//!
//! let noisy = Array2::zeros(256, 256);
//! let result = driver.run(&noisy).unwrap();
//!
//! println!("converged after {} steps", result.steps_taken);
//! ```

pub mod array;
pub mod config;
pub mod conv;
pub mod dct;
pub mod driver;
pub mod error;
pub mod fft;
pub mod kernel;
pub mod qcache;
pub mod resolvent;

pub use array::{Array2, ComplexArray2};
pub use config::{Parameters, ResolventKind};
pub use driver::{ChambollePockDriver, RunOutput};
pub use error::SmreError;
