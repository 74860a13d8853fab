//! # ve-encode
//!
//! Two-stage voxel encoding model estimation.
//!
//! Stage 1 maps stimulus orientation through a fixed raised-cosine tuning
//! basis and estimates per-unit linear weights by ordinary least squares.
//! Stage 2 fits a parametric noise covariance (global correlation rho,
//! per-unit scales sigma) by maximum likelihood over the stage-1 residuals.
//! The fitted model predicts deterministic mean responses and simulates
//! correlated noisy responses.
//!
//! The core is single-threaded and synchronous; all errors propagate to the
//! caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Stage-1 linear response model (OLS weight estimation, prediction).
pub mod linear;
/// Stage-2 noise-covariance maximum likelihood estimation.
pub mod mle;
/// Composite two-stage encoding model.
pub mod model;
/// Parametric noise covariance and Gaussian likelihood objective.
pub mod noise;
/// Generic bounded numerical optimizer (L-BFGS backend).
pub mod optimizer;
/// Seeded multivariate-normal response sampling.
pub mod sample;
/// Orientation tuning basis functions.
pub mod tuning;

pub use linear::LinearResponseModel;
pub use mle::NoiseMleEstimator;
pub use model::{DEFAULT_N_BASIS, EncodeModel};
pub use noise::{NoiseModel, NoiseParams, covariance, neg_log_likelihood, objective};
pub use optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use sample::sample_responses;
pub use tuning::{preference_vector, tuning};
