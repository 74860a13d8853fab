//! Common data types for the voxel-encode workspace

use serde::{Deserialize, Serialize};

/// Result of the stage-2 noise-covariance fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseFit {
    /// Fitted global noise correlation
    pub rho: f64,

    /// Fitted per-unit noise standard deviations
    pub sigma: Vec<f64>,

    /// Mean negative log-likelihood at the minimum
    pub nll: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of optimizer iterations
    pub n_iter: u64,

    /// Number of objective evaluations
    pub n_fev: usize,

    /// Number of gradient evaluations
    pub n_gev: usize,
}

impl NoiseFit {
    /// Number of units covered by this fit.
    pub fn n_units(&self) -> usize {
        self.sigma.len()
    }
}
