//! Stage-2 maximum-likelihood estimation of the noise parameters.
//!
//! Fits (rho, sigma) by minimizing the mean per-trial negative
//! log-likelihood under the stage-1 mean predictions, using the bounded
//! L-BFGS optimizer with central-difference gradients.

use nalgebra::{DMatrix, DVector};
use ve_core::{Error, NoiseFit, Result};

use crate::linear::LinearResponseModel;
use crate::noise::{covariance, rho_lower_bound};
use crate::optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizerConfig};

/// Margin keeping the (rho, sigma) search strictly inside the region where
/// the covariance is positive-definite, so every objective evaluation the
/// optimizer makes is finite.
const BOUND_MARGIN: f64 = 1e-6;

/// Noise-covariance maximum likelihood estimator.
///
/// Searches rho over the valid correlation range and sigma over the positive
/// reals for the pair minimizing the Gaussian NLL objective. The mean term
/// comes from an already-fit [`LinearResponseModel`].
#[derive(Clone, Default)]
pub struct NoiseMleEstimator {
    config: OptimizerConfig,
}

/// Objective over params = [rho, sigma_1..sigma_V].
///
/// The stage-1 residuals do not depend on (rho, sigma), so they are computed
/// once up front; each evaluation only rebuilds and factors the V x V
/// covariance.
struct NoiseObjective {
    residuals: DMatrix<f64>,
}

impl ObjectiveFunction for NoiseObjective {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        let rho = params[0];
        let sigma = DVector::from_column_slice(&params[1..]);
        let cov = covariance(rho, &sigma)?;

        let chol = cov
            .cholesky()
            .ok_or_else(|| Error::Computation("covariance is not positive-definite".to_string()))?;
        let l = chol.l_dirty();
        let logdet: f64 = (0..l.nrows()).map(|i| 2.0 * l[(i, i)].ln()).sum();

        let n = self.residuals.ncols();
        let mut total = 0.0;
        for idx in 0..n {
            let r = self.residuals.column(idx).into_owned();
            let solved = chol.solve(&r);
            total += logdet + r.dot(&solved);
        }
        Ok(total / n as f64)
    }
}

impl NoiseMleEstimator {
    /// Create an estimator with the default optimizer configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with a custom optimizer configuration.
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Access the optimizer configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fit (rho, sigma) to observed responses.
    ///
    /// Requires the linear model's weights: the mean responses are its
    /// predictions for `stim`. Initialization is rho = 0 and the per-unit
    /// residual standard deviations of the stage-1 fit.
    pub fn fit(
        &self,
        linear: &LinearResponseModel,
        stim: &[f64],
        responses: &DMatrix<f64>,
    ) -> Result<NoiseFit> {
        let mean = linear.predict(stim)?;
        let v = responses.nrows();
        if mean.nrows() != v {
            return Err(Error::Validation(format!(
                "response matrix has {} units, model predicts {}",
                v,
                mean.nrows()
            )));
        }
        if responses.ncols() != stim.len() {
            return Err(Error::Validation(format!(
                "response matrix has {} trial columns, stimulus has {} trials",
                responses.ncols(),
                stim.len()
            )));
        }
        let n = stim.len();
        if n < 2 {
            return Err(Error::Validation(
                "need at least 2 trials to estimate noise variance".to_string(),
            ));
        }

        let residuals = responses - mean;

        // Per-unit residual standard deviation as the sigma starting point.
        let mut init = Vec::with_capacity(1 + v);
        init.push(0.0);
        for i in 0..v {
            let ss: f64 = residuals.row(i).iter().map(|&r| r * r).sum();
            init.push((ss / (n - 1) as f64).sqrt().max(BOUND_MARGIN));
        }

        let mut bounds = Vec::with_capacity(1 + v);
        bounds.push((rho_lower_bound(v) + BOUND_MARGIN, 1.0 - BOUND_MARGIN));
        bounds.extend(std::iter::repeat((BOUND_MARGIN, f64::INFINITY)).take(v));

        log::debug!("noise MLE: {} units, {} trials, init sigma from residuals", v, n);

        let objective = NoiseObjective { residuals };
        let optimizer = LbfgsbOptimizer::new(self.config.clone());
        let result = optimizer.minimize(&objective, &init, &bounds)?;

        if !result.converged {
            log::warn!("noise MLE did not converge: {}", result.message);
        }

        Ok(NoiseFit {
            rho: result.parameters[0],
            sigma: result.parameters[1..].to_vec(),
            nll: result.fval,
            converged: result.converged,
            n_iter: result.n_iter,
            n_fev: result.n_fev,
            n_gev: result.n_gev,
        })
    }
}
