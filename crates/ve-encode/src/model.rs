//! Composite two-stage encoding model.
//!
//! Wires the linear response component and the noise covariance component
//! into the full workflow: stage-1 OLS weights, stage-2 MLE noise
//! parameters, deterministic prediction, and stochastic simulation. A plain
//! value object: constructed once per unit set, mutated in place by the two
//! fit operations, read by predict/simulate afterwards.

use nalgebra::{DMatrix, DVector};
use ve_core::{NoiseFit, Result};

use crate::linear::LinearResponseModel;
use crate::mle::NoiseMleEstimator;
use crate::noise::NoiseModel;
use crate::sample::sample_responses;

/// Default number of tuning basis functions.
pub const DEFAULT_N_BASIS: usize = 8;

/// Voxel encoding model: linear tuning weights plus correlated Gaussian
/// noise.
#[derive(Debug, Clone)]
pub struct EncodeModel {
    linear: LinearResponseModel,
    noise: NoiseModel,
}

impl EncodeModel {
    /// Create a model with `n_basis` tuning channels; nothing is fitted yet.
    pub fn new(n_basis: usize) -> Result<Self> {
        Ok(Self { linear: LinearResponseModel::new(n_basis)?, noise: NoiseModel::new() })
    }

    /// Create a model with the default basis count.
    pub fn with_default_basis() -> Self {
        Self::new(DEFAULT_N_BASIS).expect("default basis count is valid")
    }

    /// Linear response component.
    pub fn linear(&self) -> &LinearResponseModel {
        &self.linear
    }

    /// Noise covariance component.
    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    /// Override the weight matrix (K x V), e.g. to simulate from known
    /// weights.
    pub fn set_weights(&mut self, beta: DMatrix<f64>) -> Result<()> {
        self.linear.set_beta(beta)
    }

    /// Set (rho, sigma) directly and rebuild the covariance matrix.
    pub fn set_noise(&mut self, rho: f64, sigma: DVector<f64>) -> Result<()> {
        self.noise.set_params(rho, sigma)
    }

    /// Stage 1: estimate tuning weights by ordinary least squares.
    pub fn fit_tuning(
        &mut self,
        stim: &[f64],
        responses: &DMatrix<f64>,
    ) -> Result<&DMatrix<f64>> {
        self.linear.fit(stim, responses)
    }

    /// Stage 2: estimate (rho, sigma) by maximum likelihood.
    ///
    /// Consumes the stage-1 weights as the mean function; fails if stage 1
    /// has not run. Parameters are committed to the noise component only on
    /// success.
    pub fn fit_noise(&mut self, stim: &[f64], responses: &DMatrix<f64>) -> Result<NoiseFit> {
        self.fit_noise_with(&NoiseMleEstimator::new(), stim, responses)
    }

    /// Stage 2 with a caller-configured estimator.
    pub fn fit_noise_with(
        &mut self,
        estimator: &NoiseMleEstimator,
        stim: &[f64],
        responses: &DMatrix<f64>,
    ) -> Result<NoiseFit> {
        let fit = estimator.fit(&self.linear, stim, responses)?;
        self.noise.set_params(fit.rho, DVector::from_column_slice(&fit.sigma))?;
        Ok(fit)
    }

    /// Deterministic mean response (V x N), no noise.
    pub fn predict(&self, stim: &[f64]) -> Result<DMatrix<f64>> {
        self.linear.predict(stim)
    }

    /// Stochastic sampled response (V x N).
    ///
    /// Requires both the stage-1 weights and a fitted (or explicitly set)
    /// noise covariance. Deterministic per seed.
    pub fn simulate(&self, stim: &[f64], seed: u64) -> Result<DMatrix<f64>> {
        let mean = self.linear.predict(stim)?;
        let cov = self.noise.require_cov()?;
        sample_responses(&mean, cov, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use ve_core::Error;

    fn stim_grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 180.0 / n as f64).collect()
    }

    #[test]
    fn test_predict_before_fit_is_uninitialized() {
        let model = EncodeModel::with_default_basis();
        let err = model.predict(&stim_grid(10)).unwrap_err();
        assert!(matches!(err, Error::Uninitialized(_)), "got {err}");
    }

    #[test]
    fn test_simulate_before_any_fit_is_uninitialized() {
        let model = EncodeModel::with_default_basis();
        let err = model.simulate(&stim_grid(10), 1).unwrap_err();
        assert!(matches!(err, Error::Uninitialized(_)), "got {err}");
    }

    #[test]
    fn test_simulate_requires_noise_parameters() {
        let mut model = EncodeModel::with_default_basis();
        model.set_weights(DMatrix::from_element(8, 3, 0.5)).unwrap();
        let err = model.simulate(&stim_grid(10), 1).unwrap_err();
        assert!(matches!(err, Error::Uninitialized(_)), "got {err}");
    }

    #[test]
    fn test_fit_tuning_then_predict_round_trip() {
        let mut truth = EncodeModel::with_default_basis();
        truth.set_weights(DMatrix::from_fn(8, 4, |i, j| ((i + 3 * j) as f64 * 0.21).cos())).unwrap();

        let stim = stim_grid(50);
        let responses = truth.predict(&stim).unwrap();

        let mut fitted = EncodeModel::with_default_basis();
        fitted.fit_tuning(&stim, &responses).unwrap();
        let pred = fitted.predict(&stim).unwrap();

        let max_abs_diff =
            (&pred - &responses).iter().fold(0.0_f64, |acc, &d| acc.max(d.abs()));
        assert!(max_abs_diff < 1e-6, "max abs prediction error {}", max_abs_diff);
    }

    #[test]
    fn test_simulate_deterministic_per_seed() {
        let mut model = EncodeModel::with_default_basis();
        model.set_weights(DMatrix::from_element(8, 2, 0.4)).unwrap();
        model.set_noise(0.3, dvector![1.0, 2.0]).unwrap();

        let stim = stim_grid(12);
        let a = model.simulate(&stim, 99).unwrap();
        let b = model.simulate(&stim, 99).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.nrows(), 2);
        assert_eq!(a.ncols(), 12);
    }

    #[test]
    fn test_simulate_with_singular_noise_fails() {
        // rho = 1 is a valid parameterization but a singular covariance;
        // sampling must surface the numerical error.
        let mut model = EncodeModel::with_default_basis();
        model.set_weights(DMatrix::from_element(8, 2, 0.4)).unwrap();
        model.set_noise(1.0, dvector![1.0, 1.0]).unwrap();

        let err = model.simulate(&stim_grid(5), 3).unwrap_err();
        assert!(matches!(err, Error::Computation(_)), "got {err}");
    }

    #[test]
    fn test_fit_noise_requires_stage_one() {
        let mut model = EncodeModel::with_default_basis();
        let responses = DMatrix::zeros(2, 20);
        let err = model.fit_noise(&stim_grid(20), &responses).unwrap_err();
        assert!(matches!(err, Error::Uninitialized(_)), "got {err}");
        assert!(model.noise().params().is_none());
    }
}
