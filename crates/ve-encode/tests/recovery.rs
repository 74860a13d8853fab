//! End-to-end parameter recovery tests.
//!
//! Stage 1: noiseless synthetic data from a known random weight matrix must
//! be recovered by OLS to tight tolerance. Stage 2: seeded correlated-noise
//! data must recover (rho, sigma) to loose tolerances.

use nalgebra::{dvector, DMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ve_encode::{EncodeModel, NoiseMleEstimator, OptimizerConfig};

/// Uniform random stimuli over [0, 180).
fn random_stimuli(n: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(0.0..180.0)).collect()
}

#[test]
fn test_ols_recovers_random_weights_noiseless() {
    let n_basis = 8;
    let n_units = 20;
    let n_trials = 50;
    let mut rng = StdRng::seed_from_u64(2024);

    let beta0 = DMatrix::from_fn(n_basis, n_units, |_, _| rng.gen::<f64>());
    let mut truth = EncodeModel::new(n_basis).unwrap();
    truth.set_weights(beta0.clone()).unwrap();

    let stim = random_stimuli(n_trials, &mut rng);
    let responses = truth.predict(&stim).unwrap();

    let mut fitted = EncodeModel::new(n_basis).unwrap();
    let beta_hat = fitted.fit_tuning(&stim, &responses).unwrap().clone();

    let max_abs_diff = (&beta_hat - &beta0).iter().fold(0.0_f64, |acc, &d| acc.max(d.abs()));
    assert!(max_abs_diff < 1e-4, "max abs weight error {}", max_abs_diff);

    // The refit model reproduces the generating means.
    let pred = fitted.predict(&stim).unwrap();
    let max_pred_diff = (&pred - &responses).iter().fold(0.0_f64, |acc, &d| acc.max(d.abs()));
    assert!(max_pred_diff < 1e-4, "max abs prediction error {}", max_pred_diff);
}

#[test]
fn test_two_stage_fit_recovers_noise_parameters() {
    let n_basis = 8;
    let n_units = 4;
    let n_trials = 400;
    let rho0 = 0.3;
    let sigma0 = dvector![0.8, 1.0, 1.2, 1.5];

    let mut rng = StdRng::seed_from_u64(7);
    let beta0 = DMatrix::from_fn(n_basis, n_units, |_, _| 2.0 * rng.gen::<f64>());

    let mut truth = EncodeModel::new(n_basis).unwrap();
    truth.set_weights(beta0).unwrap();
    truth.set_noise(rho0, sigma0.clone()).unwrap();

    let stim = random_stimuli(n_trials, &mut rng);
    let responses = truth.simulate(&stim, 123).unwrap();

    let mut fitted = EncodeModel::new(n_basis).unwrap();
    fitted.fit_tuning(&stim, &responses).unwrap();
    // Finite-difference gradients carry ~1e-7 noise; a 1e-6 gradient-norm
    // target can be unreachable, so loosen it for this recovery check.
    let estimator =
        NoiseMleEstimator::with_config(OptimizerConfig { max_iter: 500, tol: 1e-5, m: 10 });
    let fit = fitted.fit_noise_with(&estimator, &stim, &responses).unwrap();

    assert!(fit.converged, "noise MLE should converge: {:?}", fit);
    assert!(
        (fit.rho - rho0).abs() < 0.15,
        "rho estimate {} too far from true {}",
        fit.rho,
        rho0
    );
    for (i, &s_hat) in fit.sigma.iter().enumerate() {
        let rel = (s_hat - sigma0[i]).abs() / sigma0[i];
        assert!(
            rel < 0.25,
            "sigma[{}] estimate {} off from true {} by {:.0}%",
            i,
            s_hat,
            sigma0[i],
            rel * 100.0
        );
    }

    // The noise component now carries the fitted covariance, so the model
    // can simulate immediately.
    let sim = fitted.simulate(&stim, 5).unwrap();
    assert_eq!(sim.nrows(), n_units);
    assert_eq!(sim.ncols(), n_trials);
}

#[test]
fn test_fitted_objective_not_worse_than_truth() {
    // The minimizer must do at least as well as the generating parameters on
    // the observed data (up to line-search slack).
    let n_basis = 8;
    let n_units = 3;
    let n_trials = 300;
    let rho0 = 0.2;
    let sigma0 = dvector![1.0, 1.0, 1.0];

    let mut rng = StdRng::seed_from_u64(11);
    let beta0 = DMatrix::from_fn(n_basis, n_units, |_, _| rng.gen::<f64>());

    let mut truth = EncodeModel::new(n_basis).unwrap();
    truth.set_weights(beta0).unwrap();
    truth.set_noise(rho0, sigma0.clone()).unwrap();

    let stim = random_stimuli(n_trials, &mut rng);
    let responses = truth.simulate(&stim, 321).unwrap();

    let mut fitted = EncodeModel::new(n_basis).unwrap();
    fitted.fit_tuning(&stim, &responses).unwrap();
    let fit = fitted.fit_noise(&stim, &responses).unwrap();

    let cov_true = ve_encode::covariance(rho0, &sigma0).unwrap();
    let nll_true =
        ve_encode::objective(fitted.linear(), &stim, &responses, &cov_true).unwrap();
    assert!(
        fit.nll <= nll_true + 1e-3,
        "fitted NLL {} worse than NLL at true parameters {}",
        fit.nll,
        nll_true
    );
}
