//! Parametric noise covariance model.
//!
//! Noise across units is modeled as zero-mean correlated Gaussian with
//! covariance `(1 - rho) * diag(sigma^2) + rho * sigma sigma^T`: a convex
//! combination of independent per-unit variance and a fully correlated
//! rank-1 structure. The negative log-likelihood drops the constant
//! normalization term, so it is suitable as a minimization objective but is
//! not a normalized density.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ve_core::{Error, Result};

use crate::linear::LinearResponseModel;

/// Fitted noise parameters: global correlation plus per-unit scales.
#[derive(Debug, Clone)]
pub struct NoiseParams {
    /// Global noise correlation between units.
    pub rho: f64,
    /// Per-unit noise standard deviations (length V).
    pub sigma: DVector<f64>,
}

/// Noise covariance component of the encoding model.
///
/// Parameters are absent until [`NoiseModel::set_params`] (or the stage-2
/// fit) runs; the covariance matrix is rebuilt from scratch whenever the
/// parameters change.
#[derive(Debug, Clone, Default)]
pub struct NoiseModel {
    params: Option<NoiseParams>,
    cov: Option<DMatrix<f64>>,
}

/// Smallest admissible rho for a well-formed correlation structure over
/// `n_units` units. Zero when a single unit makes correlation meaningless.
pub fn rho_lower_bound(n_units: usize) -> f64 {
    if n_units > 1 { -1.0 / (n_units - 1) as f64 } else { 0.0 }
}

fn validate_params(rho: f64, sigma: &DVector<f64>) -> Result<()> {
    if sigma.is_empty() {
        return Err(Error::Validation("sigma must be non-empty".to_string()));
    }
    for (i, &s) in sigma.iter().enumerate() {
        if !s.is_finite() || s <= 0.0 {
            return Err(Error::Validation(format!(
                "sigma[{}] = {} is not a positive finite value",
                i, s
            )));
        }
    }
    let lo = rho_lower_bound(sigma.len());
    if !rho.is_finite() || rho < lo || rho > 1.0 {
        return Err(Error::Validation(format!(
            "rho = {} outside valid correlation range [{}, 1]",
            rho, lo
        )));
    }
    Ok(())
}

/// Build the V x V covariance matrix from (rho, sigma).
///
/// Symmetric by construction. rho = 1 is accepted and yields a singular
/// matrix; the failure then surfaces from whichever downstream operation
/// needs a Cholesky factor.
pub fn covariance(rho: f64, sigma: &DVector<f64>) -> Result<DMatrix<f64>> {
    validate_params(rho, sigma)?;
    let v = sigma.len();
    Ok(DMatrix::from_fn(v, v, |i, j| {
        if i == j {
            sigma[i] * sigma[i]
        } else {
            rho * sigma[i] * sigma[j]
        }
    }))
}

fn spd_factor(cov: &DMatrix<f64>) -> Result<Cholesky<f64, Dyn>> {
    cov.clone()
        .cholesky()
        .ok_or_else(|| Error::Computation("covariance is not positive-definite".to_string()))
}

fn logdet_from_factor(chol: &Cholesky<f64, Dyn>) -> f64 {
    let l = chol.l_dirty();
    (0..l.nrows()).map(|i| 2.0 * l[(i, i)].ln()).sum()
}

/// Unnormalized Gaussian negative log-likelihood for one trial column:
/// `ln det(cov) + (x - mu)^T cov^{-1} (x - mu)`.
///
/// The inverse is never formed; the quadratic form comes from a Cholesky
/// solve. Fails if `cov` is not positive-definite.
pub fn neg_log_likelihood(
    observed: &DVector<f64>,
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
) -> Result<f64> {
    let v = cov.nrows();
    if cov.ncols() != v || v == 0 {
        return Err(Error::Validation("cov must be square and non-empty".to_string()));
    }
    if observed.len() != v || mean.len() != v {
        return Err(Error::Validation(format!(
            "observed ({}) and mean ({}) must match cov dimension {}",
            observed.len(),
            mean.len(),
            v
        )));
    }
    let chol = spd_factor(cov)?;
    let r = observed - mean;
    let solved = chol.solve(&r);
    Ok(logdet_from_factor(&chol) + r.dot(&solved))
}

/// Mean negative log-likelihood of a response matrix under the linear
/// model's predictions and the given covariance.
///
/// The total estimation cost minimized by the stage-2 fit: per-trial NLL
/// averaged over all trial columns. The covariance is factored once; the
/// per-trial terms are identical to repeated [`neg_log_likelihood`] calls.
pub fn objective(
    linear: &LinearResponseModel,
    stim: &[f64],
    responses: &DMatrix<f64>,
    cov: &DMatrix<f64>,
) -> Result<f64> {
    let mean = linear.predict(stim)?;
    let v = cov.nrows();
    if responses.nrows() != v || mean.nrows() != v {
        return Err(Error::Validation(format!(
            "response matrix has {} units, covariance is {}x{}",
            responses.nrows(),
            v,
            cov.ncols()
        )));
    }
    if responses.ncols() != stim.len() {
        return Err(Error::Validation(format!(
            "response matrix has {} trial columns, stimulus has {} trials",
            responses.ncols(),
            stim.len()
        )));
    }

    let chol = spd_factor(cov)?;
    let logdet = logdet_from_factor(&chol);

    let n = responses.ncols();
    let mut total = 0.0;
    for idx in 0..n {
        let r = responses.column(idx) - mean.column(idx);
        let solved = chol.solve(&r);
        total += logdet + r.dot(&solved);
    }
    Ok(total / n as f64)
}

impl NoiseModel {
    /// Create an unfitted noise model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted parameters, if stage 2 (or an explicit set) has run.
    pub fn params(&self) -> Option<&NoiseParams> {
        self.params.as_ref()
    }

    /// Covariance matrix for the current parameters.
    pub fn cov(&self) -> Option<&DMatrix<f64>> {
        self.cov.as_ref()
    }

    /// Set (rho, sigma) and rebuild the covariance matrix.
    ///
    /// Validation failure leaves any previous parameters in place.
    pub fn set_params(&mut self, rho: f64, sigma: DVector<f64>) -> Result<()> {
        let cov = covariance(rho, &sigma)?;
        self.params = Some(NoiseParams { rho, sigma });
        self.cov = Some(cov);
        Ok(())
    }

    /// Covariance matrix, or an uninitialized-model error.
    pub fn require_cov(&self) -> Result<&DMatrix<f64>> {
        self.cov.as_ref().ok_or_else(|| {
            Error::Uninitialized("noise parameters are not yet estimated".to_string())
        })
    }
}
