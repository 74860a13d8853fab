//! Stage-1 linear response model.
//!
//! Holds per-unit linear weights over the tuning basis. Weights are absent
//! until [`LinearResponseModel::fit`] runs; prediction before that is an
//! uninitialized-model error, not a silent default.

use nalgebra::DMatrix;
use ve_core::{Error, Result};

use crate::tuning::{preference_vector, tuning};

/// Linear encoding of stimulus orientation into per-unit responses.
///
/// The preference vector is fixed at construction; the K x V weight matrix
/// `beta` is the only trainable parameter and is estimated by ordinary
/// least squares.
#[derive(Debug, Clone)]
pub struct LinearResponseModel {
    pref: nalgebra::DVector<f64>,
    beta: Option<DMatrix<f64>>,
}

impl LinearResponseModel {
    /// Create a model with `n_basis` tuning channels and no weights.
    pub fn new(n_basis: usize) -> Result<Self> {
        if n_basis == 0 {
            return Err(Error::Validation("n_basis must be > 0".to_string()));
        }
        Ok(Self { pref: preference_vector(n_basis), beta: None })
    }

    /// Number of basis functions K.
    pub fn n_basis(&self) -> usize {
        self.pref.len()
    }

    /// Fitted weight matrix (K x V), if stage 1 has run.
    pub fn beta(&self) -> Option<&DMatrix<f64>> {
        self.beta.as_ref()
    }

    /// Override the weight matrix directly (K x V).
    ///
    /// Intended for forward simulation from known weights; estimation should
    /// go through [`fit`](Self::fit).
    pub fn set_beta(&mut self, beta: DMatrix<f64>) -> Result<()> {
        if beta.nrows() != self.n_basis() {
            return Err(Error::Validation(format!(
                "beta has {} rows, expected n_basis = {}",
                beta.nrows(),
                self.n_basis()
            )));
        }
        self.beta = Some(beta);
        Ok(())
    }

    /// Predict mean responses for a stimulus sequence.
    ///
    /// Returns a V x N matrix (units x trials), the convention used for
    /// observed response matrices.
    pub fn predict(&self, stim: &[f64]) -> Result<DMatrix<f64>> {
        let beta = self.beta.as_ref().ok_or_else(|| {
            Error::Uninitialized("model weights are not yet estimated".to_string())
        })?;
        if stim.is_empty() {
            return Err(Error::Validation("stimulus sequence must be non-empty".to_string()));
        }
        let basis = tuning(stim, &self.pref);
        Ok((basis * beta).transpose())
    }

    /// Estimate weights by ordinary least squares (stage 1).
    ///
    /// Solves the K x K normal equations `(B^T B) W = B^T Y^T` with a direct
    /// Cholesky solve rather than an explicit inverse. A degenerate stimulus
    /// design (fewer distinct orientations than basis functions) makes the
    /// system singular and surfaces as a computation error; the stored
    /// weights are untouched on failure.
    pub fn fit(&mut self, stim: &[f64], responses: &DMatrix<f64>) -> Result<&DMatrix<f64>> {
        let n = stim.len();
        let k = self.n_basis();
        if n == 0 {
            return Err(Error::Validation("stimulus sequence must be non-empty".to_string()));
        }
        if responses.ncols() != n {
            return Err(Error::Validation(format!(
                "response matrix has {} trial columns, stimulus has {} trials",
                responses.ncols(),
                n
            )));
        }
        if n < k {
            return Err(Error::Validation(format!(
                "need at least {} trials to estimate {} basis weights, got {}",
                k, k, n
            )));
        }

        let basis = tuning(stim, &self.pref);
        let btb = basis.transpose() * &basis;
        let bty = basis.transpose() * responses.transpose();

        let chol = btb.cholesky().ok_or_else(|| {
            Error::Computation(
                "normal equations are singular (degenerate stimulus design)".to_string(),
            )
        })?;
        Ok(&*self.beta.insert(chol.solve(&bty)))
    }
}
