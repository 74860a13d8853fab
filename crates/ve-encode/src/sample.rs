//! Forward sampling from the fitted generative model.
//!
//! Each trial column draws one V-dimensional multivariate-normal sample
//! around that trial's mean, with the shared covariance: mean + L z, where
//! L is the Cholesky factor and z are i.i.d. standard normals from a seeded
//! generator. Trials are independent of each other; units within a trial
//! are correlated per the covariance.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use ve_core::{Error, Result};

/// Sample a V x N response matrix around per-trial means.
///
/// Deterministic for a given seed. Fails if `cov` is not positive-definite
/// or its dimension disagrees with the mean matrix rows.
pub fn sample_responses(
    mean: &DMatrix<f64>,
    cov: &DMatrix<f64>,
    seed: u64,
) -> Result<DMatrix<f64>> {
    let v = cov.nrows();
    if cov.ncols() != v || v == 0 {
        return Err(Error::Validation("cov must be square and non-empty".to_string()));
    }
    if mean.nrows() != v {
        return Err(Error::Validation(format!(
            "mean matrix has {} unit rows, covariance is {}x{}",
            mean.nrows(),
            v,
            v
        )));
    }

    let chol = cov
        .clone()
        .cholesky()
        .ok_or_else(|| Error::Computation("covariance is not positive-definite".to_string()))?;
    let l = chol.l();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sample = DMatrix::zeros(v, mean.ncols());
    for idx in 0..mean.ncols() {
        let mut z = DVector::<f64>::zeros(v);
        for i in 0..v {
            z[i] = StandardNormal.sample(&mut rng);
        }
        let draw = mean.column(idx) + &l * z;
        sample.set_column(idx, &draw);
    }

    Ok(sample)
}
