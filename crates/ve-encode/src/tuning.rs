//! Orientation tuning basis.
//!
//! A stimulus orientation in [0, 180) degrees is expanded into K basis
//! responses, one per preferred orientation. Each basis function is a
//! half-rectified raised cosine: `max(cos(pi * (s - p) / 90), 0)^5`.
//! The quarter-turn unit makes the period match the 180-degree stimulus
//! domain; the fixed exponent yields a narrow, smooth, non-negative lobe
//! centered at the preferred orientation.

use nalgebra::{DMatrix, DVector};

/// Exponent applied to the rectified cosine. Fixed design choice.
const TUNING_EXPONENT: i32 = 5;

/// Preferred orientations for `n_basis` channels: equal steps over [0, 180).
pub fn preference_vector(n_basis: usize) -> DVector<f64> {
    let step = 180.0 / n_basis as f64;
    DVector::from_fn(n_basis, |k, _| k as f64 * step)
}

/// Evaluate the tuning basis for every (trial, channel) pair.
///
/// Returns an N x K matrix where entry (n, k) is the response of the channel
/// preferring `pref[k]` to stimulus `stim[n]`. Pure function; every value is
/// in [0, 1].
pub fn tuning(stim: &[f64], pref: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(stim.len(), pref.len(), |n, k| {
        let d = std::f64::consts::PI * (stim[n] - pref[k]) / 90.0;
        d.cos().max(0.0).powi(TUNING_EXPONENT)
    })
}
