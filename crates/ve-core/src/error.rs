//! Error types for the voxel-encode workspace

use thiserror::Error;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum Error {
    /// A fit-dependent operation was called before the relevant fit ran
    #[error("Uninitialized model: {0}")]
    Uninitialized(String),

    /// Validation error (dimension mismatch, invalid parameter value)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical computation error (singular or non-SPD system)
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
