//! # ve-core
//!
//! Shared error taxonomy and result types for the voxel-encode workspace.
//!
//! The estimation crates depend on these types only; they carry no numerics
//! and no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::NoiseFit;
