//! Core value types.
//!
//! This module provides:
//! - `param_id`: Parameter identities and enumerated parameter names
//! - `active`: Differentiable scalar storage (`Active`) and its capacity (`AdConfig`)
//! - `scalar`: The `ResidualScalar` abstraction over `f64` and `Active`
//! - `dual`: num-dual bridge for verification (when `num-dual-mode` is enabled)
//! - `error`: Structured error type `CoreError`

pub mod active;
#[cfg(feature = "num-dual-mode")]
pub mod dual;
pub mod error;
pub mod param_id;
pub mod scalar;

// Re-export commonly used types at module level
pub use active::{Active, AdConfig};
pub use error::{CoreError, CoreResult};
pub use param_id::{ParameterId, ParameterName, UnitOpIdx};
pub use scalar::ResidualScalar;
