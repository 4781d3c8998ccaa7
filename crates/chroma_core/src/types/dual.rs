//! Dual number integration for verification.
//!
//! Bridges a single direction of an [`Active`] to num-dual's `Dual64`, so
//! that derivative propagation through residual kernels can be cross-checked
//! against an independent forward-mode implementation.
//!
//! ## Usage
//!
//! ```
//! use chroma_core::types::{Active, AdConfig};
//! use chroma_core::types::dual::DualNumber;
//!
//! let mut k = Active::new(3.0, AdConfig::new(2));
//! k.set_derivative(1, 1.0).unwrap();
//!
//! let dual: DualNumber = k.to_dual(1);
//! assert_eq!(dual.re, 3.0);
//! assert_eq!(dual.eps, 1.0);
//! ```

use super::active::{Active, AdConfig};
use super::error::CoreResult;

/// Type alias for num-dual's Dual64 (f64-based dual numbers).
pub type DualNumber = num_dual::Dual64;

impl Active {
    /// Projects this value onto a single direction.
    pub fn to_dual(&self, direction: usize) -> DualNumber {
        DualNumber::new(self.value(), self.derivative(direction))
    }

    /// Builds a value whose only non-zero derivative is `dual.eps` along
    /// `direction`.
    pub fn from_dual(dual: DualNumber, direction: usize, config: AdConfig) -> CoreResult<Active> {
        config.check_direction(direction)?;
        let mut active = Active::new(dual.re, config);
        active.set_derivative(direction, dual.eps)?;
        Ok(active)
    }
}
