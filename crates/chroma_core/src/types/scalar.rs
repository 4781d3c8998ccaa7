//! Scalar abstraction for residual kernels.
//!
//! Unit operation residuals are written once, generic over
//! [`ResidualScalar`], and evaluated either with `f64` (plain residual) or
//! with [`Active`] (residual carrying parameter sensitivities).

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::active::Active;

/// Arithmetic required by residual kernels.
pub trait ResidualScalar:
    Clone
    + From<f64>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// Reads a parameter cell in this scalar type.
    fn from_cell(cell: &Active) -> Self;

    /// Primal value.
    fn primal(&self) -> f64;
}

impl ResidualScalar for f64 {
    #[inline]
    fn from_cell(cell: &Active) -> Self {
        cell.value()
    }

    #[inline]
    fn primal(&self) -> f64 {
        *self
    }
}

impl ResidualScalar for Active {
    #[inline]
    fn from_cell(cell: &Active) -> Self {
        cell.clone()
    }

    #[inline]
    fn primal(&self) -> f64 {
        self.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdConfig;

    fn kernel<S: ResidualScalar>(k: &Active, x: f64) -> S {
        let k = S::from_cell(k);
        k.clone() * k * x + S::from(1.0)
    }

    #[test]
    fn test_same_primal_for_both_scalars() {
        let mut k = Active::new(2.0, AdConfig::new(1));
        k.set_derivative(0, 1.0).unwrap();

        let plain: f64 = kernel(&k, 3.0);
        let active: Active = kernel(&k, 3.0);
        assert_eq!(plain, active.primal());
        // d/dk (3 k^2 + 1) = 6 k
        assert_eq!(active.derivative(0), 12.0);
    }
}
