//! Differentiable scalar storage for forward sensitivities.
//!
//! An [`Active`] carries a primal value and one derivative component per AD
//! direction. The number of directions is fixed when the value is allocated
//! and is taken from an explicit [`AdConfig`]; it never grows afterwards.
//!
//! A zero-capacity `Active` (built with [`Active::constant`] or `From<f64>`)
//! behaves as a constant: every derivative reads as zero, and mixing it with
//! a full-capacity value yields a full-capacity result.

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::error::{CoreError, CoreResult};

/// Number of AD directions allocated for every differentiable cell.
///
/// Passed explicitly at construction so tests can vary the capacity per case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AdConfig {
    directions: usize,
}

impl AdConfig {
    /// Creates a configuration with `directions` derivative slots.
    pub const fn new(directions: usize) -> Self {
        Self { directions }
    }

    /// Configuration without derivative slots (plain simulation).
    pub const fn passive() -> Self {
        Self { directions: 0 }
    }

    /// Number of derivative slots.
    pub fn directions(&self) -> usize {
        self.directions
    }

    /// Fails with `DirectionOutOfRange` unless `direction` fits.
    pub fn check_direction(&self, direction: usize) -> CoreResult<()> {
        if direction < self.directions {
            Ok(())
        } else {
            Err(CoreError::DirectionOutOfRange {
                direction,
                capacity: self.directions,
            })
        }
    }
}

/// Scalar with a primal value and a fixed set of directional derivatives.
///
/// # Examples
///
/// ```
/// use chroma_core::types::{Active, AdConfig};
///
/// let config = AdConfig::new(2);
/// let mut k = Active::new(3.0, config);
/// k.set_derivative(1, 1.0).unwrap();
///
/// // f(k) = 2 k^2 + 1  =>  df/dk = 4 k = 12
/// let f = k.clone() * k * 2.0 + 1.0;
/// assert_eq!(f.value(), 19.0);
/// assert_eq!(f.derivative(0), 0.0);
/// assert_eq!(f.derivative(1), 12.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Active {
    value: f64,
    derivatives: Box<[f64]>,
}

impl Active {
    /// Allocates a value with `config.directions()` zeroed derivatives.
    pub fn new(value: f64, config: AdConfig) -> Self {
        Self {
            value,
            derivatives: vec![0.0; config.directions()].into_boxed_slice(),
        }
    }

    /// Zero-capacity constant.
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            derivatives: Box::default(),
        }
    }

    /// Primal value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Overwrites the primal value, leaving derivatives untouched.
    #[inline]
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Number of allocated derivative slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.derivatives.len()
    }

    /// Derivative along `direction`; zero for directions beyond the capacity.
    #[inline]
    pub fn derivative(&self, direction: usize) -> f64 {
        self.derivatives.get(direction).copied().unwrap_or(0.0)
    }

    /// All derivative components.
    #[inline]
    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    /// Seeds the derivative along `direction`.
    pub fn set_derivative(&mut self, direction: usize, seed: f64) -> CoreResult<()> {
        match self.derivatives.get_mut(direction) {
            Some(slot) => {
                *slot = seed;
                Ok(())
            }
            None => Err(CoreError::DirectionOutOfRange {
                direction,
                capacity: self.derivatives.len(),
            }),
        }
    }

    /// Zeroes every derivative component.
    pub fn clear_derivatives(&mut self) {
        self.derivatives.iter_mut().for_each(|d| *d = 0.0);
    }

    /// Result of a binary operation with partials `da` and `db`.
    fn binary(a: &Active, b: &Active, value: f64, da: f64, db: f64) -> Active {
        let n = a.capacity().max(b.capacity());
        let derivatives = (0..n)
            .map(|i| da * a.derivative(i) + db * b.derivative(i))
            .collect();
        Active { value, derivatives }
    }

    /// Result of a unary operation with partial `da`; reuses the allocation.
    fn unary(mut self, value: f64, da: f64) -> Active {
        self.value = value;
        self.derivatives.iter_mut().for_each(|d| *d *= da);
        self
    }
}

impl From<f64> for Active {
    fn from(value: f64) -> Self {
        Active::constant(value)
    }
}

impl Add for Active {
    type Output = Active;

    fn add(self, rhs: Active) -> Active {
        Active::binary(&self, &rhs, self.value + rhs.value, 1.0, 1.0)
    }
}

impl Sub for Active {
    type Output = Active;

    fn sub(self, rhs: Active) -> Active {
        Active::binary(&self, &rhs, self.value - rhs.value, 1.0, -1.0)
    }
}

impl Mul for Active {
    type Output = Active;

    fn mul(self, rhs: Active) -> Active {
        Active::binary(&self, &rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl Div for Active {
    type Output = Active;

    fn div(self, rhs: Active) -> Active {
        let inv = 1.0 / rhs.value;
        let value = self.value * inv;
        Active::binary(&self, &rhs, value, inv, -value * inv)
    }
}

impl Neg for Active {
    type Output = Active;

    fn neg(self) -> Active {
        let value = -self.value;
        self.unary(value, -1.0)
    }
}

impl Add<f64> for Active {
    type Output = Active;

    fn add(self, rhs: f64) -> Active {
        let value = self.value + rhs;
        self.unary(value, 1.0)
    }
}

impl Sub<f64> for Active {
    type Output = Active;

    fn sub(self, rhs: f64) -> Active {
        let value = self.value - rhs;
        self.unary(value, 1.0)
    }
}

impl Mul<f64> for Active {
    type Output = Active;

    fn mul(self, rhs: f64) -> Active {
        let value = self.value * rhs;
        self.unary(value, rhs)
    }
}

impl Div<f64> for Active {
    type Output = Active;

    fn div(self, rhs: f64) -> Active {
        let value = self.value / rhs;
        self.unary(value, 1.0 / rhs)
    }
}

impl Add<Active> for f64 {
    type Output = Active;

    fn add(self, rhs: Active) -> Active {
        rhs + self
    }
}

impl Sub<Active> for f64 {
    type Output = Active;

    fn sub(self, rhs: Active) -> Active {
        let value = self - rhs.value;
        rhs.unary(value, -1.0)
    }
}

impl Mul<Active> for f64 {
    type Output = Active;

    fn mul(self, rhs: Active) -> Active {
        rhs * self
    }
}

impl Div<Active> for f64 {
    type Output = Active;

    fn div(self, rhs: Active) -> Active {
        let value = self / rhs.value;
        let da = -value / rhs.value;
        rhs.unary(value, da)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seeded(value: f64, direction: usize, capacity: usize) -> Active {
        let mut a = Active::new(value, AdConfig::new(capacity));
        a.set_derivative(direction, 1.0).unwrap();
        a
    }

    #[test]
    fn test_new_has_zero_derivatives() {
        let a = Active::new(1.5, AdConfig::new(3));
        assert_eq!(a.capacity(), 3);
        assert_eq!(a.derivatives(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_set_derivative_out_of_range() {
        let mut a = Active::new(1.0, AdConfig::new(2));
        let err = a.set_derivative(2, 1.0).unwrap_err();
        assert_eq!(
            err,
            CoreError::DirectionOutOfRange {
                direction: 2,
                capacity: 2
            }
        );
    }

    #[test]
    fn test_constant_reads_zero_derivatives() {
        let c = Active::from(4.0);
        assert_eq!(c.capacity(), 0);
        assert_eq!(c.derivative(7), 0.0);
    }

    #[test]
    fn test_product_rule_across_directions() {
        let a = seeded(2.0, 0, 2);
        let b = seeded(5.0, 1, 2);
        let p = a * b;
        assert_relative_eq!(p.value(), 10.0);
        assert_relative_eq!(p.derivative(0), 5.0);
        assert_relative_eq!(p.derivative(1), 2.0);
    }

    #[test]
    fn test_quotient_rule() {
        let a = seeded(3.0, 0, 1);
        let q = 1.0 / a.clone();
        assert_relative_eq!(q.value(), 1.0 / 3.0);
        assert_relative_eq!(q.derivative(0), -1.0 / 9.0);

        let r = a.clone() / a;
        assert_relative_eq!(r.value(), 1.0);
        assert_relative_eq!(r.derivative(0), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_mixing_constant_and_active() {
        let a = seeded(2.0, 1, 3);
        let c = Active::constant(7.0);
        let s = c - a;
        assert_eq!(s.capacity(), 3);
        assert_relative_eq!(s.value(), 5.0);
        assert_relative_eq!(s.derivative(1), -1.0);
    }

    #[test]
    fn test_scalar_operations() {
        let a = seeded(4.0, 0, 1);
        let b = (a.clone() + 1.0) * 3.0 - 2.0;
        assert_relative_eq!(b.value(), 13.0);
        assert_relative_eq!(b.derivative(0), 3.0);

        let c = -(a / 2.0);
        assert_relative_eq!(c.value(), -2.0);
        assert_relative_eq!(c.derivative(0), -0.5);
    }

    #[test]
    fn test_clear_derivatives_keeps_value() {
        let mut a = seeded(1.25, 0, 2);
        a.clear_derivatives();
        assert_eq!(a.value(), 1.25);
        assert_eq!(a.derivatives(), &[0.0, 0.0]);
    }

    #[test]
    fn test_check_direction() {
        let config = AdConfig::new(2);
        assert!(config.check_direction(1).is_ok());
        assert!(config.check_direction(2).is_err());
        assert!(AdConfig::passive().check_direction(0).is_err());
    }
}
