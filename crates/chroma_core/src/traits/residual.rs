//! Residual assembly capability.
//!
//! A unit operation is a DAE `F(t, y, ẏ, p) = 0`. Besides the residual
//! itself, sensitivity propagation needs the products of `J = ∂F/∂y` and
//! `J_dot = ∂F/∂ẏ` with arbitrary vectors.

use crate::types::{Active, CoreResult};

/// Residual and Jacobian-vector products of a unit operation.
///
/// Every buffer is `num_dofs` long; `sec` is the index of the active
/// section of the time line.
pub trait ResidualAssembly {
    /// Evaluates `F(t, y, ẏ)` into `res`.
    fn residual(&self, t: f64, sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64])
        -> CoreResult<()>;

    /// Evaluates `F` with parameters read as [`Active`] values, so that the
    /// derivative in direction `d` of `res[i]` is `∂F_i/∂p` for the
    /// parameter seeded in `d`.
    fn residual_ad(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        res: &mut [Active],
    ) -> CoreResult<()>;

    /// `out = J · x`
    fn multiply_with_jacobian(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()>;

    /// `out = J_dot · x`
    fn multiply_with_derivative_jacobian(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()>;
}
