//! The unit operation contract.

use super::{ExportSolution, ParameterProvider, ResidualAssembly};
use crate::types::{Active, CoreError, CoreResult};

/// A unit operation: parameters, state layout and residual assembly.
///
/// The trait is object safe; `Send + Sync` lets different unit operations
/// combine their sensitivity residuals concurrently.
pub trait UnitOperation: ParameterProvider + ExportSolution + ResidualAssembly + Send + Sync {
    /// Configuration name of the model, e.g. `GENERAL_RATE_MODEL`.
    fn unit_type(&self) -> &'static str;

    /// Assembles the forward sensitivity residuals.
    ///
    /// For the `p`-th sensitive parameter (insertion order) with AD
    /// direction `d`:
    ///
    /// ```text
    /// res_s[p] = J · ys[p] + time_factor · J_dot · ys_dot[p] + ∂F/∂p
    /// ```
    ///
    /// where `∂F/∂p` is read from `ad_res[i].derivative(d)`. `tmp1`, `tmp2`
    /// and `tmp3` receive `J · ys[p]`, `J_dot · ys_dot[p]` and `∂F/∂p` of
    /// the last parameter processed. Nothing is allocated.
    ///
    /// # Errors
    ///
    /// `BufferSize` if the number of sensitivity vectors differs from
    /// [`ParameterProvider::num_sens_params`] or any buffer is not
    /// `num_dofs` long. Errors of the Jacobian products are propagated.
    #[allow(clippy::too_many_arguments)]
    fn residual_sens_fwd_combine(
        &self,
        t: f64,
        sec: usize,
        time_factor: f64,
        y: &[f64],
        y_dot: &[f64],
        ys: &[&[f64]],
        ys_dot: &[&[f64]],
        res_s: &mut [&mut [f64]],
        ad_res: &[Active],
        tmp1: &mut [f64],
        tmp2: &mut [f64],
        tmp3: &mut [f64],
    ) -> CoreResult<()> {
        let directions = self.registry().sensitive_parameters().iter().map(|s| s.direction);
        combine_sensitivity_directions(
            self,
            directions,
            t,
            sec,
            time_factor,
            y,
            y_dot,
            ys,
            ys_dot,
            res_s,
            ad_res,
            tmp1,
            tmp2,
            tmp3,
        )
    }
}

/// Sensitivity residual combination over an explicit list of AD directions.
///
/// Slot `p` of `ys`, `ys_dot` and `res_s` belongs to the `p`-th direction
/// yielded by `directions`. [`UnitOperation::residual_sens_fwd_combine`]
/// calls this with the directions of the unit's own sensitive parameters; a
/// network of units calls it with the directions of the whole network, so
/// that a unit not owning parameter `p` still contributes `J · ys[p]`.
///
/// # Errors
///
/// `BufferSize` on any length mismatch.
#[allow(clippy::too_many_arguments)]
pub fn combine_sensitivity_directions<U, I>(
    unit: &U,
    directions: I,
    t: f64,
    sec: usize,
    time_factor: f64,
    y: &[f64],
    y_dot: &[f64],
    ys: &[&[f64]],
    ys_dot: &[&[f64]],
    res_s: &mut [&mut [f64]],
    ad_res: &[Active],
    tmp1: &mut [f64],
    tmp2: &mut [f64],
    tmp3: &mut [f64],
) -> CoreResult<()>
where
    U: ExportSolution + ResidualAssembly + ?Sized,
    I: ExactSizeIterator<Item = usize>,
{
    let n = unit.num_dofs();
    let ns = directions.len();

    CoreError::check_len("ys", ns, ys.len())?;
    CoreError::check_len("ys_dot", ns, ys_dot.len())?;
    CoreError::check_len("res_s", ns, res_s.len())?;
    CoreError::check_len("y", n, y.len())?;
    CoreError::check_len("y_dot", n, y_dot.len())?;
    CoreError::check_len("ad_res", n, ad_res.len())?;
    CoreError::check_len("tmp1", n, tmp1.len())?;
    CoreError::check_len("tmp2", n, tmp2.len())?;
    CoreError::check_len("tmp3", n, tmp3.len())?;

    for (p, direction) in directions.enumerate() {
        CoreError::check_len("ys[p]", n, ys[p].len())?;
        CoreError::check_len("ys_dot[p]", n, ys_dot[p].len())?;
        CoreError::check_len("res_s[p]", n, res_s[p].len())?;

        unit.multiply_with_jacobian(t, sec, y, y_dot, ys[p], tmp1)?;
        unit.multiply_with_derivative_jacobian(t, sec, y, y_dot, ys_dot[p], tmp2)?;
        for (d, cell) in tmp3.iter_mut().zip(ad_res) {
            *d = cell.derivative(direction);
        }

        for (i, r) in res_s[p].iter_mut().enumerate() {
            *r = tmp1[i] + time_factor * tmp2[i] + tmp3[i];
        }
    }
    Ok(())
}
