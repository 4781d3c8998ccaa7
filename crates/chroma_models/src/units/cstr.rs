//! Continuous stirred tank reactor with linear binding and a variable
//! liquid volume.
//!
//! State: `[c_in (ncomp) | c (ncomp) | q (nbound) | V]`. With
//! `β = (1 - ε) / ε` the residuals are
//!
//! ```text
//! inlet:  c_in_i
//! bulk:   V ċ_i + V̇ c_i + V β Σ_b q̇_ib - F_in c_in_i + F_out c_i
//! bound:  q̇_ib - (ka c_i - kd q_ib)      (kinetic)
//!         kd q_ib - ka c_i                (quasi-stationary)
//! volume: V̇ - F_in + F_out
//! ```
//!
//! The bulk equation is bilinear in `V` and `c`, so the Jacobian-vector
//! products are assembled analytically.

use chroma_core::registry::{ParamHandle, ParameterRegistry};
use chroma_core::solution::{BlockLayout, StateLayout, StateOrdering};
use chroma_core::traits::{ExportSolution, ParameterProvider, ResidualAssembly, UnitOperation};
use chroma_core::types::{
    Active, AdConfig, CoreError, CoreResult, ParameterId, ParameterName, ResidualScalar, UnitOpIdx,
};

use crate::config::{AdsorptionModel, CstrConfig};
use crate::error::ModelResult;

/// Bound state `b` of component `comp` with its binding constants.
#[derive(Clone, Copy, Debug)]
struct BoundState {
    comp: usize,
    ka: ParamHandle,
    kd: ParamHandle,
}

/// Stirred tank.
#[derive(Clone, Debug)]
pub struct Cstr {
    registry: ParameterRegistry,
    layout: StateLayout,
    ncomp: usize,
    is_kinetic: bool,
    porosity: ParamHandle,
    flow_in: ParamHandle,
    flow_out: ParamHandle,
    bound: Vec<BoundState>,
    init_c: Vec<f64>,
    init_q: Vec<f64>,
    init_volume: f64,
}

impl Cstr {
    /// Builds the tank and registers `POROSITY`, `FLOWRATE_IN`,
    /// `FLOWRATE_OUT` and, per bound state, `LIN_KA` / `LIN_KD`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on inconsistent dimensions.
    pub fn new(unit: UnitOpIdx, cfg: &CstrConfig, ad: AdConfig) -> ModelResult<Self> {
        cfg.validate()?;
        let ncomp = cfg.ncomp;
        let nbound = cfg.nbound();
        let total_bound: usize = nbound.iter().sum();

        let mut registry = ParameterRegistry::new(unit, ad);
        let porosity = registry.register(ParameterId::new(ParameterName::Porosity).unit(unit), cfg.porosity)?;
        let flow_in =
            registry.register(ParameterId::new(ParameterName::FlowrateIn).unit(unit), cfg.flowrate_in)?;
        let flow_out =
            registry.register(ParameterId::new(ParameterName::FlowrateOut).unit(unit), cfg.flowrate_out)?;

        let mut bound = Vec::with_capacity(total_bound);
        if cfg.adsorption.adsorption_model == AdsorptionModel::Linear {
            for (comp, n) in nbound.iter().enumerate() {
                for b in 0..*n {
                    let flat = bound.len();
                    let id = |name| {
                        ParameterId::new(name)
                            .unit(unit)
                            .component(comp as u32)
                            .bound_state(b as u32)
                    };
                    let ka = registry.register(id(ParameterName::LinKa), cfg.adsorption.lin_ka[flat])?;
                    let kd = registry.register(id(ParameterName::LinKd), cfg.adsorption.lin_kd[flat])?;
                    bound.push(BoundState { comp, ka, kd });
                }
            }
        }

        let mut builder = StateLayout::builder(ncomp)
            .axial_cells(1)
            .bound_states(nbound)
            .inlet(0, 1)
            .outlet(ncomp, 1)
            .bulk(BlockLayout::dense(ncomp, &[StateOrdering::Component], &[ncomp]))
            .volume(2 * ncomp + total_bound, 1);
        if total_bound > 0 {
            builder = builder.solid_phase(BlockLayout::dense(
                2 * ncomp,
                &[StateOrdering::BoundState],
                &[total_bound],
            ));
        }
        let layout = builder.build()?;

        Ok(Self {
            registry,
            layout,
            ncomp,
            is_kinetic: cfg.adsorption.is_kinetic,
            porosity,
            flow_in,
            flow_out,
            bound,
            init_c: cfg.init_c.clone(),
            init_q: cfg.init_q.clone(),
            init_volume: cfg.init_volume,
        })
    }

    #[inline]
    fn q_offset(&self) -> usize {
        2 * self.ncomp
    }

    #[inline]
    fn volume_index(&self) -> usize {
        2 * self.ncomp + self.bound.len()
    }

    fn param<S: ResidualScalar>(&self, h: ParamHandle) -> S {
        S::from_cell(self.registry.cell(h))
    }

    fn check_buffers(&self, bufs: &[(&'static str, usize)]) -> CoreResult<()> {
        let n = self.num_dofs();
        bufs.iter()
            .try_for_each(|(what, len)| CoreError::check_len(*what, n, *len))
    }

    fn assemble<S: ResidualScalar>(&self, y: &[f64], y_dot: &[f64], res: &mut [S]) {
        let n = self.ncomp;
        let qo = self.q_offset();
        let vi = self.volume_index();
        let eps: S = self.param(self.porosity);
        let f_in: S = self.param(self.flow_in);
        let f_out: S = self.param(self.flow_out);
        let beta = (S::from(1.0) - eps.clone()) / eps;
        let v = y[vi];
        let v_dot = y_dot[vi];

        for i in 0..n {
            res[i] = S::from(y[i]);
        }

        for i in 0..n {
            let c = y[n + i];
            let q_dot_sum: f64 = self
                .bound
                .iter()
                .enumerate()
                .filter(|(_, b)| b.comp == i)
                .map(|(flat, _)| y_dot[qo + flat])
                .sum();
            res[n + i] = S::from(v * y_dot[n + i] + v_dot * c) + beta.clone() * (v * q_dot_sum)
                - f_in.clone() * y[i]
                + f_out.clone() * c;
        }

        for (flat, b) in self.bound.iter().enumerate() {
            let c = y[n + b.comp];
            let q = y[qo + flat];
            let ka: S = self.param(b.ka);
            let kd: S = self.param(b.kd);
            let exchange = ka * c - kd * q;
            res[qo + flat] = if self.is_kinetic {
                -exchange + y_dot[qo + flat]
            } else {
                -exchange
            };
        }

        res[vi] = S::from(v_dot) - f_in + f_out;
    }

    /// Initial state: configured concentrations, bound states and volume.
    pub fn initial_state(&self, out: &mut [f64]) -> CoreResult<()> {
        self.check_buffers(&[("state", out.len())])?;
        out.fill(0.0);
        let n = self.ncomp;
        for (i, c) in self.init_c.iter().enumerate() {
            out[n + i] = *c;
        }
        let qo = self.q_offset();
        for (i, q) in self.init_q.iter().enumerate() {
            out[qo + i] = *q;
        }
        out[self.volume_index()] = self.init_volume;
        Ok(())
    }
}

impl ParameterProvider for Cstr {
    fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut ParameterRegistry {
        &mut self.registry
    }
}

impl ExportSolution for Cstr {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }
}

impl ResidualAssembly for Cstr {
    fn residual(&self, _t: f64, _sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64]) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.assemble(y, y_dot, res);
        Ok(())
    }

    fn residual_ad(
        &self,
        _t: f64,
        _sec: usize,
        y: &[f64],
        y_dot: &[f64],
        res: &mut [Active],
    ) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.assemble(y, y_dot, res);
        Ok(())
    }

    fn multiply_with_jacobian(
        &self,
        _t: f64,
        _sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("x", x.len()), ("out", out.len())])?;
        let n = self.ncomp;
        let qo = self.q_offset();
        let vi = self.volume_index();
        let eps = self.registry.value(self.porosity);
        let beta = (1.0 - eps) / eps;
        let f_in = self.registry.value(self.flow_in);
        let f_out = self.registry.value(self.flow_out);
        let v_dot = y_dot[vi];

        out[..n].copy_from_slice(&x[..n]);
        for i in 0..n {
            let q_dot_sum: f64 = self
                .bound
                .iter()
                .enumerate()
                .filter(|(_, b)| b.comp == i)
                .map(|(flat, _)| y_dot[qo + flat])
                .sum();
            // ∂/∂c_in, ∂/∂c, ∂/∂V
            out[n + i] = -f_in * x[i]
                + (v_dot + f_out) * x[n + i]
                + (y_dot[n + i] + beta * q_dot_sum) * x[vi];
        }
        for (flat, b) in self.bound.iter().enumerate() {
            let ka = self.registry.value(b.ka);
            let kd = self.registry.value(b.kd);
            out[qo + flat] = -ka * x[n + b.comp] + kd * x[qo + flat];
        }
        out[vi] = 0.0;
        Ok(())
    }

    fn multiply_with_derivative_jacobian(
        &self,
        _t: f64,
        _sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("x", x.len()), ("out", out.len())])?;
        let n = self.ncomp;
        let qo = self.q_offset();
        let vi = self.volume_index();
        let eps = self.registry.value(self.porosity);
        let beta = (1.0 - eps) / eps;
        let v = y[vi];

        out[..n].fill(0.0);
        for i in 0..n {
            let q_dot_x: f64 = self
                .bound
                .iter()
                .enumerate()
                .filter(|(_, b)| b.comp == i)
                .map(|(flat, _)| x[qo + flat])
                .sum();
            out[n + i] = v * x[n + i] + y[n + i] * x[vi] + v * beta * q_dot_x;
        }
        for flat in 0..self.bound.len() {
            out[qo + flat] = if self.is_kinetic { x[qo + flat] } else { 0.0 };
        }
        out[vi] = x[vi];
        Ok(())
    }
}

impl UnitOperation for Cstr {
    fn unit_type(&self) -> &'static str {
        "CSTR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdsorptionConfig;
    use approx::assert_relative_eq;

    fn config(is_kinetic: bool) -> CstrConfig {
        CstrConfig {
            ncomp: 2,
            porosity: 0.8,
            flowrate_in: 1.5,
            flowrate_out: 1.0,
            nbound: vec![1, 0],
            init_c: vec![1.0, 2.0],
            init_q: vec![0.5],
            init_volume: 10.0,
            adsorption: AdsorptionConfig {
                adsorption_model: AdsorptionModel::Linear,
                is_kinetic,
                lin_ka: vec![2.0],
                lin_kd: vec![4.0],
            },
        }
    }

    fn state() -> (Vec<f64>, Vec<f64>) {
        // c_in, c, q, V
        let y = vec![3.0, 1.0, 0.7, 2.0, 0.4, 9.0];
        let y_dot = vec![0.0, 0.0, -0.2, 0.1, 0.05, 0.5];
        (y, y_dot)
    }

    #[test]
    fn test_layout() {
        let cstr = Cstr::new(2, &config(true), AdConfig::new(0)).unwrap();
        assert_eq!(cstr.num_dofs(), 6);
        let (y, _) = state();
        let ex = cstr.exporter(&y).unwrap();
        assert_eq!(ex.inlet().to_vec(), vec![3.0, 1.0]);
        assert_eq!(ex.outlet().to_vec(), vec![0.7, 2.0]);
        assert_eq!(ex.concentration(), &[0.7, 2.0]);
        assert_eq!(ex.solid_phase(), &[0.4]);
        assert_eq!(ex.solid_phase_at(0, 0, 0, 0), 0.4);
        assert_eq!(ex.volume(), &[9.0]);
        assert!(ex.has_non_binding_components());
        assert!(ex.has_volume());
        assert!(!ex.has_particle_mobile_phase());
        assert_eq!(ex.solid_phase_ordering(), &[StateOrdering::BoundState]);
    }

    #[test]
    fn test_initial_state() {
        let cstr = Cstr::new(0, &config(false), AdConfig::new(0)).unwrap();
        let mut y0 = vec![f64::NAN; 6];
        cstr.initial_state(&mut y0).unwrap();
        assert_eq!(y0, vec![0.0, 0.0, 1.0, 2.0, 0.5, 10.0]);
    }

    #[test]
    fn test_jacobian_products_match_finite_differences() {
        for kinetic in [true, false] {
            let cstr = Cstr::new(0, &config(kinetic), AdConfig::new(0)).unwrap();
            let (y, y_dot) = state();
            let x = vec![0.3, -0.1, 0.7, 0.2, -0.5, 1.1];
            let h = 1e-7;

            let mut jx = vec![0.0; 6];
            cstr.multiply_with_jacobian(0.0, 0, &y, &y_dot, &x, &mut jx).unwrap();
            let mut jdx = vec![0.0; 6];
            cstr.multiply_with_derivative_jacobian(0.0, 0, &y, &y_dot, &x, &mut jdx).unwrap();

            let eval = |y: &[f64], y_dot: &[f64]| {
                let mut r = vec![0.0; 6];
                cstr.residual(0.0, 0, y, y_dot, &mut r).unwrap();
                r
            };
            let shift = |v: &[f64], s: f64| -> Vec<f64> { v.iter().zip(&x).map(|(a, b)| a + s * b).collect() };

            let (rp, rm) = (eval(&shift(&y, h), &y_dot), eval(&shift(&y, -h), &y_dot));
            let (rdp, rdm) = (eval(&y, &shift(&y_dot, h)), eval(&y, &shift(&y_dot, -h)));
            for i in 0..6 {
                assert_relative_eq!(jx[i], (rp[i] - rm[i]) / (2.0 * h), epsilon = 1e-6);
                assert_relative_eq!(jdx[i], (rdp[i] - rdm[i]) / (2.0 * h), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_flowrate_sensitivity() {
        let mut cstr = Cstr::new(0, &config(true), AdConfig::new(1)).unwrap();
        let id = ParameterId::new(ParameterName::FlowrateIn).unit(0);
        assert!(cstr.set_sensitive_parameter(&id, 0, 1.0).unwrap());

        let (y, y_dot) = state();
        let mut res = vec![Active::default(); 6];
        cstr.residual_ad(0.0, 0, &y, &y_dot, &mut res).unwrap();

        // ∂/∂F_in: -c_in on the bulk rows, -1 on the volume row
        assert_eq!(res[2].derivative(0), -3.0);
        assert_eq!(res[3].derivative(0), -1.0);
        assert_eq!(res[5].derivative(0), -1.0);
        assert_eq!(res[4].derivative(0), 0.0);

        let mut plain = vec![0.0; 6];
        cstr.residual(0.0, 0, &y, &y_dot, &mut plain).unwrap();
        for (a, p) in res.iter().zip(&plain) {
            assert_relative_eq!(a.value(), *p, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_porosity_sensitivity_matches_finite_difference() {
        let mut cstr = Cstr::new(0, &config(true), AdConfig::new(1)).unwrap();
        let id = ParameterId::new(ParameterName::Porosity).unit(0);
        cstr.set_sensitive_parameter(&id, 0, 1.0).unwrap();
        let (y, y_dot) = state();
        let mut res = vec![Active::default(); 6];
        cstr.residual_ad(0.0, 0, &y, &y_dot, &mut res).unwrap();

        let h = 1e-7;
        let mut eval = |eps: f64| {
            cstr.set_parameter(&id, eps.into());
            let mut r = vec![0.0; 6];
            cstr.residual(0.0, 0, &y, &y_dot, &mut r).unwrap();
            r
        };
        let plus = eval(0.8 + h);
        let minus = eval(0.8 - h);
        assert_relative_eq!(res[2].derivative(0), (plus[2] - minus[2]) / (2.0 * h), epsilon = 1e-6);
    }

    #[test]
    fn test_unknown_binding_id_is_soft_miss() {
        let mut cstr = Cstr::new(0, &config(true), AdConfig::new(1)).unwrap();
        let id = ParameterId::new(ParameterName::LinKa).unit(0).component(1).bound_state(0);
        assert!(!cstr.has_parameter(&id));
        assert!(!cstr.set_sensitive_parameter(&id, 0, 1.0).unwrap());
        assert_eq!(cstr.num_sens_params(), 0);
    }
}
