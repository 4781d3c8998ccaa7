//! Inlet boundary condition with a piecewise cubic profile.
//!
//! The inlet owns one DOF per component: the concentration it delivers. In
//! section `s` starting at `t_s` the profile is
//!
//! ```text
//! c_i(t) = a_i + b_i τ + c_i τ² + d_i τ³,   τ = t - t_s
//! ```
//!
//! and the residual is `y_i - c_i(t)`.

use chroma_core::registry::{ParamHandle, ParameterRegistry};
use chroma_core::solution::{BlockLayout, StateLayout, StateOrdering};
use chroma_core::traits::{ExportSolution, ParameterProvider, ResidualAssembly, UnitOperation};
use chroma_core::types::{
    Active, AdConfig, CoreError, CoreResult, ParameterId, ParameterName, ResidualScalar, UnitOpIdx,
};

use crate::config::InletConfig;
use crate::error::ModelResult;

/// Coefficient handles of one section, per component.
#[derive(Clone, Debug)]
struct SectionCoeffs {
    constant: Vec<ParamHandle>,
    linear: Vec<ParamHandle>,
    quadratic: Vec<ParamHandle>,
    cubic: Vec<ParamHandle>,
}

/// Piecewise cubic polynomial inlet.
#[derive(Clone, Debug)]
pub struct Inlet {
    registry: ParameterRegistry,
    layout: StateLayout,
    ncomp: usize,
    section_times: Vec<f64>,
    sections: Vec<SectionCoeffs>,
}

fn coeff_or_zero(values: &[f64], comp: usize) -> f64 {
    values.get(comp).copied().unwrap_or(0.0)
}

impl Inlet {
    /// Builds the inlet and registers `CONST_COEFF`, `LIN_COEFF`,
    /// `QUAD_COEFF` and `CUBE_COEFF` per component and section.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration does not match `section_times`.
    pub fn new(
        unit: UnitOpIdx,
        cfg: &InletConfig,
        section_times: &[f64],
        ad: AdConfig,
    ) -> ModelResult<Self> {
        cfg.validate(section_times.len().saturating_sub(1))?;
        let ncomp = cfg.ncomp;
        let mut registry = ParameterRegistry::new(unit, ad);

        let mut sections = Vec::with_capacity(cfg.sections.len());
        for (sec, sec_cfg) in cfg.sections.iter().enumerate() {
            let mut register = |name: ParameterName, values: &[f64]| -> CoreResult<Vec<ParamHandle>> {
                (0..ncomp)
                    .map(|comp| {
                        let id = ParameterId::new(name)
                            .unit(unit)
                            .component(comp as u32)
                            .section(sec as u32);
                        registry.register(id, coeff_or_zero(values, comp))
                    })
                    .collect()
            };
            sections.push(SectionCoeffs {
                constant: register(ParameterName::ConstCoeff, &sec_cfg.const_coeff)?,
                linear: register(ParameterName::LinCoeff, &sec_cfg.lin_coeff)?,
                quadratic: register(ParameterName::QuadCoeff, &sec_cfg.quad_coeff)?,
                cubic: register(ParameterName::CubeCoeff, &sec_cfg.cube_coeff)?,
            });
        }

        let layout = StateLayout::builder(ncomp)
            .bulk(BlockLayout::dense(0, &[StateOrdering::Component], &[ncomp]))
            .outlet(0, 1)
            .build()?;

        Ok(Self {
            registry,
            layout,
            ncomp,
            section_times: section_times.to_vec(),
            sections,
        })
    }

    /// Number of components.
    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    fn section(&self, sec: usize) -> CoreResult<(&SectionCoeffs, f64)> {
        match (self.sections.get(sec), self.section_times.get(sec)) {
            (Some(coeffs), Some(start)) => Ok((coeffs, *start)),
            _ => Err(CoreError::InvalidState(format!(
                "Inlet has {} sections, section {} requested",
                self.sections.len(),
                sec
            ))),
        }
    }

    /// Profile value of every component, Horner form.
    fn profile<S: ResidualScalar>(&self, t: f64, sec: usize, out: &mut [S]) -> CoreResult<()> {
        let (coeffs, start) = self.section(sec)?;
        let tau = t - start;
        let cell = |h: ParamHandle| S::from_cell(self.registry.cell(h));
        for (comp, o) in out.iter_mut().enumerate().take(self.ncomp) {
            *o = ((cell(coeffs.cubic[comp]) * tau + cell(coeffs.quadratic[comp])) * tau
                + cell(coeffs.linear[comp]))
                * tau
                + cell(coeffs.constant[comp]);
        }
        Ok(())
    }

    /// Inlet concentrations at `t` in section `sec`.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `sec` is not a section of the time line.
    pub fn concentrations(&self, t: f64, sec: usize) -> CoreResult<Vec<f64>> {
        let mut out = vec![0.0; self.ncomp];
        self.profile(t, sec, &mut out)?;
        Ok(out)
    }

    fn check_buffers(&self, bufs: &[(&'static str, usize)]) -> CoreResult<()> {
        bufs.iter()
            .try_for_each(|(what, len)| CoreError::check_len(*what, self.ncomp, *len))
    }

    /// Consistent initial state at the start of the time line.
    pub fn initial_state(&self, out: &mut [f64]) -> CoreResult<()> {
        CoreError::check_len("state", self.ncomp, out.len())?;
        let t0 = self.section_times.first().copied().unwrap_or(0.0);
        self.profile(t0, 0, out)
    }
}

impl ParameterProvider for Inlet {
    fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut ParameterRegistry {
        &mut self.registry
    }
}

impl ExportSolution for Inlet {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }
}

impl ResidualAssembly for Inlet {
    fn residual(&self, t: f64, sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64]) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.profile(t, sec, res)?;
        for (r, v) in res.iter_mut().zip(y) {
            *r = v - *r;
        }
        Ok(())
    }

    fn residual_ad(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        res: &mut [Active],
    ) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.profile(t, sec, res)?;
        for (r, v) in res.iter_mut().zip(y) {
            *r = *v - std::mem::take(r);
        }
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
        out.copy_from_slice(x);
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
        out.fill(0.0);
        Ok(())
    }
}

impl UnitOperation for Inlet {
    fn unit_type(&self) -> &'static str {
        "INLET"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationConfig, UnitConfig};
    use approx::assert_relative_eq;

    fn benchmark_inlet(directions: usize) -> Inlet {
        let cfg = SimulationConfig::linear_benchmark(false);
        let UnitConfig::Inlet(inlet) = &cfg.model.units[1] else {
            panic!("unit 1 is the inlet");
        };
        Inlet::new(1, inlet, &cfg.solver.section_times, AdConfig::new(directions)).unwrap()
    }

    #[test]
    fn test_profile_per_section() {
        let inlet = benchmark_inlet(0);
        assert_eq!(inlet.concentrations(5.0, 0).unwrap(), vec![5.0, 10.0]);
        assert_eq!(inlet.concentrations(50.0, 1).unwrap(), vec![10.0, 20.0]);
        let gradient = inlet.concentrations(1500.0, 2).unwrap();
        assert_relative_eq!(gradient[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(gradient[1], 0.0, epsilon = 1e-12);
        assert!(inlet.concentrations(0.0, 3).is_err());
    }

    #[test]
    fn test_layout_has_outlet_only() {
        let inlet = benchmark_inlet(0);
        let state = [1.0, 2.0];
        let ex = inlet.exporter(&state).unwrap();
        assert_eq!(ex.num_bulk_dofs(), 2);
        assert!(ex.inlet().is_empty());
        assert_eq!(ex.outlet().to_vec(), vec![1.0, 2.0]);
        assert!(!ex.has_particle_flux());
        assert!(!ex.has_solid_phase());
        assert_eq!(ex.num_axial_cells(), 0);
    }

    #[test]
    fn test_residual_is_state_minus_profile() {
        let inlet = benchmark_inlet(0);
        let mut res = [0.0; 2];
        inlet.residual(4.0, 0, &[4.0, 10.0], &[0.0; 2], &mut res).unwrap();
        assert_eq!(res, [0.0, 2.0]);
    }

    #[test]
    fn test_rejects_mismatched_buffers() {
        let inlet = benchmark_inlet(1);
        let mut res = [0.0; 2];
        let err = inlet.residual(0.0, 0, &[], &[0.0; 2], &mut res).unwrap_err();
        assert!(matches!(err, CoreError::BufferSize { what: "y", expected: 2, got: 0 }));
        let err = inlet.residual(0.0, 0, &[0.0; 2], &[0.0], &mut res).unwrap_err();
        assert!(matches!(err, CoreError::BufferSize { what: "y_dot", .. }));

        let mut ad_res = vec![Active::default(); 2];
        let err = inlet.residual_ad(0.0, 0, &[0.0; 3], &[0.0; 2], &mut ad_res).unwrap_err();
        assert!(err.is_invalid_state());

        let mut out = [0.0; 2];
        let err = inlet
            .multiply_with_jacobian(0.0, 0, &[0.0; 2], &[0.0; 2], &[], &mut out)
            .unwrap_err();
        assert!(matches!(err, CoreError::BufferSize { what: "x", .. }));
        let err = inlet
            .multiply_with_derivative_jacobian(0.0, 0, &[0.0; 2], &[0.0; 2], &[0.0], &mut out)
            .unwrap_err();
        assert!(matches!(err, CoreError::BufferSize { what: "x", .. }));
    }

    #[test]
    fn test_coefficient_sensitivity() {
        let mut inlet = benchmark_inlet(2);
        let lin = ParameterId::new(ParameterName::LinCoeff).unit(1).component(0).section(0);
        let cst = ParameterId::new(ParameterName::ConstCoeff).unit(1).component(1).section(0);
        assert!(inlet.set_sensitive_parameter(&lin, 0, 1.0).unwrap());
        assert!(inlet.set_sensitive_parameter(&cst, 1, 1.0).unwrap());

        let mut res = vec![Active::default(); 2];
        inlet.residual_ad(3.0, 0, &[0.0, 0.0], &[0.0; 2], &mut res).unwrap();
        // d(y - (a + b τ))/db = -τ, d/da = -1
        assert_eq!(res[0].derivative(0), -3.0);
        assert_eq!(res[0].derivative(1), 0.0);
        assert_eq!(res[1].derivative(1), -1.0);
        assert_eq!(res[1].value(), -6.0);
    }

    #[test]
    fn test_coefficients_of_other_sections_are_not_shared() {
        let inlet = benchmark_inlet(0);
        let values = inlet.all_parameter_values();
        // four coefficients per component and section
        assert_eq!(values.len(), 4 * 2 * 3);
        let id = ParameterId::new(ParameterName::ConstCoeff).unit(1).component(1).section(2);
        assert_eq!(values[&id], 20.0);
    }
}
