//! Integration tests of the unit operation contract with a minimal
//! convection-only column.

use approx::assert_relative_eq;
use chroma_core::registry::{ParamHandle, ParameterRegistry};
use chroma_core::solution::{BlockLayout, StateLayout, StateOrdering};
use chroma_core::traits::{ExportSolution, ParameterProvider, ResidualAssembly, UnitOperation};
use chroma_core::types::{Active, AdConfig, CoreResult, ParameterId, ParameterName};
use proptest::prelude::*;

/// `ċ_k + u (c_k - c_{k-1}) / h = 0` on `ncol` cells, bulk ordered
/// `[AxialCell, Component]` or `[Component, AxialCell]`.
struct Convection {
    registry: ParameterRegistry,
    layout: StateLayout,
    velocity: ParamHandle,
    ncomp: usize,
    ncol: usize,
    cell_major: bool,
}

impl Convection {
    fn new(ncomp: usize, ncol: usize, cell_major: bool) -> Self {
        let mut registry = ParameterRegistry::new(0, AdConfig::new(4));
        let velocity = registry
            .register(ParameterId::new(ParameterName::Velocity).unit(0), 5.75e-4)
            .unwrap();
        let bulk = if cell_major {
            BlockLayout::dense(0, &[StateOrdering::AxialCell, StateOrdering::Component], &[ncol, ncomp])
        } else {
            BlockLayout::dense(0, &[StateOrdering::Component, StateOrdering::AxialCell], &[ncomp, ncol])
        };
        let layout = StateLayout::builder(ncomp)
            .axial_cells(ncol)
            .bulk(bulk)
            .build()
            .unwrap();
        Self {
            registry,
            layout,
            velocity,
            ncomp,
            ncol,
            cell_major,
        }
    }

    fn idx(&self, comp: usize, cell: usize) -> usize {
        if self.cell_major {
            cell * self.ncomp + comp
        } else {
            comp * self.ncol + cell
        }
    }
}

impl ParameterProvider for Convection {
    fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut ParameterRegistry {
        &mut self.registry
    }
}

impl ExportSolution for Convection {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }
}

impl ResidualAssembly for Convection {
    fn residual(&self, _t: f64, _sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64]) -> CoreResult<()> {
        let u = self.registry.value(self.velocity);
        for comp in 0..self.ncomp {
            for cell in 0..self.ncol {
                let i = self.idx(comp, cell);
                let upstream = if cell == 0 { 0.0 } else { y[self.idx(comp, cell - 1)] };
                res[i] = y_dot[i] + u * (y[i] - upstream);
            }
        }
        Ok(())
    }

    fn residual_ad(&self, _t: f64, _sec: usize, y: &[f64], y_dot: &[f64], res: &mut [Active]) -> CoreResult<()> {
        let u = self.registry.cell(self.velocity);
        for comp in 0..self.ncomp {
            for cell in 0..self.ncol {
                let i = self.idx(comp, cell);
                let upstream = if cell == 0 { 0.0 } else { y[self.idx(comp, cell - 1)] };
                res[i] = u.clone() * (y[i] - upstream) + y_dot[i];
            }
        }
        Ok(())
    }

    fn multiply_with_jacobian(
        &self,
        t: f64,
        sec: usize,
        _y: &[f64],
        _y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        let zeros = vec![0.0; x.len()];
        self.residual(t, sec, x, &zeros, out)
    }

    fn multiply_with_derivative_jacobian(
        &self,
        _t: f64,
        _sec: usize,
        _y: &[f64],
        _y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        out.copy_from_slice(x);
        Ok(())
    }
}

impl UnitOperation for Convection {
    fn unit_type(&self) -> &'static str {
        "CONVECTION"
    }
}

fn velocity_id() -> ParameterId {
    ParameterId::new(ParameterName::Velocity).unit(0)
}

#[test]
fn test_velocity_sensitivity_reads_ad_residual_direction() {
    let mut unit = Convection::new(2, 10, true);
    assert!(unit.set_sensitive_parameter(&velocity_id(), 2, 1.0).unwrap());
    assert_eq!(unit.num_sens_params(), 1);

    let n = unit.num_dofs();
    let zeros = vec![0.0; n];

    let mut seeded = Active::new(0.0, AdConfig::new(4));
    seeded.set_derivative(2, 3.0).unwrap();
    let ad_res = vec![seeded; n];

    let mut res_s = vec![1.0; n];
    let (mut tmp1, mut tmp2, mut tmp3) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    unit.residual_sens_fwd_combine(
        0.0,
        0,
        0.0,
        &zeros,
        &zeros,
        &[zeros.as_slice()],
        &[zeros.as_slice()],
        &mut [res_s.as_mut_slice()],
        &ad_res,
        &mut tmp1,
        &mut tmp2,
        &mut tmp3,
    )
    .unwrap();

    assert_eq!(res_s[0], 3.0);
    assert!(res_s.iter().all(|r| *r == 3.0));
}

#[test]
fn test_combine_equals_directional_derivative_of_residual() {
    let mut unit = Convection::new(2, 4, false);
    unit.set_sensitive_parameter(&velocity_id(), 0, 1.0).unwrap();
    let n = unit.num_dofs();

    let y: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 * 0.1).collect();
    let y_dot = vec![0.0; n];
    let s: Vec<f64> = (0..n).map(|i| (i % 3) as f64).collect();
    let s_dot = vec![0.5; n];

    let mut ad_res = vec![Active::default(); n];
    unit.residual_ad(0.0, 0, &y, &y_dot, &mut ad_res).unwrap();

    let mut res_s = vec![0.0; n];
    let (mut tmp1, mut tmp2, mut tmp3) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    unit.residual_sens_fwd_combine(
        0.0,
        0,
        1.0,
        &y,
        &y_dot,
        &[s.as_slice()],
        &[s_dot.as_slice()],
        &mut [res_s.as_mut_slice()],
        &ad_res,
        &mut tmp1,
        &mut tmp2,
        &mut tmp3,
    )
    .unwrap();

    // Central difference of F(y + h s, y_dot + h s_dot, u + h)
    let h = 1e-6;
    let u = unit.parameter_double(&velocity_id()).unwrap();
    let eval = |unit: &mut Convection, sign: f64| {
        unit.set_sensitive_parameter_value(&velocity_id(), u + sign * h).unwrap();
        let yp: Vec<f64> = y.iter().zip(&s).map(|(a, b)| a + sign * h * b).collect();
        let ydp: Vec<f64> = y_dot.iter().zip(&s_dot).map(|(a, b)| a + sign * h * b).collect();
        let mut r = vec![0.0; n];
        unit.residual(0.0, 0, &yp, &ydp, &mut r).unwrap();
        r
    };
    let plus = eval(&mut unit, 1.0);
    let minus = eval(&mut unit, -1.0);
    for i in 0..n {
        let fd = (plus[i] - minus[i]) / (2.0 * h);
        assert_relative_eq!(res_s[i], fd, epsilon = 1e-6);
    }
}

#[test]
fn test_exporter_follows_configured_ordering() {
    for cell_major in [true, false] {
        let unit = Convection::new(2, 10, cell_major);
        let state: Vec<f64> = (0..unit.num_dofs()).map(|i| i as f64).collect();
        let exporter = unit.exporter(&state).unwrap();

        assert_eq!(exporter.num_bulk_dofs(), 20);
        assert_eq!(exporter.concentration().len(), 20);
        assert!(exporter.flux().is_empty());
        assert!(exporter.flux_ordering().is_empty());
        for comp in 0..2 {
            for cell in 0..10 {
                assert_eq!(exporter.concentration_at(comp, cell), unit.idx(comp, cell) as f64);
            }
        }
        let expected_stride = if cell_major { 2 } else { 10 };
        assert_eq!(exporter.bulk_mobile_phase_stride(), expected_stride);
    }
}

#[test]
fn test_exporter_rejects_short_buffer() {
    let unit = Convection::new(2, 10, true);
    let state = vec![0.0; 19];
    assert!(unit.exporter(&state).unwrap_err().is_invalid_state());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ordering_product_equals_block_dofs(ncomp in 1usize..5, ncol in 1usize..20, cell_major: bool) {
        let unit = Convection::new(ncomp, ncol, cell_major);
        let state = vec![0.0; unit.num_dofs()];
        let exporter = unit.exporter(&state).unwrap();
        let product: usize = exporter
            .concentration_ordering()
            .iter()
            .map(|tag| unit.layout().extent(*tag))
            .product();
        prop_assert_eq!(product, exporter.num_bulk_dofs());
        prop_assert_eq!(exporter.num_particle_mobile_phase_dofs(), 0);
        prop_assert!(exporter.mobile_phase_ordering().is_empty());
    }

    #[test]
    fn prop_sensitive_count_tracks_distinct_parameters(directions in proptest::collection::vec(0usize..4, 1..8)) {
        let mut unit = Convection::new(1, 2, true);
        for d in &directions {
            prop_assert!(unit.set_sensitive_parameter(&velocity_id(), *d, 1.0).unwrap());
        }
        prop_assert_eq!(unit.num_sens_params(), 1);
        let last = *directions.last().unwrap();
        prop_assert_eq!(unit.registry().sensitive_parameters()[0].direction, last);
        unit.clear_sens_params();
        prop_assert_eq!(unit.num_sens_params(), 0);
    }
}
