//! Integration tests: configuration files, unit layouts and the coupled
//! network.

use approx::assert_relative_eq;
use chroma_core::solution::StateOrdering;
use chroma_core::traits::{ExportSolution, ParameterProvider, ResidualAssembly, UnitOperation};
use chroma_core::types::{Active, AdConfig, ParameterId, ParameterName};
use chroma_models::config::{
    GeneralRateConfig, ParticleDiscretization, SensitivityParameterConfig, SimulationConfig, UnitConfig,
};
use chroma_models::system::ModelSystem;
use chroma_models::units::{GeneralRateModel, UnitOperationEnum};
use proptest::prelude::*;

const TANK_CASE: &str = r#"
[model]

[[model.units]]
unit_type = "INLET"
ncomp = 1
inlet_type = "PIECEWISE_CUBIC_POLY"

[[model.units.sections]]
const_coeff = [2.0]

[[model.units]]
unit_type = "CSTR"
ncomp = 1
flowrate_in = 0.5
flowrate_out = 0.5
init_c = [0.0]
init_volume = 4.0

[[model.switches]]
section = 0

[[model.switches.connections]]
from = 0
to = 1

[solver]
section_times = [0.0, 100.0]

[[sensitivity.parameters]]
name = "FLOWRATE_IN"
unit = 1
"#;

fn column_config(ncomp: usize, ncol: usize, npar: usize, disc: ParticleDiscretization) -> GeneralRateConfig {
    let cfg = SimulationConfig::linear_benchmark(false);
    let UnitConfig::GeneralRateModel(mut grm) = cfg.model.units[0].clone() else {
        panic!("unit 0 is the column");
    };
    grm.ncomp = ncomp;
    grm.film_diffusion = vec![6.9e-6; ncomp];
    grm.par_diffusion = vec![7e-10; ncomp];
    grm.par_surfdiffusion = vec![1e-10; ncomp];
    grm.init_c = vec![0.0; ncomp];
    grm.init_q = vec![0.0; ncomp];
    grm.adsorption.lin_ka = vec![1.0; ncomp];
    grm.adsorption.lin_kd = vec![1.0; ncomp];
    grm.discretization.ncol = ncol;
    grm.discretization.npar = npar;
    grm.discretization.nbound = vec![1; ncomp];
    grm.discretization.par_disc_type = disc;
    grm
}

#[test]
fn test_benchmark_survives_toml() {
    let cfg = SimulationConfig::linear_benchmark(true);
    let text = toml::to_string(&cfg).unwrap();
    assert!(text.contains("GENERAL_RATE_MODEL"));
    let parsed: SimulationConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, cfg);

    let system = ModelSystem::from_config(&parsed).unwrap();
    assert_eq!(system.num_dofs(), 204);
    assert_eq!(system.units()[0].unit_type(), "GENERAL_RATE_MODEL");
}

#[test]
fn test_tank_case_from_toml() {
    let cfg: SimulationConfig = toml::from_str(TANK_CASE).unwrap();
    let system = ModelSystem::from_config(&cfg).unwrap();
    assert_eq!(system.num_units(), 2);
    assert_eq!(system.num_sens_params(), 1);
    assert_eq!(
        system.sensitive_parameters()[0].id,
        ParameterId::new(ParameterName::FlowrateIn).unit(1)
    );

    let y = system.initial_state().unwrap();
    let tank = system.unit_range(1).unwrap();
    let exporters = system.exporters(&y).unwrap();
    assert_eq!(exporters[1].inlet().to_vec(), vec![2.0]);
    assert_eq!(exporters[1].volume(), &[4.0]);
    assert_eq!(y[tank.start], 2.0);

    // d/dF_in of the tank: bulk row -c_in, volume row -1
    let n = system.num_dofs();
    let mut ad = vec![Active::default(); n];
    system.residual_ad(0.0, 0, &y, &vec![0.0; n], &mut ad).unwrap();
    assert_eq!(ad[tank.start + 1].derivative(0), -2.0);
    assert_eq!(ad[tank.end - 1].derivative(0), -1.0);
}

#[test]
fn test_network_residual_matches_jacobian_products() {
    let system = ModelSystem::from_config(&SimulationConfig::linear_benchmark(true)).unwrap();
    let n = system.num_dofs();
    let y: Vec<f64> = (0..n).map(|i| ((i * 31) % 17) as f64 / 17.0).collect();
    let y_dot: Vec<f64> = (0..n).map(|i| ((i * 13) % 7) as f64 / 7.0).collect();
    // section 1 has a constant inlet, so the inlet residual is affine in y
    let sec = 1;
    let mut full = vec![0.0; n];
    system.residual(50.0, sec, &y, &y_dot, &mut full).unwrap();
    let mut zero_res = vec![0.0; n];
    system.residual(50.0, sec, &vec![0.0; n], &vec![0.0; n], &mut zero_res).unwrap();
    let mut jy = vec![0.0; n];
    system.multiply_with_jacobian(50.0, sec, &y, &y_dot, &y, &mut jy).unwrap();
    let mut jdy = vec![0.0; n];
    system
        .multiply_with_derivative_jacobian(50.0, sec, &y, &y_dot, &y_dot, &mut jdy)
        .unwrap();
    for i in 0..n {
        assert_relative_eq!(full[i], zero_res[i] + jy[i] + jdy[i], max_relative = 1e-10, epsilon = 1e-12);
    }
}

#[test]
fn test_sensitivity_combination_is_thread_count_independent() {
    let mut cfg = SimulationConfig::linear_benchmark(true);
    cfg.sensitivity.parameters = vec![
        SensitivityParameterConfig::new(ParameterId::new(ParameterName::ColPorosity).unit(0)),
        SensitivityParameterConfig::new(ParameterId::new(ParameterName::LinKa).unit(0).component(1).bound_state(0)),
    ];
    let system = ModelSystem::from_config(&cfg).unwrap();
    let n = system.num_dofs();
    let y: Vec<f64> = (0..n).map(|i| (i % 5) as f64).collect();
    let y_dot = vec![0.1; n];
    let s: Vec<Vec<f64>> = (0..2).map(|p| (0..n).map(|i| ((i + p) % 3) as f64).collect()).collect();
    let mut ad = vec![Active::default(); n];
    system.residual_ad(20.0, 1, &y, &y_dot, &mut ad).unwrap();

    let run = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
        pool.install(|| {
            let mut out = vec![vec![0.0; n]; 2];
            let (mut t1, mut t2, mut t3) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
            let ys: Vec<&[f64]> = s.iter().map(Vec::as_slice).collect();
            let mut res_s: Vec<&mut [f64]> = out.iter_mut().map(Vec::as_mut_slice).collect();
            system
                .residual_sens_fwd_combine(20.0, 1, 0.5, &y, &y_dot, &ys, &ys, &mut res_s, &ad, &mut t1, &mut t2, &mut t3)
                .unwrap();
            out
        })
    };
    assert_eq!(run(1), run(4));
}

#[test]
fn test_unit_trait_objects_from_enum() {
    let cfg = SimulationConfig::linear_benchmark(false);
    let units: Vec<Box<dyn UnitOperation>> = cfg
        .model
        .units
        .iter()
        .enumerate()
        .map(|(k, u)| {
            Box::new(UnitOperationEnum::from_config(k as u32, u, &cfg.solver.section_times, AdConfig::new(1)).unwrap())
                as Box<dyn UnitOperation>
        })
        .collect();
    let total: usize = units.iter().map(|u| u.num_dofs()).sum();
    assert_eq!(total, 204);
    assert_eq!(units[1].unit_operation_id(), 1);
}

proptest! {
    #[test]
    fn test_column_ordering_products(
        ncomp in 1usize..4,
        ncol in 1usize..12,
        npar in 1usize..6,
        equivolume in any::<bool>(),
    ) {
        let disc = if equivolume { ParticleDiscretization::Equivolume } else { ParticleDiscretization::Equidistant };
        let grm = GeneralRateModel::new(0, &column_config(ncomp, ncol, npar, disc), AdConfig::new(0)).unwrap();
        prop_assert_eq!(grm.num_dofs(), ncomp + ncomp * ncol + ncol * npar * 2 * ncomp + ncomp * ncol);

        let y = vec![0.0; grm.num_dofs()];
        let ex = grm.exporter(&y).unwrap();
        let product = |ordering: &[StateOrdering]| -> usize {
            ordering.iter().map(|t| grm.layout().extent(*t)).product()
        };
        prop_assert_eq!(product(ex.concentration_ordering()), ex.num_bulk_dofs());
        prop_assert_eq!(product(ex.flux_ordering()), ex.num_flux_dofs());
        prop_assert_eq!(product(ex.mobile_phase_ordering()), ex.num_particle_mobile_phase_dofs());
        prop_assert_eq!(product(ex.solid_phase_ordering()), ex.num_solid_phase_dofs());
        prop_assert_eq!(ex.outlet().len(), ncomp);
    }

    #[test]
    fn test_column_steady_under_uniform_equilibrium(
        ncol in 1usize..8,
        npar in 1usize..5,
        c in 0.0f64..10.0,
    ) {
        let grm = GeneralRateModel::new(
            0,
            &column_config(1, ncol, npar, ParticleDiscretization::Equivolume),
            AdConfig::new(0),
        )
        .unwrap();
        let n = grm.num_dofs();
        // ka == kd, so q == c
        let mut y = vec![c; n];
        let flux_start = n - ncol;
        for v in &mut y[flux_start..] {
            *v = 0.0;
        }
        let mut res = vec![0.0; n];
        grm.residual(0.0, 0, &y, &vec![0.0; n], &mut res).unwrap();
        prop_assert!((res[0] - c).abs() < 1e-12);
        for r in &res[1..] {
            prop_assert!(r.abs() < 1e-9 * (1.0 + c));
        }
    }
}
