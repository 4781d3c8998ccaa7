//! Sens command implementation
//!
//! Activates the sensitivities of a simulation file and evaluates the
//! forward sensitivity residuals at the consistent initial state, with zero
//! state sensitivities. Each residual is then the partial derivative of the
//! network residual with respect to one parameter.

use chroma_core::types::Active;
use chroma_models::system::ModelSystem;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::load_simulation;
use crate::{CliError, Result};

/// Sensitivity residual summary of one parameter.
#[derive(Debug, Serialize)]
pub struct SensReport {
    /// Parameter in display form
    pub parameter: String,
    /// AD direction
    pub direction: usize,
    /// Euclidean norm of the sensitivity residual
    pub l2_norm: f64,
    /// Largest magnitude
    pub max_abs: f64,
    /// Global DOF of the largest magnitude
    pub argmax: usize,
}

/// Evaluates the sensitivity residuals of `system` at time `t`.
pub fn evaluate(system: &ModelSystem, t: f64) -> Result<Vec<SensReport>> {
    let ns = system.num_sens_params();
    if ns == 0 {
        return Err(CliError::InvalidArgument(
            "simulation has no sensitivity parameters".to_string(),
        ));
    }
    let n = system.num_dofs();
    let sec = system.section_index(t);

    let y = system.initial_state()?;
    let y_dot = vec![0.0; n];
    let mut ad_res = vec![Active::default(); n];
    system.residual_ad(t, sec, &y, &y_dot, &mut ad_res)?;

    let zero = vec![0.0; n];
    let ys = vec![zero.as_slice(); ns];
    let mut out = vec![vec![0.0; n]; ns];
    let (mut tmp1, mut tmp2, mut tmp3) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    {
        let mut res_s: Vec<&mut [f64]> = out.iter_mut().map(Vec::as_mut_slice).collect();
        system.residual_sens_fwd_combine(
            t, sec, 1.0, &y, &y_dot, &ys, &ys, &mut res_s, &ad_res, &mut tmp1, &mut tmp2, &mut tmp3,
        )?;
    }

    Ok(system
        .sensitive_parameters()
        .iter()
        .zip(&out)
        .map(|(sens, r)| {
            let (argmax, max_abs) = r
                .iter()
                .map(|v| v.abs())
                .enumerate()
                .fold((0, 0.0), |best, (i, v)| if v > best.1 { (i, v) } else { best });
            SensReport {
                parameter: sens.id.to_string(),
                direction: sens.direction,
                l2_norm: r.iter().map(|v| v * v).sum::<f64>().sqrt(),
                max_abs,
                argmax,
            }
        })
        .collect())
}

/// Run the sens command
pub fn run(file: &str, time: f64, json: bool) -> Result<()> {
    info!("Evaluating sensitivities...");
    info!("  Simulation: {}", file);
    info!("  Time: {}", time);

    let cfg = load_simulation(file)?;
    if cfg.sensitivity.parameters.is_empty() {
        warn!("No sensitivities configured in {}", file);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.solver.nthreads)
        .build()?;
    info!("  Threads: {}", pool.current_num_threads());

    let system = ModelSystem::from_config(&cfg)?;
    let reports = pool.install(|| evaluate(&system, time))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("\n{:<40} {:>4} {:>14} {:>14} {:>8}", "Parameter", "Dir", "L2 norm", "Max |r|", "DOF");
        for r in &reports {
            println!(
                "{:<40} {:>4} {:>14.6e} {:>14.6e} {:>8}",
                r.parameter, r.direction, r.l2_norm, r.max_abs, r.argmax
            );
        }
    }

    info!("Sensitivity evaluation complete");
    Ok(())
}
