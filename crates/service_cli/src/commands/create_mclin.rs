//! Create-mclin command implementation
//!
//! Writes the two-component linear benchmark (general rate model column fed
//! by a piecewise cubic inlet) as a simulation file.

use chroma_core::types::{ParameterId, ParameterName};
use chroma_models::config::{SensitivityParameterConfig, SimulationConfig};
use chroma_models::system::ModelSystem;
use tracing::info;

use crate::config::write_simulation;
use crate::{CliError, Result};

/// Parses `NAME[:unit[:comp[:bound[:section]]]]`; empty fields are left unset.
pub fn parse_sens_arg(arg: &str) -> Result<SensitivityParameterConfig> {
    let mut fields = arg.split(':');
    let name: ParameterName = fields
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("Unknown parameter in '{}'", arg)))?;

    let mut indices = [None; 4];
    for (slot, field) in indices.iter_mut().zip(fields.by_ref()) {
        if !field.is_empty() {
            let value = field
                .parse::<u32>()
                .map_err(|_| CliError::InvalidArgument(format!("Bad index '{}' in '{}'", field, arg)))?;
            *slot = Some(value);
        }
    }
    if fields.next().is_some() {
        return Err(CliError::InvalidArgument(format!(
            "Too many fields in '{}', expected NAME[:unit[:comp[:bound[:section]]]]",
            arg
        )));
    }

    let [unit, component, bound_state, section] = indices;
    let mut entry = SensitivityParameterConfig::new(ParameterId::new(name));
    entry.unit = unit;
    entry.component = component;
    entry.bound_state = bound_state;
    entry.section = section;
    Ok(entry)
}

/// Builds the benchmark case with the requested sensitivities.
pub fn build_case(kinetic: bool, sens: &[String]) -> Result<SimulationConfig> {
    let mut cfg = SimulationConfig::linear_benchmark(kinetic);
    cfg.sensitivity.parameters = sens.iter().map(|s| parse_sens_arg(s)).collect::<Result<_>>()?;
    // rejects sensitivities no unit owns
    ModelSystem::from_config(&cfg)?;
    Ok(cfg)
}

/// Run the create-mclin command
pub fn run(out: &str, kinetic: bool, sens: &[String]) -> Result<()> {
    info!("Creating linear benchmark...");
    info!("  Binding: {}", if kinetic { "kinetic" } else { "quasi-stationary" });
    info!("  Sensitivities: {}", sens.len());

    let cfg = build_case(kinetic, sens)?;
    write_simulation(&cfg, out)?;

    info!("Wrote {}", out);
    Ok(())
}
