//! Inspect command implementation
//!
//! Builds the model system of a simulation file and reports, per unit, the
//! DOF layout seen through its solution exporter and its parameter values.

use std::collections::BTreeMap;

use chroma_core::solution::{SolutionExporter, StateOrdering};
use chroma_core::traits::{ParameterProvider, UnitOperation};
use chroma_models::config::UnitType;
use chroma_models::system::ModelSystem;
use chroma_models::units::UnitOperationEnum;
use serde::Serialize;
use tracing::info;

use crate::config::load_simulation;
use crate::Result;

/// Layout and parameters of one unit.
#[derive(Debug, Serialize)]
pub struct UnitReport {
    /// Unit index
    pub unit: u32,
    /// Unit type name
    pub unit_type: &'static str,
    /// DOFs of the unit
    pub num_dofs: usize,
    /// Number of components
    pub num_components: usize,
    /// Axial cells
    pub num_axial_cells: usize,
    /// Particle shells
    pub num_radial_cells: usize,
    /// Bound states per component
    pub bound_states: Vec<usize>,
    /// Counts of the phase blocks
    pub dofs: BlockCounts,
    /// Loop orderings of the phase blocks, outermost first
    pub orderings: BTreeMap<&'static str, Vec<StateOrdering>>,
    /// Run strides of the phase blocks
    pub strides: BTreeMap<&'static str, usize>,
    /// Parameter values keyed by their display form
    pub parameters: BTreeMap<String, f64>,
}

/// Element counts per phase block.
#[derive(Debug, Serialize)]
pub struct BlockCounts {
    /// Bulk mobile phase
    pub bulk: usize,
    /// Particle mobile phase
    pub particle_mobile_phase: usize,
    /// Solid phase
    pub solid_phase: usize,
    /// Bulk-particle flux
    pub flux: usize,
    /// Volume
    pub volume: usize,
}

/// Summarises `unit` through the exporter over its slice of the state.
pub fn unit_report(unit: &UnitOperationEnum, ex: &SolutionExporter<'_>) -> UnitReport {
    let orderings = BTreeMap::from([
        ("bulk", ex.concentration_ordering().to_vec()),
        ("particle_mobile_phase", ex.mobile_phase_ordering().to_vec()),
        ("solid_phase", ex.solid_phase_ordering().to_vec()),
        ("flux", ex.flux_ordering().to_vec()),
    ]);
    let strides = BTreeMap::from([
        ("bulk", ex.bulk_mobile_phase_stride()),
        ("particle_mobile_phase", ex.particle_mobile_phase_stride()),
        ("solid_phase", ex.solid_phase_stride()),
        ("inlet", ex.inlet().stride()),
        ("outlet", ex.outlet().stride()),
    ]);
    UnitReport {
        unit: unit.unit_operation_id(),
        unit_type: unit.unit_type(),
        num_dofs: ex.layout().num_dofs(),
        num_components: ex.num_components(),
        num_axial_cells: ex.num_axial_cells(),
        num_radial_cells: ex.num_radial_cells(),
        bound_states: ex.num_bound_states_per_component().to_vec(),
        dofs: BlockCounts {
            bulk: ex.num_bulk_dofs(),
            particle_mobile_phase: ex.num_particle_mobile_phase_dofs(),
            solid_phase: ex.num_solid_phase_dofs(),
            flux: ex.num_flux_dofs(),
            volume: ex.num_volume_dofs(),
        },
        orderings,
        strides,
        parameters: unit
            .all_parameter_values()
            .into_iter()
            .map(|(id, v)| (id.to_string(), v))
            .collect(),
    }
}

/// Reports of all units, optionally restricted to one type.
pub fn collect_reports(system: &ModelSystem, unit_type: Option<UnitType>) -> Result<Vec<UnitReport>> {
    let state = system.initial_state()?;
    let exporters = system.exporters(&state)?;
    Ok(system
        .units()
        .iter()
        .zip(&exporters)
        .filter(|(u, _)| unit_type.map_or(true, |t| u.kind() == t))
        .map(|(u, ex)| unit_report(u, ex))
        .collect())
}

fn format_ordering(ordering: &[StateOrdering]) -> String {
    if ordering.is_empty() {
        return "-".to_string();
    }
    ordering.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(" > ")
}

fn print_report(report: &UnitReport) {
    println!("\nUnit {} ({})", report.unit, report.unit_type);
    println!("  DOFs:        {}", report.num_dofs);
    println!(
        "  Components:  {}  axial cells: {}  radial cells: {}",
        report.num_components, report.num_axial_cells, report.num_radial_cells
    );
    println!("  Bound:       {:?}", report.bound_states);
    println!(
        "  Blocks:      bulk {}  particle {}  solid {}  flux {}  volume {}",
        report.dofs.bulk,
        report.dofs.particle_mobile_phase,
        report.dofs.solid_phase,
        report.dofs.flux,
        report.dofs.volume
    );
    for (block, ordering) in &report.orderings {
        let stride = report.strides.get(block).copied().unwrap_or(0);
        println!("  {:<22} {} (stride {})", block, format_ordering(ordering), stride);
    }
    println!("  Parameters:");
    for (id, value) in &report.parameters {
        println!("    {:<40} {:>14.6e}", id, value);
    }
}

/// Run the inspect command
pub fn run(file: &str, json: bool, unit_type: Option<&str>) -> Result<()> {
    info!("Inspecting {}", file);
    let filter = unit_type.map(str::parse::<UnitType>).transpose()?;

    let cfg = load_simulation(file)?;
    let system = ModelSystem::from_config(&cfg)?;
    let reports = collect_reports(&system, filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!(
            "{} units, {} DOFs, {} sections",
            system.num_units(),
            system.num_dofs(),
            system.section_times().len().saturating_sub(1)
        );
        reports.iter().for_each(print_report);
    }
    Ok(())
}
