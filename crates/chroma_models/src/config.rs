//! Simulation configuration.
//!
//! Plain serde types describing a unit operation network, the time line and
//! the requested sensitivities. Field names are the lower-case forms of the
//! usual chromatography input keys (`velocity`, `col_dispersion`, `nbound`,
//! ...); unit operations are tagged by `unit_type`.
//!
//! ```
//! use chroma_models::config::{SimulationConfig, UnitConfig};
//!
//! let cfg = SimulationConfig::linear_benchmark(false);
//! assert_eq!(cfg.model.units.len(), 2);
//! assert!(matches!(cfg.model.units[1], UnitConfig::Inlet(_)));
//! cfg.validate().unwrap();
//! ```

use std::fmt;
use std::str::FromStr;

use chroma_core::types::{ParameterId, ParameterName, UnitOpIdx};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

fn default_one() -> f64 {
    1.0
}

fn default_nthreads() -> usize {
    1
}

/// Complete simulation input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Unit operations and their connections
    pub model: ModelConfig,
    /// Time line and integrator settings
    pub solver: SolverConfig,
    /// Parameters to compute sensitivities for
    #[serde(default)]
    pub sensitivity: SensitivityConfig,
}

/// Unit operation network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Unit operations; the position is the unit operation index
    pub units: Vec<UnitConfig>,
    /// Valve switches, ordered by section
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
}

/// Supported unit operation types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitType {
    /// Column with bulk, film and particle phases
    GeneralRateModel,
    /// Boundary condition with a prescribed concentration profile
    Inlet,
    /// Continuous stirred tank reactor
    Cstr,
}

impl UnitType {
    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::GeneralRateModel => "GENERAL_RATE_MODEL",
            UnitType::Inlet => "INLET",
            UnitType::Cstr => "CSTR",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GENERAL_RATE_MODEL" | "GRM" => Ok(UnitType::GeneralRateModel),
            "INLET" => Ok(UnitType::Inlet),
            "CSTR" => Ok(UnitType::Cstr),
            _ => Err(ModelError::UnknownUnitType(s.to_string())),
        }
    }
}

/// Configuration of one unit operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit_type")]
pub enum UnitConfig {
    /// General rate model column
    #[serde(rename = "GENERAL_RATE_MODEL")]
    GeneralRateModel(GeneralRateConfig),
    /// Inlet
    #[serde(rename = "INLET")]
    Inlet(InletConfig),
    /// Stirred tank
    #[serde(rename = "CSTR")]
    Cstr(CstrConfig),
}

impl UnitConfig {
    /// Type tag of this configuration.
    pub fn unit_type(&self) -> UnitType {
        match self {
            UnitConfig::GeneralRateModel(_) => UnitType::GeneralRateModel,
            UnitConfig::Inlet(_) => UnitType::Inlet,
            UnitConfig::Cstr(_) => UnitType::Cstr,
        }
    }

    /// Number of components.
    pub fn ncomp(&self) -> usize {
        match self {
            UnitConfig::GeneralRateModel(c) => c.ncomp,
            UnitConfig::Inlet(c) => c.ncomp,
            UnitConfig::Cstr(c) => c.ncomp,
        }
    }
}

/// General rate model column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneralRateConfig {
    /// Number of components
    pub ncomp: usize,
    /// Interstitial velocity
    pub velocity: f64,
    /// Axial dispersion coefficient
    pub col_dispersion: f64,
    /// Column length
    pub col_length: f64,
    /// Column (interstitial) porosity
    pub col_porosity: f64,
    /// Particle radius
    pub par_radius: f64,
    /// Particle porosity
    pub par_porosity: f64,
    /// Film diffusion coefficient per component
    pub film_diffusion: Vec<f64>,
    /// Pore diffusion coefficient per component
    pub par_diffusion: Vec<f64>,
    /// Surface diffusion coefficient per bound state; empty means zero
    #[serde(default)]
    pub par_surfdiffusion: Vec<f64>,
    /// Initial bulk concentration per component; empty means zero
    #[serde(default)]
    pub init_c: Vec<f64>,
    /// Initial bound concentration per bound state; empty means zero
    #[serde(default)]
    pub init_q: Vec<f64>,
    /// Binding model
    #[serde(default)]
    pub adsorption: AdsorptionConfig,
    /// Discretisation
    pub discretization: DiscretizationConfig,
}

/// Radial discretisation of the particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleDiscretization {
    /// Shells of equal thickness
    #[default]
    #[serde(rename = "EQUIDISTANT_PAR")]
    Equidistant,
    /// Shells of equal volume
    #[serde(rename = "EQUIVOLUME_PAR")]
    Equivolume,
}

/// Column discretisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationConfig {
    /// Number of axial cells
    pub ncol: usize,
    /// Number of particle shells
    pub npar: usize,
    /// Bound states per component
    pub nbound: Vec<usize>,
    /// Shell placement
    #[serde(default)]
    pub par_disc_type: ParticleDiscretization,
}

/// Binding model families.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdsorptionModel {
    /// No binding; every component must have zero bound states
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// Linear isotherm `ka c - kd q`
    #[serde(rename = "LINEAR")]
    Linear,
}

/// Binding model parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdsorptionConfig {
    /// Binding model family
    #[serde(default)]
    pub adsorption_model: AdsorptionModel,
    /// Kinetic (`true`) or quasi-stationary (`false`) binding
    #[serde(default)]
    pub is_kinetic: bool,
    /// Adsorption rate per bound state
    #[serde(default)]
    pub lin_ka: Vec<f64>,
    /// Desorption rate per bound state
    #[serde(default)]
    pub lin_kd: Vec<f64>,
}

/// Inlet profile family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InletType {
    /// Cubic polynomial per section, evaluated in section-local time
    #[default]
    #[serde(rename = "PIECEWISE_CUBIC_POLY")]
    PiecewiseCubicPoly,
}

/// Inlet boundary condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InletConfig {
    /// Number of components
    pub ncomp: usize,
    /// Profile family
    #[serde(default)]
    pub inlet_type: InletType,
    /// One entry per section of the time line
    pub sections: Vec<InletSectionConfig>,
}

/// Polynomial coefficients of one inlet section; empty vectors mean zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InletSectionConfig {
    /// Constant coefficient per component
    #[serde(default)]
    pub const_coeff: Vec<f64>,
    /// Linear coefficient per component
    #[serde(default)]
    pub lin_coeff: Vec<f64>,
    /// Quadratic coefficient per component
    #[serde(default)]
    pub quad_coeff: Vec<f64>,
    /// Cubic coefficient per component
    #[serde(default)]
    pub cube_coeff: Vec<f64>,
}

/// Continuous stirred tank reactor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CstrConfig {
    /// Number of components
    pub ncomp: usize,
    /// Liquid volume fraction
    #[serde(default = "default_one")]
    pub porosity: f64,
    /// Volumetric inflow rate
    pub flowrate_in: f64,
    /// Volumetric outflow rate
    pub flowrate_out: f64,
    /// Bound states per component; empty means none
    #[serde(default)]
    pub nbound: Vec<usize>,
    /// Initial concentration per component; empty means zero
    #[serde(default)]
    pub init_c: Vec<f64>,
    /// Initial bound concentration per bound state; empty means zero
    #[serde(default)]
    pub init_q: Vec<f64>,
    /// Initial liquid volume
    pub init_volume: f64,
    /// Binding model
    #[serde(default)]
    pub adsorption: AdsorptionConfig,
}

/// Connections active from the start of `section` onwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// First section of this valve state
    pub section: usize,
    /// Active connections
    pub connections: Vec<ConnectionConfig>,
}

/// Flow from the outlet of one unit to the inlet of another.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Upstream unit operation
    pub from: UnitOpIdx,
    /// Downstream unit operation
    pub to: UnitOpIdx,
    /// Volumetric flow rate
    #[serde(default = "default_one")]
    pub flowrate: f64,
}

/// Time line and integrator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Section boundaries, `nsec + 1` strictly increasing values
    pub section_times: Vec<f64>,
    /// Worker threads for per-unit evaluation
    #[serde(default = "default_nthreads")]
    pub nthreads: usize,
}

impl SolverConfig {
    /// Number of sections.
    pub fn num_sections(&self) -> usize {
        self.section_times.len().saturating_sub(1)
    }
}

/// Requested forward sensitivities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    /// One entry per sensitivity; entry `p` is assigned AD direction `p`
    #[serde(default)]
    pub parameters: Vec<SensitivityParameterConfig>,
}

/// One sensitivity parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityParameterConfig {
    /// Parameter name
    pub name: ParameterName,
    /// Owning unit operation
    #[serde(default)]
    pub unit: Option<UnitOpIdx>,
    /// Component index
    #[serde(default)]
    pub component: Option<u32>,
    /// Bound state index
    #[serde(default)]
    pub bound_state: Option<u32>,
    /// Section index
    #[serde(default)]
    pub section: Option<u32>,
    /// Reaction index
    #[serde(default)]
    pub reaction: Option<u32>,
    /// Seed of the AD direction
    #[serde(default = "default_one")]
    pub factor: f64,
}

impl SensitivityParameterConfig {
    /// Sensitivity with unit seed.
    pub fn new(id: ParameterId) -> Self {
        Self {
            name: id.name(),
            unit: id.unit_index(),
            component: id.component_index(),
            bound_state: id.bound_state_index(),
            section: id.section_index(),
            reaction: id.reaction_index(),
            factor: default_one(),
        }
    }

    /// Identity of the parameter.
    pub fn parameter_id(&self) -> ParameterId {
        let mut id = ParameterId::new(self.name);
        if let Some(u) = self.unit {
            id = id.unit(u);
        }
        if let Some(c) = self.component {
            id = id.component(c);
        }
        if let Some(b) = self.bound_state {
            id = id.bound_state(b);
        }
        if let Some(s) = self.section {
            id = id.section(s);
        }
        if let Some(r) = self.reaction {
            id = id.reaction(r);
        }
        id
    }
}

fn check_len(what: &str, expected: usize, got: usize) -> ModelResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(ModelError::config(format!(
            "{} has {} entries, expected {}",
            what, got, expected
        )))
    }
}

/// Checks that an optional per-item vector is empty or has `expected` entries.
fn check_optional_len(what: &str, expected: usize, got: usize) -> ModelResult<()> {
    if got == 0 {
        Ok(())
    } else {
        check_len(what, expected, got)
    }
}

fn check_positive(what: &str, value: f64) -> ModelResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::config(format!("{} must be positive, got {}", what, value)))
    }
}

fn check_fraction(what: &str, value: f64) -> ModelResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ModelError::config(format!("{} must lie in (0, 1], got {}", what, value)))
    }
}

impl AdsorptionConfig {
    fn validate(&self, nbound: &[usize]) -> ModelResult<()> {
        let total: usize = nbound.iter().sum();
        match self.adsorption_model {
            AdsorptionModel::None if total > 0 => Err(ModelError::config(
                "bound states require an adsorption model",
            )),
            AdsorptionModel::None => Ok(()),
            AdsorptionModel::Linear => {
                check_len("lin_ka", total, self.lin_ka.len())?;
                check_len("lin_kd", total, self.lin_kd.len())
            }
        }
    }
}

impl GeneralRateConfig {
    /// Checks dimensions and physical ranges.
    pub fn validate(&self) -> ModelResult<()> {
        let d = &self.discretization;
        if self.ncomp == 0 || d.ncol == 0 || d.npar == 0 {
            return Err(ModelError::config("ncomp, ncol and npar must be positive"));
        }
        check_len("nbound", self.ncomp, d.nbound.len())?;
        let total_bound: usize = d.nbound.iter().sum();
        check_len("film_diffusion", self.ncomp, self.film_diffusion.len())?;
        check_len("par_diffusion", self.ncomp, self.par_diffusion.len())?;
        check_optional_len("par_surfdiffusion", total_bound, self.par_surfdiffusion.len())?;
        check_optional_len("init_c", self.ncomp, self.init_c.len())?;
        check_optional_len("init_q", total_bound, self.init_q.len())?;
        check_positive("col_length", self.col_length)?;
        check_positive("par_radius", self.par_radius)?;
        check_fraction("col_porosity", self.col_porosity)?;
        check_fraction("par_porosity", self.par_porosity)?;
        self.adsorption.validate(&d.nbound)
    }
}

impl InletConfig {
    /// Checks dimensions against the number of sections.
    pub fn validate(&self, num_sections: usize) -> ModelResult<()> {
        if self.ncomp == 0 {
            return Err(ModelError::config("inlet needs at least one component"));
        }
        check_len("inlet sections", num_sections, self.sections.len())?;
        for sec in &self.sections {
            check_optional_len("const_coeff", self.ncomp, sec.const_coeff.len())?;
            check_optional_len("lin_coeff", self.ncomp, sec.lin_coeff.len())?;
            check_optional_len("quad_coeff", self.ncomp, sec.quad_coeff.len())?;
            check_optional_len("cube_coeff", self.ncomp, sec.cube_coeff.len())?;
        }
        Ok(())
    }
}

impl CstrConfig {
    /// Bound states per component, defaulting to none.
    pub fn nbound(&self) -> Vec<usize> {
        if self.nbound.is_empty() {
            vec![0; self.ncomp]
        } else {
            self.nbound.clone()
        }
    }

    /// Checks dimensions and physical ranges.
    pub fn validate(&self) -> ModelResult<()> {
        if self.ncomp == 0 {
            return Err(ModelError::config("CSTR needs at least one component"));
        }
        let nbound = self.nbound();
        check_len("nbound", self.ncomp, nbound.len())?;
        let total_bound: usize = nbound.iter().sum();
        check_optional_len("init_c", self.ncomp, self.init_c.len())?;
        check_optional_len("init_q", total_bound, self.init_q.len())?;
        check_fraction("porosity", self.porosity)?;
        check_positive("init_volume", self.init_volume)?;
        self.adsorption.validate(&nbound)
    }
}

impl SolverConfig {
    /// Checks the time line.
    pub fn validate(&self) -> ModelResult<()> {
        if self.section_times.len() < 2 {
            return Err(ModelError::config("at least one section is required"));
        }
        if self.section_times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::config("section_times must be strictly increasing"));
        }
        if self.nthreads == 0 {
            return Err(ModelError::config("nthreads must be positive"));
        }
        Ok(())
    }
}

impl SimulationConfig {
    /// Checks every unit, the switches, the time line and the
    /// sensitivities.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` describing the first inconsistency found.
    pub fn validate(&self) -> ModelResult<()> {
        self.solver.validate()?;
        let nsec = self.solver.num_sections();
        let nunits = self.model.units.len();
        for unit in &self.model.units {
            match unit {
                UnitConfig::GeneralRateModel(c) => c.validate()?,
                UnitConfig::Inlet(c) => c.validate(nsec)?,
                UnitConfig::Cstr(c) => c.validate()?,
            }
        }
        let mut last_section = None;
        for switch in &self.model.switches {
            if switch.section >= nsec {
                return Err(ModelError::config(format!(
                    "switch at section {} but only {} sections",
                    switch.section, nsec
                )));
            }
            if last_section.is_some_and(|s| s >= switch.section) {
                return Err(ModelError::config("switches must be ordered by section"));
            }
            last_section = Some(switch.section);
            for conn in &switch.connections {
                for idx in [conn.from, conn.to] {
                    if idx as usize >= nunits {
                        return Err(ModelError::UnitNotFound(idx));
                    }
                }
                if conn.flowrate < 0.0 {
                    return Err(ModelError::config("connection flow rate must not be negative"));
                }
            }
        }
        let ids: Vec<ParameterId> = self.sensitivity.parameters.iter().map(|p| p.parameter_id()).collect();
        for (p, id) in ids.iter().enumerate() {
            if ids[..p].contains(id) {
                return Err(ModelError::config(format!("sensitivity {} listed more than once", id)));
            }
        }
        Ok(())
    }

    /// Two-component linear benchmark: a general rate model column fed by
    /// a piecewise cubic inlet (load, wash, gradient elution).
    pub fn linear_benchmark(is_kinetic: bool) -> Self {
        let column = GeneralRateConfig {
            ncomp: 2,
            velocity: 5.75e-4,
            col_dispersion: 5.75e-8,
            col_length: 0.014,
            col_porosity: 0.37,
            par_radius: 4.5e-5,
            par_porosity: 0.75,
            film_diffusion: vec![6.9e-6, 6.9e-6],
            par_diffusion: vec![7e-10, 7e-10],
            par_surfdiffusion: vec![0.0, 1e-10],
            init_c: vec![0.0, 0.0],
            init_q: vec![0.0, 0.0],
            adsorption: AdsorptionConfig {
                adsorption_model: AdsorptionModel::Linear,
                is_kinetic,
                lin_ka: vec![35.5, 20.0],
                lin_kd: vec![1000.0, 1000.0],
            },
            discretization: DiscretizationConfig {
                ncol: 10,
                npar: 4,
                nbound: vec![1, 1],
                par_disc_type: ParticleDiscretization::Equidistant,
            },
        };

        let inlet = InletConfig {
            ncomp: 2,
            inlet_type: InletType::PiecewiseCubicPoly,
            sections: vec![
                InletSectionConfig {
                    const_coeff: vec![0.0, 0.0],
                    lin_coeff: vec![1.0, 2.0],
                    quad_coeff: vec![0.0, 0.0],
                    cube_coeff: vec![0.0, 0.0],
                },
                InletSectionConfig {
                    const_coeff: vec![10.0, 20.0],
                    lin_coeff: vec![0.0, 0.0],
                    quad_coeff: vec![0.0, 0.0],
                    cube_coeff: vec![0.0, 0.0],
                },
                InletSectionConfig {
                    const_coeff: vec![10.0, 20.0],
                    lin_coeff: vec![-10.0 / 1410.0, -20.0 / 1410.0],
                    quad_coeff: vec![0.0, 0.0],
                    cube_coeff: vec![0.0, 0.0],
                },
            ],
        };

        Self {
            model: ModelConfig {
                units: vec![UnitConfig::GeneralRateModel(column), UnitConfig::Inlet(inlet)],
                switches: vec![SwitchConfig {
                    section: 0,
                    connections: vec![ConnectionConfig {
                        from: 1,
                        to: 0,
                        flowrate: 1.0,
                    }],
                }],
            },
            solver: SolverConfig {
                section_times: vec![0.0, 10.0, 90.0, 1500.0],
                nthreads: 1,
            },
            sensitivity: SensitivityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_is_valid() {
        let cfg = SimulationConfig::linear_benchmark(true);
        cfg.validate().unwrap();
        assert_eq!(cfg.solver.num_sections(), 3);
        match &cfg.model.units[0] {
            UnitConfig::GeneralRateModel(grm) => assert!(grm.adsorption.is_kinetic),
            other => panic!("unexpected unit {:?}", other.unit_type()),
        }
    }

    #[test]
    fn test_unit_type_parsing() {
        assert_eq!("inlet".parse::<UnitType>().unwrap(), UnitType::Inlet);
        assert_eq!(
            "GENERAL_RATE_MODEL".parse::<UnitType>().unwrap(),
            UnitType::GeneralRateModel
        );
        let err = "LUMPED_RATE_MODEL".parse::<UnitType>().unwrap_err();
        assert_eq!(err, ModelError::UnknownUnitType("LUMPED_RATE_MODEL".into()));
    }

    #[test]
    fn test_validate_rejects_wrong_binding_length() {
        let mut cfg = SimulationConfig::linear_benchmark(false);
        if let UnitConfig::GeneralRateModel(grm) = &mut cfg.model.units[0] {
            grm.adsorption.lin_ka.pop();
        }
        assert!(matches!(cfg.validate(), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_connection_target() {
        let mut cfg = SimulationConfig::linear_benchmark(false);
        cfg.model.switches[0].connections[0].to = 5;
        assert_eq!(cfg.validate(), Err(ModelError::UnitNotFound(5)));
    }

    #[test]
    fn test_validate_rejects_missing_inlet_section() {
        let mut cfg = SimulationConfig::linear_benchmark(false);
        if let UnitConfig::Inlet(inlet) = &mut cfg.model.units[1] {
            inlet.sections.pop();
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_sensitivity_parameter_id_round_trip() {
        let id = ParameterId::new(ParameterName::LinKa)
            .unit(0)
            .component(1)
            .bound_state(0);
        let sens = SensitivityParameterConfig::new(id);
        assert_eq!(sens.parameter_id(), id);
        assert_eq!(sens.factor, 1.0);
    }

    #[test]
    fn test_validate_rejects_duplicate_sensitivity() {
        let mut cfg = SimulationConfig::linear_benchmark(false);
        let velocity = ParameterId::new(ParameterName::Velocity).unit(0);
        let porosity = ParameterId::new(ParameterName::ColPorosity).unit(0);
        cfg.sensitivity.parameters = vec![
            SensitivityParameterConfig::new(velocity),
            SensitivityParameterConfig::new(porosity),
        ];
        cfg.validate().unwrap();

        let mut again = SensitivityParameterConfig::new(velocity);
        again.factor = 2.0;
        cfg.sensitivity.parameters.push(again);
        assert!(matches!(cfg.validate(), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = SimulationConfig::linear_benchmark(false);
        let text = toml::to_string(&cfg).unwrap();
        assert!(text.contains("unit_type = \"GENERAL_RATE_MODEL\""));
        let back: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
