//! Static dispatch enum over the supported unit operations.
//!
//! The network stores `UnitOperationEnum` values instead of trait objects;
//! every trait method forwards through a `match`.

use chroma_core::registry::ParameterRegistry;
use chroma_core::solution::StateLayout;
use chroma_core::traits::{ExportSolution, ParameterProvider, ResidualAssembly, UnitOperation};
use chroma_core::types::{Active, AdConfig, CoreResult, UnitOpIdx};

use super::cstr::Cstr;
use super::general_rate::GeneralRateModel;
use super::inlet::Inlet;
use crate::config::{UnitConfig, UnitType};
use crate::error::ModelResult;

/// Any unit operation of the network.
#[derive(Clone, Debug)]
pub enum UnitOperationEnum {
    /// General rate model column
    GeneralRateModel(GeneralRateModel),
    /// Piecewise cubic inlet
    Inlet(Inlet),
    /// Stirred tank
    Cstr(Cstr),
}

macro_rules! dispatch {
    ($self:expr, $unit:ident => $body:expr) => {
        match $self {
            UnitOperationEnum::GeneralRateModel($unit) => $body,
            UnitOperationEnum::Inlet($unit) => $body,
            UnitOperationEnum::Cstr($unit) => $body,
        }
    };
}

impl UnitOperationEnum {
    /// Builds unit `unit` from its configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the unit configuration is inconsistent.
    pub fn from_config(
        unit: UnitOpIdx,
        cfg: &UnitConfig,
        section_times: &[f64],
        ad: AdConfig,
    ) -> ModelResult<Self> {
        Ok(match cfg {
            UnitConfig::GeneralRateModel(c) => {
                UnitOperationEnum::GeneralRateModel(GeneralRateModel::new(unit, c, ad)?)
            }
            UnitConfig::Inlet(c) => UnitOperationEnum::Inlet(Inlet::new(unit, c, section_times, ad)?),
            UnitConfig::Cstr(c) => UnitOperationEnum::Cstr(Cstr::new(unit, c, ad)?),
        })
    }

    /// Type of the wrapped unit.
    pub fn kind(&self) -> UnitType {
        match self {
            UnitOperationEnum::GeneralRateModel(_) => UnitType::GeneralRateModel,
            UnitOperationEnum::Inlet(_) => UnitType::Inlet,
            UnitOperationEnum::Cstr(_) => UnitType::Cstr,
        }
    }

    /// Writes the initial state of the unit into `out`.
    pub fn initial_state(&self, out: &mut [f64]) -> CoreResult<()> {
        dispatch!(self, u => u.initial_state(out))
    }
}

impl ParameterProvider for UnitOperationEnum {
    fn registry(&self) -> &ParameterRegistry {
        dispatch!(self, u => u.registry())
    }

    fn registry_mut(&mut self) -> &mut ParameterRegistry {
        dispatch!(self, u => u.registry_mut())
    }
}

impl ExportSolution for UnitOperationEnum {
    fn layout(&self) -> &StateLayout {
        dispatch!(self, u => u.layout())
    }
}

impl ResidualAssembly for UnitOperationEnum {
    fn residual(&self, t: f64, sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64]) -> CoreResult<()> {
        dispatch!(self, u => u.residual(t, sec, y, y_dot, res))
    }

    fn residual_ad(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        res: &mut [Active],
    ) -> CoreResult<()> {
        dispatch!(self, u => u.residual_ad(t, sec, y, y_dot, res))
    }

    fn multiply_with_jacobian(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        dispatch!(self, u => u.multiply_with_jacobian(t, sec, y, y_dot, x, out))
    }

    fn multiply_with_derivative_jacobian(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        dispatch!(self, u => u.multiply_with_derivative_jacobian(t, sec, y, y_dot, x, out))
    }
}

impl UnitOperation for UnitOperationEnum {
    fn unit_type(&self) -> &'static str {
        dispatch!(self, u => u.unit_type())
    }
}
