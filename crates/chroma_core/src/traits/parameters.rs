//! Parameter access of a unit operation.

use std::collections::BTreeMap;

use crate::registry::{ParameterRegistry, ParameterValue};
use crate::types::{CoreResult, ParameterId, UnitOpIdx};

/// Parameter access backed by an embedded [`ParameterRegistry`].
///
/// All methods except the two accessors are provided and forward to the
/// registry. Values are passed as [`ParameterValue`] so the trait stays
/// object safe.
pub trait ParameterProvider {
    /// Registry of this unit operation.
    fn registry(&self) -> &ParameterRegistry;

    /// Mutable registry of this unit operation.
    fn registry_mut(&mut self) -> &mut ParameterRegistry;

    /// Index of this unit operation.
    fn unit_operation_id(&self) -> UnitOpIdx {
        self.registry().unit_operation()
    }

    /// Snapshot of every registered parameter value.
    fn all_parameter_values(&self) -> BTreeMap<ParameterId, f64> {
        self.registry().all_parameter_values()
    }

    /// Returns true if `id` is registered.
    fn has_parameter(&self, id: &ParameterId) -> bool {
        self.registry().has_parameter(id)
    }

    /// Value of `id`, see [`ParameterRegistry::parameter_double`].
    fn parameter_double(&self, id: &ParameterId) -> CoreResult<f64> {
        self.registry().parameter_double(id)
    }

    /// Soft update, see [`ParameterRegistry::set_parameter`].
    fn set_parameter(&mut self, id: &ParameterId, value: ParameterValue) -> bool {
        self.registry_mut().set_parameter(id, value)
    }

    /// See [`ParameterRegistry::set_sensitive_parameter`].
    fn set_sensitive_parameter(
        &mut self,
        id: &ParameterId,
        direction: usize,
        seed: f64,
    ) -> CoreResult<bool> {
        self.registry_mut().set_sensitive_parameter(id, direction, seed)
    }

    /// See [`ParameterRegistry::set_sensitive_parameter_value`].
    fn set_sensitive_parameter_value(&mut self, id: &ParameterId, value: f64) -> CoreResult<()> {
        self.registry_mut().set_sensitive_parameter_value(id, value)
    }

    /// Stops tracking all sensitive parameters.
    fn clear_sens_params(&mut self) {
        self.registry_mut().clear_sens_params()
    }

    /// Number of sensitive parameters.
    fn num_sens_params(&self) -> usize {
        self.registry().num_sens_params()
    }
}
