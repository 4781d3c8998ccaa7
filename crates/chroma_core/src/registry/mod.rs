//! Per-unit parameter registry.
//!
//! The registry owns the differentiable storage cells of one unit operation
//! and maps [`ParameterId`]s onto them. Model parameter structs keep
//! [`ParamHandle`]s, i.e. indices into the registry's cell arena, and read
//! their values through the registry during residual evaluation.
//!
//! Two update paths exist on purpose:
//! - `set_parameter` / `set_sensitive_parameter` return `false` when the
//!   identity is unknown, so a configuration loader can broadcast a change
//!   to every unit operation without knowing which one owns it;
//! - `set_sensitive_parameter_value` requires the parameter to be tracked
//!   already and fails otherwise.
//!
//! Sensitive parameters are kept in insertion order. Slot `p` of the
//! sensitivity buffers handed to `residual_sens_fwd_combine` belongs to the
//! `p`-th entry of [`ParameterRegistry::sensitive_parameters`].

mod value;

use std::collections::{BTreeMap, HashMap};

use crate::types::{Active, AdConfig, CoreError, CoreResult, ParameterId, UnitOpIdx};

pub use value::ParameterValue;

/// Index of a storage cell inside a [`ParameterRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamHandle(usize);

impl ParamHandle {
    /// Position of the cell in the arena.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A parameter currently assigned an AD direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensitiveParameter {
    /// Identity of the parameter
    pub id: ParameterId,
    /// Cell holding the parameter
    pub handle: ParamHandle,
    /// Assigned AD direction
    pub direction: usize,
}

/// Parameter storage and sensitivity bookkeeping of one unit operation.
#[derive(Clone, Debug)]
pub struct ParameterRegistry {
    unit: UnitOpIdx,
    ad: AdConfig,
    cells: Vec<Active>,
    ids: Vec<ParameterId>,
    parameters: HashMap<ParameterId, ParamHandle>,
    sensitive: Vec<SensitiveParameter>,
}

impl ParameterRegistry {
    /// Creates an empty registry whose cells carry `ad.directions()` derivative slots.
    pub fn new(unit: UnitOpIdx, ad: AdConfig) -> Self {
        Self {
            unit,
            ad,
            cells: Vec::new(),
            ids: Vec::new(),
            parameters: HashMap::new(),
            sensitive: Vec::new(),
        }
    }

    /// Index of the owning unit operation.
    pub fn unit_operation(&self) -> UnitOpIdx {
        self.unit
    }

    /// Derivative capacity of the cells.
    pub fn ad_config(&self) -> AdConfig {
        self.ad
    }

    /// Number of registered parameters.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no parameter is registered.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Allocates a cell for `id` with primal `value`.
    ///
    /// # Errors
    ///
    /// `DuplicateParameter` if `id` is already registered.
    pub fn register(&mut self, id: ParameterId, value: f64) -> CoreResult<ParamHandle> {
        if self.parameters.contains_key(&id) {
            return Err(CoreError::DuplicateParameter(id));
        }
        let handle = ParamHandle(self.cells.len());
        self.cells.push(Active::new(value, self.ad));
        self.ids.push(id);
        self.parameters.insert(id, handle);
        Ok(handle)
    }

    /// Handle of a registered identity.
    pub fn handle(&self, id: &ParameterId) -> Option<ParamHandle> {
        self.parameters.get(id).copied()
    }

    /// Storage cell behind `handle`.
    ///
    /// # Panics
    ///
    /// If `handle` was issued by a different registry with more cells.
    #[inline]
    pub fn cell(&self, handle: ParamHandle) -> &Active {
        &self.cells[handle.0]
    }

    /// Primal value behind `handle`.
    #[inline]
    pub fn value(&self, handle: ParamHandle) -> f64 {
        self.cells[handle.0].value()
    }

    /// Identity registered for `handle`.
    pub fn id_of(&self, handle: ParamHandle) -> ParameterId {
        self.ids[handle.0]
    }

    /// Registered identities in registration order.
    pub fn parameter_ids(&self) -> &[ParameterId] {
        &self.ids
    }

    /// Snapshot of every registered primal value.
    pub fn all_parameter_values(&self) -> BTreeMap<ParameterId, f64> {
        self.ids
            .iter()
            .zip(&self.cells)
            .map(|(id, cell)| (*id, cell.value()))
            .collect()
    }

    /// Exact structural lookup.
    pub fn has_parameter(&self, id: &ParameterId) -> bool {
        self.parameters.contains_key(id)
    }

    /// Primal value of `id`.
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` if `id` is not registered.
    pub fn parameter_double(&self, id: &ParameterId) -> CoreResult<f64> {
        self.handle(id)
            .map(|h| self.value(h))
            .ok_or(CoreError::ParameterNotFound(*id))
    }

    /// Updates the primal value of `id` in place.
    ///
    /// Returns `false` without touching anything if `id` is not registered.
    pub fn set_parameter(&mut self, id: &ParameterId, value: impl Into<ParameterValue>) -> bool {
        match self.handle(id) {
            Some(handle) => {
                self.cells[handle.0].set_value(value.into().as_f64());
                true
            }
            None => false,
        }
    }

    /// Assigns AD `direction` to `id` and seeds its derivative with `seed`.
    ///
    /// Any previously seeded component of the cell is cleared first, so a
    /// parameter tracks at most one direction. Re-assigning an already
    /// sensitive parameter keeps its position in the sensitive list.
    ///
    /// Returns `Ok(false)` if `id` is not registered.
    ///
    /// # Errors
    ///
    /// `DirectionOutOfRange` if `direction` exceeds the configured capacity.
    pub fn set_sensitive_parameter(
        &mut self,
        id: &ParameterId,
        direction: usize,
        seed: f64,
    ) -> CoreResult<bool> {
        let Some(handle) = self.handle(id) else {
            return Ok(false);
        };
        self.ad.check_direction(direction)?;

        let cell = &mut self.cells[handle.0];
        cell.clear_derivatives();
        cell.set_derivative(direction, seed)?;

        match self.sensitive.iter_mut().find(|s| s.handle == handle) {
            Some(entry) => entry.direction = direction,
            None => self.sensitive.push(SensitiveParameter {
                id: *id,
                handle,
                direction,
            }),
        }
        Ok(true)
    }

    /// Updates the primal value of a parameter that is already sensitive.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `id` is not currently tracked.
    pub fn set_sensitive_parameter_value(&mut self, id: &ParameterId, value: f64) -> CoreResult<()> {
        let handle = self
            .sensitive
            .iter()
            .find(|s| s.id == *id)
            .map(|s| s.handle)
            .ok_or_else(|| {
                CoreError::InvalidState(format!("Parameter {} is not sensitive", id))
            })?;
        self.cells[handle.0].set_value(value);
        Ok(())
    }

    /// Stops tracking every sensitive parameter; primal values are kept.
    pub fn clear_sens_params(&mut self) {
        for entry in self.sensitive.drain(..) {
            self.cells[entry.handle.0].clear_derivatives();
        }
    }

    /// Number of sensitive parameters.
    pub fn num_sens_params(&self) -> usize {
        self.sensitive.len()
    }

    /// Sensitive parameters in insertion order.
    pub fn sensitive_parameters(&self) -> &[SensitiveParameter] {
        &self.sensitive
    }
}
