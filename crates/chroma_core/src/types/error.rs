//! Error types for structured error handling.
//!
//! Two classes of failure exist at this layer. Soft absence of a parameter
//! during broadcast updates is reported through `bool` returns and never
//! reaches this type. Everything here is a hard contract violation: a caller
//! or configuration bug that must not be absorbed silently.

use thiserror::Error;

use super::param_id::ParameterId;

/// Errors raised by the registry, the solution exporter and the
/// sensitivity combination.
///
/// # Examples
/// ```
/// use chroma_core::types::{CoreError, ParameterId, ParameterName};
///
/// let id = ParameterId::new(ParameterName::Velocity).unit(0);
/// let err = CoreError::ParameterNotFound(id);
/// assert_eq!(format!("{}", err), "Parameter not found: VELOCITY[unit=0]");
/// assert!(!err.is_invalid_state());
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// The identity is not registered on this unit operation.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(ParameterId),

    /// Generic contract violation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// AD direction beyond the configured capacity.
    #[error("AD direction {direction} out of range (capacity {capacity})")]
    DirectionOutOfRange {
        /// Requested direction
        direction: usize,
        /// Number of directions the storage was allocated with
        capacity: usize,
    },

    /// The identity was registered twice on the same unit operation.
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(ParameterId),

    /// A buffer handed over by the caller has the wrong length.
    #[error("Buffer size mismatch for {what}: expected {expected}, got {got}")]
    BufferSize {
        /// Name of the offending buffer
        what: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        got: usize,
    },
}

impl CoreError {
    /// Returns true for conditions in the `InvalidState` class, i.e. every
    /// variant except a plain lookup miss.
    pub fn is_invalid_state(&self) -> bool {
        !matches!(self, CoreError::ParameterNotFound(_))
    }

    /// Checks a buffer length, producing `BufferSize` on mismatch.
    pub fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), CoreError> {
        if expected == got {
            Ok(())
        } else {
            Err(CoreError::BufferSize { what, expected, got })
        }
    }
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;
