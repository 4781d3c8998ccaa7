//! Error types for model construction and the unit operation network.
//!
//! This module provides:
//! - `ModelError`: configuration and lookup errors, wrapping `CoreError`

use chroma_core::types::{CoreError, UnitOpIdx};
use thiserror::Error;

/// Errors raised while building or driving unit operation models.
///
/// # Examples
/// ```
/// use chroma_models::ModelError;
///
/// let err = ModelError::UnitNotFound(4);
/// assert_eq!(format!("{}", err), "Unit operation not found: 4");
/// ```
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// Error raised by the registry, layout or exporter layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unit type string is not supported.
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    /// Unit operation index does not exist in the network.
    #[error("Unit operation not found: {0}")]
    UnitNotFound(UnitOpIdx),
}

impl ModelError {
    /// Shorthand for [`ModelError::InvalidConfig`].
    pub fn config(msg: impl Into<String>) -> Self {
        ModelError::InvalidConfig(msg.into())
    }
}

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::types::{ParameterId, ParameterName};

    #[test]
    fn test_core_error_is_transparent() {
        let id = ParameterId::new(ParameterName::Velocity).unit(0);
        let core = CoreError::ParameterNotFound(id);
        let err: ModelError = core.clone().into();
        assert_eq!(err.to_string(), core.to_string());
    }

    #[test]
    fn test_config_shorthand() {
        let err = ModelError::config("ncomp must be positive");
        assert!(matches!(err, ModelError::InvalidConfig(_)));
    }
}
