//! # chroma_core: DOF Exposure and Sensitivity Bookkeeping
//!
//! ## Layer 1 (Foundation) Role
//!
//! chroma_core is the bottom layer of the workspace. It provides the pieces
//! every unit operation model shares, independent of the physics it solves:
//! - Parameter identities and the enumerated parameter names (`types::param_id`)
//! - Differentiable scalar storage for forward sensitivities (`types::active`)
//! - The per-unit parameter registry (`registry`)
//! - State layouts and the strided solution exporter (`solution`)
//! - Capability traits composed into the unit operation contract (`traits`)
//! - Error types: `CoreError` (`types::error`)
//!
//! ## Usage Examples
//!
//! ```rust
//! use chroma_core::registry::ParameterRegistry;
//! use chroma_core::types::{AdConfig, ParameterId, ParameterName};
//!
//! let mut registry = ParameterRegistry::new(0, AdConfig::new(4));
//! let velocity = ParameterId::new(ParameterName::Velocity).unit(0);
//! registry.register(velocity, 5.75e-4).unwrap();
//!
//! // Broadcast-style updates soft-fail on identities the unit does not own
//! assert!(registry.set_parameter(&velocity, 1.0e-3));
//! let other = ParameterId::new(ParameterName::Velocity).unit(7);
//! assert!(!registry.set_parameter(&other, 1.0e-3));
//!
//! // Sensitivity tracking assigns an AD direction to the parameter
//! assert!(registry.set_sensitive_parameter(&velocity, 2, 1.0).unwrap());
//! assert_eq!(registry.num_sens_params(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `num-dual-mode` (default): bridge `Active` to `num_dual::Dual64` for verification
//! - `serde`: serialisation for `ParameterId`, `ParameterName` and `StateOrdering`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod registry;
pub mod solution;
pub mod traits;
pub mod types;
