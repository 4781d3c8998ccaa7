//! # chroma_models (L2: Unit Operations)
//!
//! Concrete unit operation models built on the chroma_core contract, and
//! the network that couples them.
//!
//! This crate provides:
//! - Serde configuration types for units, switches, time line and
//!   sensitivities (`config`)
//! - General rate model column, piecewise cubic inlet and stirred tank
//!   (`units`)
//! - Static dispatch over the models (`units::UnitOperationEnum`)
//! - The coupled network with parallel sensitivity combination (`system`)
//!
//! ## Usage
//!
//! ```rust
//! use chroma_core::types::{Active, ParameterId, ParameterName};
//! use chroma_models::config::{SensitivityParameterConfig, SimulationConfig};
//! use chroma_models::system::ModelSystem;
//!
//! let mut cfg = SimulationConfig::linear_benchmark(true);
//! let velocity = ParameterId::new(ParameterName::Velocity).unit(0);
//! cfg.sensitivity.parameters.push(SensitivityParameterConfig::new(velocity));
//!
//! let system = ModelSystem::from_config(&cfg).unwrap();
//! let y = system.initial_state().unwrap();
//! let y_dot = vec![0.0; y.len()];
//! let mut res = vec![Active::default(); y.len()];
//! system.residual_ad(0.0, 0, &y, &y_dot, &mut res).unwrap();
//! assert_eq!(system.num_sens_params(), 1);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod error;
pub mod system;
pub mod units;

pub use error::{ModelError, ModelResult};
