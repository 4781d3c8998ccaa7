//! Capability traits composed into the unit operation contract.
//!
//! - [`ParameterProvider`]: parameter access and sensitivity toggles,
//!   forwarded to the unit's [`ParameterRegistry`](crate::registry::ParameterRegistry)
//! - [`ExportSolution`]: state layout and exporter construction
//! - [`ResidualAssembly`]: residual and Jacobian-vector products
//! - [`UnitOperation`]: the composition, providing `residual_sens_fwd_combine`
//!
//! Concrete models embed a registry and a layout and implement the accessor
//! methods; everything else comes from provided methods.

pub mod export;
pub mod parameters;
pub mod residual;
pub mod unit_operation;

pub use export::ExportSolution;
pub use parameters::ParameterProvider;
pub use residual::ResidualAssembly;
pub use unit_operation::{combine_sensitivity_directions, UnitOperation};
