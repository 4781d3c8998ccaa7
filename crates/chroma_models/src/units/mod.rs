//! Unit operation models.
//!
//! - [`GeneralRateModel`]: column with axial dispersion, film transfer and
//!   spherical particles
//! - [`Inlet`]: piecewise cubic concentration profile
//! - [`Cstr`]: stirred tank with variable volume
//! - [`UnitOperationEnum`]: static dispatch over the above

pub mod cstr;
pub mod general_rate;
pub mod inlet;
pub mod unit_enum;

pub use cstr::Cstr;
pub use general_rate::GeneralRateModel;
pub use inlet::Inlet;
pub use unit_enum::UnitOperationEnum;
