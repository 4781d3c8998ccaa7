//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

pub mod create_mclin;
pub mod inspect;
pub mod sens;
