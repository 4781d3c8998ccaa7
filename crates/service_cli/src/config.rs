//! Simulation file loading.
//!
//! Files are read through the `config` crate so that every key can be
//! overridden from `CHROMA__*` environment variables.

use std::path::Path;

use chroma_models::config::SimulationConfig;
use ::config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::{CliError, Result};

/// Environment prefix of configuration overrides.
pub const ENV_PREFIX: &str = "CHROMA";

/// Loads and validates a simulation file.
pub fn load_simulation(path: &str) -> Result<SimulationConfig> {
    if !Path::new(path).exists() {
        return Err(CliError::FileNotFound(path.to_string()));
    }
    debug!(path, "loading simulation");

    let cfg: SimulationConfig = Config::builder()
        .add_source(File::from(Path::new(path)).format(FileFormat::Toml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

/// Writes `cfg` as pretty TOML.
pub fn write_simulation(cfg: &SimulationConfig, path: &str) -> Result<()> {
    let text = toml::to_string_pretty(cfg)?;
    std::fs::write(path, text)?;
    Ok(())
}
