//! chroma CLI - Command Line Operations for Unit Operation Models
//!
//! This is the operational entry point for the chroma-rs model library.
//!
//! # Commands
//!
//! - `chroma create-mclin --out <file>` - Write the two-component linear benchmark
//! - `chroma inspect [file]` - Print unit layouts and parameter values
//! - `chroma sens [file] --time <t>` - Evaluate the parameter sensitivity residuals
//!
//! # Configuration
//!
//! Simulation files are TOML. Any key can be overridden from the
//! environment with the `CHROMA__` prefix and `__` as the path separator,
//! e.g. `CHROMA__SOLVER__NTHREADS=4`.

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;

pub use error::{CliError, Result};

/// chroma-rs unit operation CLI
#[derive(Parser)]
#[command(name = "chroma")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Simulation file used when a command is given no file
    #[arg(short, long, global = true, default_value = "chroma.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the two-component linear benchmark case
    CreateMclin {
        /// Output file
        #[arg(short, long, default_value = "mclin.toml")]
        out: String,

        /// Kinetic instead of quasi-stationary binding
        #[arg(short, long)]
        kinetic: bool,

        /// Sensitive parameter, NAME[:unit[:comp[:bound[:section]]]] (repeatable)
        #[arg(short, long = "sens")]
        sens: Vec<String>,
    },

    /// Print unit layouts and parameter values of a simulation file
    Inspect {
        /// Simulation file
        file: Option<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Only show units of this type (e.g. GENERAL_RATE_MODEL, INLET, CSTR)
        #[arg(short = 't', long)]
        unit_type: Option<String>,
    },

    /// Evaluate the parameter sensitivity residuals at the initial state
    Sens {
        /// Simulation file
        file: Option<String>,

        /// Evaluation time
        #[arg(short, long, default_value = "0")]
        time: f64,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Initialise tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::CreateMclin { out, kinetic, sens } => commands::create_mclin::run(&out, kinetic, &sens),
        Commands::Inspect { file, json, unit_type } => {
            let file = file.unwrap_or(cli.config);
            commands::inspect::run(&file, json, unit_type.as_deref())
        }
        Commands::Sens { file, time, json } => {
            let file = file.unwrap_or(cli.config);
            commands::sens::run(&file, time, json)
        }
    }
}
