//! Command-line argument parsing for the preset tool
//!
//! Supports:
//! - Validating and compiling preset files
//! - Inspecting the compiled binding table
//! - Simulating key input against a preset
//! - Recording the active preset

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A declarative keybinding preset engine
#[derive(Parser, Debug)]
#[command(
    name = "keyloom",
    version,
    about = "Validate, inspect and simulate keybinding presets"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Validate preset files and compile them together
    Check {
        /// Preset files (.json, .toml, .yaml); default layers when omitted
        #[arg(value_name = "PRESETS")]
        paths: Vec<PathBuf>,
    },
    /// List the compiled bindings
    Inspect {
        #[arg(value_name = "PRESETS")]
        paths: Vec<PathBuf>,
        /// Only show bindings for this mode
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,
    },
    /// Feed a key sequence to the engine and print the dispatch trace
    Simulate {
        #[arg(value_name = "PRESETS")]
        paths: Vec<PathBuf>,
        /// Keys to feed, e.g. "3 d d" or "ctrl+x ctrl+s"
        #[arg(long, value_name = "KEYS")]
        keys: String,
        /// Mode to start in (default: the table's default mode)
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,
        /// Do not fire pending ambiguity timers after the last key
        #[arg(long)]
        no_elapse: bool,
    },
    /// Record a preset file as the active preset
    Activate {
        #[arg(value_name = "PRESET")]
        path: PathBuf,
    },
    /// Clear the active preset record
    Deactivate,
}

/// Merge-layer priority for the i-th preset on the command line: later
/// files override earlier ones unless a document sets its own priority.
pub fn layer_priority(index: usize) -> i32 {
    (index as i32) * 10
}
