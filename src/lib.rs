//! keyloom - a declarative keybinding preset engine
//!
//! This crate turns declarative keybinding presets (JSON/TOML/YAML) into a
//! compiled, conflict-free binding table and runs an event-driven
//! key-sequence state machine over it: modes, repeat counts, multi-chord
//! prefixes, timeout-resolved ambiguity and live status feedback.

pub mod activation;
pub mod cli;
pub mod config;
pub mod config_paths;
pub mod dispatch;
pub mod expr;
pub mod keymap;
pub mod preset;
pub mod tracing;

// Re-export commonly used types
pub use config::EngineConfig;
pub use keymap::{compile, CompiledBindingTable, Effect, Event, KeymapEngine};
pub use preset::{ParseError, Preset};
