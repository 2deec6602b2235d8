//! Declarative preset documents: parsing, validation and normalization
//!
//! A preset is a distributable bundle of mode and binding definitions.
//! This module turns raw documents (JSON/TOML/YAML) into flat, validated
//! [`BindingItem`](crate::keymap::BindingItem) lists the binding compiler
//! consumes, reporting every discoverable defect as a structured
//! [`ParseError`] rather than stopping at the first.

mod defaults;
mod document;
mod loader;
mod parser;

pub use defaults::{
    embedded_preset, find_preset_file, load_preset_layers, PRIORITY_EMBEDDED, PRIORITY_PROJECT,
    PRIORITY_USER,
};
pub use document::{EntryDoc, ModeDoc, PresetDoc, SettingsDoc, StringOrList, TemplateDoc};
pub use loader::{decode, load_preset_file, parse_preset, Format, LoadError};
pub use parser::{normalize, LineNumbers, Mode, OverlapPolicy, ParseError, Preset};
