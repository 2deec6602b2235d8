//! Binding compilation and the runtime key-sequence engine
//!
//! This module is the core of keyloom:
//! - Normalized preset items are compiled into an immutable
//!   [`CompiledBindingTable`] (modes expanded, prefix chains resolved,
//!   conflicts rejected deterministically)
//! - [`KeymapEngine`] consumes keystrokes one at a time against that table,
//!   accumulating counts and prefixes and emitting side effects
//! - [`status`] projects the engine's observable state into status-bar text
//!
//! # Architecture
//!
//! ```text
//! Vec<Preset> → compile() → CompiledBindingTable
//!                                  │
//! Event (key/timer/mode) → KeymapEngine::handle() → Vec<Effect>
//! ```

mod binding;
mod compile;
mod engine;
mod status;
mod table;
pub mod types;

pub use binding::{ArgTemplate, BindingItem, Guard, SourceTag};
pub use compile::{compile, CompileError, UNBOUND_COMMAND};
pub use engine::{Effect, EngineState, Event, Invocation, KeymapEngine, KeyState};
pub use status::{accessible_label, project, StatusUpdate, SymbolTable};
pub use table::{CompiledBinding, CompiledBindingTable, Lookup};
