//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use keyloom::keymap::types::parse_sequence;
use keyloom::keymap::{compile, CompiledBindingTable, Effect, Event, Invocation, KeymapEngine};
use keyloom::preset::{normalize, Preset, PresetDoc};

/// Normalize a JSON preset document with an explicit name and priority.
pub fn preset_from_json(json: &str, name: &str, priority: i32) -> Preset {
    let doc: PresetDoc = serde_json::from_str(json).expect("test preset JSON must parse");
    normalize(&doc, name, priority).expect("test preset must validate")
}

/// Compile a single JSON preset into a table.
pub fn table_from_json(json: &str) -> CompiledBindingTable {
    compile(&[preset_from_json(json, "test", 0)]).expect("test preset must compile")
}

/// Build an engine over a single JSON preset.
pub fn engine_from_json(json: &str) -> KeymapEngine {
    KeymapEngine::new(table_from_json(json))
}

/// Feed a whitespace-separated key sequence, collecting all effects.
pub fn feed(engine: &mut KeymapEngine, keys: &str) -> Vec<Effect> {
    let mut effects = Vec::new();
    for stroke in parse_sequence(keys).expect("test key sequence must parse") {
        effects.extend(engine.handle(Event::Key(stroke)));
    }
    effects
}

/// The invocations dispatched among `effects`, in order.
pub fn dispatched(effects: &[Effect]) -> Vec<Invocation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Dispatch(inv) => Some(inv.clone()),
            _ => None,
        })
        .collect()
}

/// The generation of the first scheduled ambiguity timeout, if any.
pub fn scheduled_timeout(effects: &[Effect]) -> Option<u64> {
    effects.iter().find_map(|e| match e {
        Effect::ScheduleTimeout { generation, .. } => Some(*generation),
        _ => None,
    })
}
