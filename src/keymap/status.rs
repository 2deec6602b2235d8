//! Status projection: pure rendering of the key-sequence state.
//!
//! Derives the status-bar string ("3× ^X") and an accessibility label from a
//! [`KeyState`] without touching it. Glyphs come from a configurable symbol
//! table so hosts can match their platform conventions.

use super::engine::KeyState;
use super::types::{KeyCode, Keystroke};

/// Glyphs used when rendering chords for the status surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    pub ctrl: String,
    pub alt: String,
    pub shift: String,
    pub meta: String,
    /// Appended after the count ("3× ")
    pub count_suffix: String,
    /// Between chords of a sequence
    pub separator: String,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            ctrl: "^".to_string(),
            alt: "⌥".to_string(),
            shift: "⇧".to_string(),
            meta: "⌘".to_string(),
            count_suffix: "× ".to_string(),
            separator: " ".to_string(),
        }
    }
}

/// What the status surface receives: display text plus a spoken label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub text: String,
    pub label: String,
}

impl StatusUpdate {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Render the pending count and prefix as status text.
///
/// Empty state projects to the empty string.
pub fn project(state: &KeyState, symbols: &SymbolTable) -> String {
    let mut out = String::new();

    if let Some(count) = state.count {
        out.push_str(&count.to_string());
        out.push_str(&symbols.count_suffix);
    }

    let chords: Vec<String> = state
        .prefix
        .iter()
        .map(|stroke| render_chord(stroke, symbols))
        .collect();
    out.push_str(&chords.join(&symbols.separator));

    out
}

/// Spoken rendering of the same state, for the accessibility label.
pub fn accessible_label(state: &KeyState) -> String {
    let mut parts = Vec::new();

    if let Some(count) = state.count {
        parts.push(format!("{} times", count));
    }

    for stroke in &state.prefix {
        let mut words: Vec<String> =
            stroke.mods.names().iter().map(|s| s.to_string()).collect();
        words.push(stroke.key.canonical_name());
        parts.push(words.join(" "));
    }

    parts.join(" ")
}

fn render_chord(stroke: &Keystroke, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    // Fixed composition order: ctrl, alt, shift, meta
    if stroke.mods.ctrl() {
        out.push_str(&symbols.ctrl);
    }
    if stroke.mods.alt() {
        out.push_str(&symbols.alt);
    }
    if stroke.mods.shift() {
        out.push_str(&symbols.shift);
    }
    if stroke.mods.meta() {
        out.push_str(&symbols.meta);
    }
    out.push_str(&render_key(stroke.key));
    out
}

fn render_key(key: KeyCode) -> String {
    match key {
        KeyCode::Char(c) => c.to_uppercase().to_string(),
        KeyCode::Up => "↑".to_string(),
        KeyCode::Down => "↓".to_string(),
        KeyCode::Left => "←".to_string(),
        KeyCode::Right => "→".to_string(),
        KeyCode::Space => "␣".to_string(),
        other => {
            // Capitalized canonical name ("Enter", "Escape", "F5")
            let name = other.canonical_name();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => name,
            }
        }
    }
}
