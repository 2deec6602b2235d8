//! Raw preset document model, straight from serde.
//!
//! These structs mirror the on-disk shape (JSON, TOML or YAML) with no
//! validation beyond what serde needs. Unknown fields are deliberately
//! ignored so newer presets keep loading on older builds.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Root of a preset document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetDoc {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Merge precedence across presets; higher wins. Defaults per layer.
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub settings: SettingsDoc,
    #[serde(default)]
    pub modes: Vec<ModeDoc>,
    /// Named default templates referenced by `use`
    #[serde(default)]
    pub defaults: BTreeMap<String, TemplateDoc>,
    #[serde(default)]
    pub bindings: Vec<EntryDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsDoc {
    /// How to treat a sequence that is both bound and a prefix of a longer
    /// binding: resolve via timeout (default) or reject at compile time.
    #[serde(default)]
    pub overlap: Option<OverlapDoc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapDoc {
    Timeout,
    Error,
}

/// A mode declaration with its per-mode settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModeDoc {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub line_numbers: Option<LineNumbersDoc>,
    /// Whether bare digit keys accumulate a repeat count in this mode
    #[serde(default)]
    pub counts: Option<bool>,
    /// Whether a bare `0` starts a count (false: `0` is looked up as a chord)
    #[serde(default)]
    pub zero_starts_count: Option<bool>,
    /// Defaults applied to this mode's nested bindings
    #[serde(default)]
    pub defaults: Option<TemplateDoc>,
    /// Bindings scoped to this mode
    #[serde(default)]
    pub bindings: Vec<EntryDoc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineNumbersDoc {
    Absolute,
    Relative,
    Off,
}

/// A named default template: fields merged into entries that reference it
/// (or, for mode/group defaults, into nested entries that omit them).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateDoc {
    #[serde(default)]
    pub mode: Option<StringOrList>,
    #[serde(default)]
    pub when: Option<String>,
    /// Named prefix scope to hang entries under
    #[serde(default)]
    pub prefix: Option<String>,
}

/// One binding entry: a concrete binding, a prefix declaration, or a group
/// with nested entries (which implicitly declares its key as a prefix).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryDoc {
    #[serde(default)]
    pub key: Option<StringOrList>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub mode: Option<StringOrList>,
    /// `true` declares this entry as a pure prefix; a string hangs this
    /// entry under the named prefix scope.
    #[serde(default)]
    pub prefix: Option<PrefixField>,
    /// Reference to a named template in the document's `defaults` section
    #[serde(default, rename = "use")]
    pub use_template: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Nested entries inheriting this entry's key as their prefix scope
    #[serde(default)]
    pub bindings: Vec<EntryDoc>,
}

/// A field that accepts either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn items(&self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s.clone()],
            StringOrList::Many(list) => list.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PrefixField {
    Declare(bool),
    Use(String),
}
