//! Preset normalization: raw documents into flat, validated binding items.
//!
//! The nested mode/default/group structure of a preset document is resolved
//! here, up front, into a flat ordered list of [`BindingItem`]s — the
//! compiler never has to chase inheritance chains. Validation collects every
//! discoverable error instead of stopping at the first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::expr;
use crate::keymap::{ArgTemplate, BindingItem, Guard, SourceTag};
use crate::keymap::types::{parse_sequence, Keystroke};

use super::document::{
    EntryDoc, LineNumbersDoc, ModeDoc, OverlapDoc, PrefixField, PresetDoc, TemplateDoc,
};

/// A structured validation failure with enough context to fix the preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Path within the document ("bindings[3].key")
    pub path: String,
    pub message: String,
    /// Optional suggested fix
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "{}: {}", self.path, self.message)?;
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Per-mode line numbering, a display hint carried through to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineNumbers {
    #[default]
    Absolute,
    Relative,
    Off,
}

/// How a sequence that is both bound and a prefix of a longer binding is
/// handled: resolved by timeout at runtime, or rejected at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    #[default]
    Timeout,
    Error,
}

/// A normalized mode definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    pub name: String,
    pub display_name: Option<String>,
    pub line_numbers: LineNumbers,
    /// Whether bare digits accumulate a repeat count
    pub counts: bool,
    /// Whether a bare `0` starts a count (false: `0` resolves as a chord)
    pub zero_starts_count: bool,
}

impl Mode {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            line_numbers: LineNumbers::Absolute,
            counts: true,
            zero_starts_count: true,
        }
    }

    fn from_doc(doc: &ModeDoc) -> Self {
        Self {
            name: doc.name.clone(),
            display_name: doc.display_name.clone(),
            line_numbers: match doc.line_numbers {
                Some(LineNumbersDoc::Relative) => LineNumbers::Relative,
                Some(LineNumbersDoc::Off) => LineNumbers::Off,
                Some(LineNumbersDoc::Absolute) | None => LineNumbers::Absolute,
            },
            counts: doc.counts.unwrap_or(true),
            zero_starts_count: doc.zero_starts_count.unwrap_or(true),
        }
    }
}

/// A fully normalized preset: modes plus a flat, ordered binding-item list.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub priority: i32,
    pub overlap: OverlapPolicy,
    pub modes: Vec<Mode>,
    pub items: Vec<BindingItem>,
}

/// Normalize a raw document. `fallback_name` names presets whose document
/// omits one (usually the file stem); `default_priority` is the merge-layer
/// precedence used when the document does not set its own.
pub fn normalize(
    doc: &PresetDoc,
    fallback_name: &str,
    default_priority: i32,
) -> Result<Preset, Vec<ParseError>> {
    let name = doc
        .name
        .clone()
        .unwrap_or_else(|| fallback_name.to_string());
    let priority = doc.priority.unwrap_or(default_priority);
    let overlap = match doc.settings.overlap {
        Some(OverlapDoc::Error) => OverlapPolicy::Error,
        Some(OverlapDoc::Timeout) | None => OverlapPolicy::Timeout,
    };

    let mut normalizer = Normalizer {
        preset: name.clone(),
        priority,
        templates: &doc.defaults,
        declared_modes: BTreeSet::new(),
        declared_prefixes: BTreeSet::new(),
        items: Vec::new(),
        errors: Vec::new(),
        index: 0,
    };

    let mut modes = Vec::new();
    for (i, mode_doc) in doc.modes.iter().enumerate() {
        if normalizer.declared_modes.contains(&mode_doc.name) {
            normalizer.errors.push(ParseError::new(
                format!("modes[{}].name", i),
                format!("duplicate mode {:?}", mode_doc.name),
            ));
            continue;
        }
        normalizer.declared_modes.insert(mode_doc.name.clone());
        modes.push(Mode::from_doc(mode_doc));
    }

    // A preset with no modes section still needs one runtime mode
    if modes.is_empty() {
        modes.push(Mode::named("normal"));
        normalizer.declared_modes.insert("normal".to_string());
    }

    for (i, mode_doc) in doc.modes.iter().enumerate() {
        let base = mode_doc.defaults.clone().unwrap_or_default();
        let inherited = Inherited {
            modes: base
                .mode
                .as_ref()
                .map(|m| m.items())
                .unwrap_or_else(|| vec![mode_doc.name.clone()]),
            when: base.when.clone(),
            prefix: base.prefix.clone(),
        };
        for (j, entry) in mode_doc.bindings.iter().enumerate() {
            let path = format!("modes[{}].bindings[{}]", i, j);
            normalizer.walk_entry(entry, &path, &inherited);
        }
    }

    let root = Inherited::default();
    for (i, entry) in doc.bindings.iter().enumerate() {
        let path = format!("bindings[{}]", i);
        normalizer.walk_entry(entry, &path, &root);
    }

    if normalizer.errors.is_empty() {
        Ok(Preset {
            name,
            priority,
            overlap,
            modes,
            items: normalizer.items,
        })
    } else {
        Err(normalizer.errors)
    }
}

/// Fields flowing down from an enclosing mode section, group or template.
#[derive(Debug, Clone, Default)]
struct Inherited {
    modes: Vec<String>,
    when: Option<String>,
    prefix: Option<String>,
}

struct Normalizer<'a> {
    preset: String,
    priority: i32,
    templates: &'a BTreeMap<String, TemplateDoc>,
    declared_modes: BTreeSet<String>,
    declared_prefixes: BTreeSet<String>,
    items: Vec<BindingItem>,
    errors: Vec<ParseError>,
    index: usize,
}

impl Normalizer<'_> {
    fn walk_entry(&mut self, entry: &EntryDoc, path: &str, inherited: &Inherited) {
        let template = self.resolve_template(entry, path);

        let modes = self.effective_modes(entry, &template, inherited, path);
        let when_source = entry
            .when
            .clone()
            .or_else(|| template.when.clone())
            .or_else(|| inherited.when.clone());
        let scope = match &entry.prefix {
            Some(PrefixField::Use(name)) => Some(name.clone()),
            _ => template
                .prefix
                .clone()
                .or_else(|| inherited.prefix.clone()),
        };

        let keys = self.parse_keys(entry, path);
        let when = self.parse_when(when_source.as_deref(), path);
        let args = self.parse_args(entry, path);

        let declares = matches!(entry.prefix, Some(PrefixField::Declare(true)));
        let has_children = !entry.bindings.is_empty();

        if declares && entry.command.is_some() {
            self.errors.push(
                ParseError::new(
                    format!("{}.command", path),
                    "a prefix declaration cannot carry a command",
                )
                .with_suggestion("move the command to a nested binding"),
            );
        }

        if entry.command.is_none() && !declares && !has_children {
            self.errors.push(ParseError::new(
                path,
                "binding entry needs a command, nested bindings, or prefix: true",
            ));
            return;
        }

        if let Some(command) = entry.command.as_ref().filter(|_| !declares) {
            if let Some(keys) = keys.clone() {
                let source = self.tag(path);
                self.emit(BindingItem {
                    keys,
                    command: Some(command.clone()),
                    args: args.clone(),
                    when: when.clone(),
                    modes: modes.clone(),
                    prefix_scope: scope.clone(),
                    defines_prefix: None,
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    source,
                });
            }
        }

        if declares || has_children {
            let prefix_name = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("@{}", path));
            if !self.declared_prefixes.insert(prefix_name.clone()) {
                self.errors.push(ParseError::new(
                    format!("{}.name", path),
                    format!("duplicate prefix name {:?}", prefix_name),
                ));
            }
            if let Some(keys) = keys {
                let source = self.tag(path);
                self.emit(BindingItem {
                    keys,
                    command: None,
                    args: ArgTemplate::Null,
                    when: None,
                    modes: modes.clone(),
                    prefix_scope: scope,
                    defines_prefix: Some(prefix_name.clone()),
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    source,
                });
            }

            let child_scope = Inherited {
                modes,
                when: when_source,
                prefix: Some(prefix_name),
            };
            for (i, child) in entry.bindings.iter().enumerate() {
                let child_path = format!("{}.bindings[{}]", path, i);
                self.walk_entry(child, &child_path, &child_scope);
            }
        }
    }

    fn resolve_template(&mut self, entry: &EntryDoc, path: &str) -> TemplateDoc {
        let Some(name) = entry.use_template.as_ref() else {
            return TemplateDoc::default();
        };
        match self.templates.get(name) {
            Some(template) => template.clone(),
            None => {
                let known: Vec<&str> = self.templates.keys().map(String::as_str).collect();
                let mut error = ParseError::new(
                    format!("{}.use", path),
                    format!("unknown default template {:?}", name),
                );
                if !known.is_empty() {
                    error = error.with_suggestion(format!("available: {}", known.join(", ")));
                }
                self.errors.push(error);
                TemplateDoc::default()
            }
        }
    }

    fn effective_modes(
        &mut self,
        entry: &EntryDoc,
        template: &TemplateDoc,
        inherited: &Inherited,
        path: &str,
    ) -> Vec<String> {
        let modes = entry
            .mode
            .as_ref()
            .map(|m| m.items())
            .or_else(|| template.mode.as_ref().map(|m| m.items()))
            .unwrap_or_else(|| inherited.modes.clone());

        for mode in &modes {
            if !self.declared_modes.contains(mode) {
                self.errors.push(
                    ParseError::new(
                        format!("{}.mode", path),
                        format!("mode {:?} is not declared", mode),
                    )
                    .with_suggestion(format!("add {:?} to the modes section", mode)),
                );
            }
        }
        modes
    }

    fn parse_keys(&mut self, entry: &EntryDoc, path: &str) -> Option<Vec<Keystroke>> {
        let Some(key) = entry.key.as_ref() else {
            self.errors
                .push(ParseError::new(format!("{}.key", path), "missing key"));
            return None;
        };

        let mut keys = Vec::new();
        for chunk in key.items() {
            match parse_sequence(&chunk) {
                Ok(seq) => keys.extend(seq),
                Err(e) => {
                    self.errors.push(
                        ParseError::new(format!("{}.key", path), e.to_string()).with_suggestion(
                            "keys are chords like \"ctrl+x\" separated by spaces",
                        ),
                    );
                    return None;
                }
            }
        }
        Some(keys)
    }

    fn parse_when(&mut self, source: Option<&str>, path: &str) -> Option<Guard> {
        let source = source?;
        match expr::parse(source) {
            Ok(expr) => Some(Guard { expr }),
            Err(e) => {
                self.errors.push(ParseError::new(
                    format!("{}.when", path),
                    format!("invalid condition: {}", e),
                ));
                None
            }
        }
    }

    fn parse_args(&mut self, entry: &EntryDoc, path: &str) -> ArgTemplate {
        match entry.args.as_ref() {
            Some(value) => self.arg_template(value, &format!("{}.args", path)),
            None => ArgTemplate::Null,
        }
    }

    fn arg_template(&mut self, value: &serde_json::Value, path: &str) -> ArgTemplate {
        match value {
            serde_json::Value::Null => ArgTemplate::Null,
            serde_json::Value::Bool(b) => ArgTemplate::Bool(*b),
            serde_json::Value::Number(n) => ArgTemplate::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => ArgTemplate::Str(s.clone()),
            serde_json::Value::Array(items) => ArgTemplate::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.arg_template(item, &format!("{}[{}]", path, i)))
                    .collect(),
            ),
            serde_json::Value::Object(fields) => {
                // {"computed": "<expr>"} is the marker for a lazy leaf
                if fields.len() == 1 {
                    if let Some(serde_json::Value::String(source)) = fields.get("computed") {
                        return match expr::parse(source) {
                            Ok(expr) => ArgTemplate::Computed(expr),
                            Err(e) => {
                                self.errors.push(ParseError::new(
                                    format!("{}.computed", path),
                                    format!("invalid expression: {}", e),
                                ));
                                ArgTemplate::Null
                            }
                        };
                    }
                }
                ArgTemplate::Map(
                    fields
                        .iter()
                        .map(|(k, v)| {
                            (k.clone(), self.arg_template(v, &format!("{}.{}", path, k)))
                        })
                        .collect(),
                )
            }
        }
    }

    fn emit(&mut self, item: BindingItem) {
        self.items.push(item);
    }

    fn tag(&mut self, path: &str) -> SourceTag {
        let index = self.index;
        self.index += 1;
        SourceTag {
            preset: self.preset.clone(),
            priority: self.priority,
            index,
            path: path.to_string(),
        }
    }
}
