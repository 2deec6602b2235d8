//! Binding compiler: normalized preset items into a conflict-free table.
//!
//! Expansion happens in four passes: mode replication, prefix-chain
//! resolution, override/conflict arbitration, and overlap validation.
//! Compilation is deterministic — the same presets always produce an
//! identical table, and every unresolved ambiguity is an error, never a
//! silent pick.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::preset::{Mode, OverlapPolicy, Preset};

use super::binding::{BindingItem, SourceTag};
use super::table::{CompiledBinding, CompiledBindingTable};
use super::types::{format_sequence, Keystroke};

/// Pseudo-command that removes an inherited binding instead of adding one.
pub const UNBOUND_COMMAND: &str = "unbound";

/// Structural defect in an otherwise-valid preset set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Two items of equal precedence bind the same (mode, sequence)
    Conflict {
        mode: String,
        sequence: String,
        first: SourceTag,
        second: SourceTag,
    },
    /// A bound sequence is also a strict prefix of a longer binding and the
    /// preset's overlap policy forbids timeout resolution
    Overlap {
        mode: String,
        shorter: String,
        longer: String,
        shorter_source: SourceTag,
        longer_source: SourceTag,
    },
    /// Malformed prefix chain: dangling reference or self-referential loop
    Prefix {
        reference: String,
        source: SourceTag,
        message: String,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Conflict {
                mode,
                sequence,
                first,
                second,
            } => write!(
                f,
                "ambiguous binding for {:?} in mode {:?}: {} and {} have equal precedence",
                sequence, mode, first, second
            ),
            CompileError::Overlap {
                mode,
                shorter,
                longer,
                shorter_source,
                longer_source,
            } => write!(
                f,
                "{:?} ({}) is both bound and a prefix of {:?} ({}) in mode {:?}, \
                 and the overlap policy is set to error",
                shorter, shorter_source, longer, longer_source, mode
            ),
            CompileError::Prefix {
                reference,
                source,
                message,
            } => write!(f, "prefix {:?} referenced by {}: {}", reference, source, message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile a stack of normalized presets into a binding table.
///
/// Presets are given in merge order; each carries its own priority. Later
/// declarations win within a preset, higher priority wins across presets,
/// and residual equal-precedence collisions abort compilation.
pub fn compile(presets: &[Preset]) -> Result<CompiledBindingTable, CompileError> {
    let mut modes: BTreeMap<String, Mode> = BTreeMap::new();
    let mut default_mode = None;
    for preset in presets {
        for mode in &preset.modes {
            if default_mode.is_none() {
                default_mode = Some(mode.name.clone());
            }
            // Mode settings come from the first preset declaring the mode;
            // later presets add modes but cannot silently redefine them
            modes
                .entry(mode.name.clone())
                .or_insert_with(|| mode.clone());
        }
    }
    let default_mode = default_mode.unwrap_or_else(|| "normal".to_string());
    modes
        .entry(default_mode.clone())
        .or_insert_with(|| Mode::named(&default_mode));

    let overlap = if presets.iter().any(|p| p.overlap == OverlapPolicy::Error) {
        OverlapPolicy::Error
    } else {
        OverlapPolicy::Timeout
    };

    let resolver = PrefixResolver::new(presets);
    let all_modes: Vec<String> = modes.keys().cloned().collect();

    // (mode, full sequence, guard text) → winning item after override rules
    let mut cells: HashMap<CellKey, Candidate<'_>> = HashMap::new();

    for (preset_idx, preset) in presets.iter().enumerate() {
        for item in &preset.items {
            let Some(command) = item.command.as_ref() else {
                continue;
            };

            let mut full = resolver.scope_keys(item, preset_idx)?;
            full.extend(item.keys.iter().copied());

            let item_modes: &[String] = if item.modes.is_empty() {
                &all_modes
            } else {
                &item.modes
            };

            for mode in item_modes {
                let key = CellKey {
                    mode: mode.clone(),
                    seq: full.clone(),
                    guard: item.when.as_ref().map(|g| g.source().to_string()),
                };
                let candidate = Candidate {
                    item,
                    command,
                    seq: full.clone(),
                };
                match cells.entry(key) {
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                    std::collections::hash_map::Entry::Occupied(mut slot) => {
                        let existing = slot.get();
                        if existing.item.source.preset == item.source.preset {
                            // Later declaration wins within one preset
                            tracing::debug!(
                                "{} overrides {} for {:?} in mode {:?}",
                                item.source,
                                existing.item.source,
                                format_sequence(&candidate.seq),
                                mode
                            );
                            slot.insert(candidate);
                        } else if item.source.priority > existing.item.source.priority {
                            slot.insert(candidate);
                        } else if item.source.priority == existing.item.source.priority {
                            return Err(CompileError::Conflict {
                                mode: mode.clone(),
                                sequence: format_sequence(&candidate.seq),
                                first: existing.item.source.clone(),
                                second: item.source.clone(),
                            });
                        }
                        // Lower priority: existing binding stands
                    }
                }
            }
        }
    }

    // Group surviving cells by (mode, sequence); unbound tombstones drop out
    let mut grouped: HashMap<(String, Vec<Keystroke>), Vec<CompiledBinding>> = HashMap::new();
    for (key, candidate) in cells {
        if candidate.command == UNBOUND_COMMAND {
            continue;
        }
        let item = candidate.item;
        grouped
            .entry((key.mode, key.seq))
            .or_default()
            .push(CompiledBinding {
                command: candidate.command.to_string(),
                args: item.args.clone(),
                guard: item.when.clone(),
                name: item.name.clone(),
                description: item.description.clone(),
                source: item.source.clone(),
            });
    }

    // Guarded candidates are tried before unguarded ones at dispatch; order
    // within each group must not depend on hash iteration.
    for candidates in grouped.values_mut() {
        candidates.sort_by(|a, b| {
            let a_key = (a.guard.is_none(), -a.source.priority, &a.source.preset, a.source.index);
            let b_key = (b.guard.is_none(), -b.source.priority, &b.source.preset, b.source.index);
            a_key.cmp(&b_key)
        });
    }

    if overlap == OverlapPolicy::Error {
        check_overlaps(&grouped)?;
    }

    let cells_vec: Vec<(String, Vec<Keystroke>, Vec<CompiledBinding>)> = grouped
        .into_iter()
        .map(|((mode, seq), candidates)| (mode, seq, candidates))
        .collect();

    let table = CompiledBindingTable::build(modes, default_mode, cells_vec);
    tracing::info!("Compiled binding table with {} cells", table.len());
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CellKey {
    mode: String,
    seq: Vec<Keystroke>,
    guard: Option<String>,
}

struct Candidate<'a> {
    item: &'a BindingItem,
    command: &'a str,
    seq: Vec<Keystroke>,
}

/// Resolves named prefix scopes to their full chord sequences.
///
/// A reference is looked up in the item's own preset first, then across the
/// other presets in stack order, so a user preset can hang bindings under a
/// prefix the default preset declares.
struct PrefixResolver<'a> {
    per_preset: Vec<HashMap<&'a str, &'a BindingItem>>,
}

impl<'a> PrefixResolver<'a> {
    fn new(presets: &'a [Preset]) -> Self {
        let per_preset = presets
            .iter()
            .map(|preset| {
                let mut decls = HashMap::new();
                for item in &preset.items {
                    if let Some(name) = item.defines_prefix.as_deref() {
                        decls.insert(name, item);
                    }
                }
                decls
            })
            .collect();
        Self { per_preset }
    }

    fn find(&self, name: &str, origin: usize) -> Option<&'a BindingItem> {
        if let Some(item) = self.per_preset.get(origin).and_then(|m| m.get(name)) {
            return Some(item);
        }
        self.per_preset
            .iter()
            .find_map(|decls| decls.get(name).copied())
    }

    /// The chords contributed by `item`'s prefix scope, outermost first.
    fn scope_keys(
        &self,
        item: &BindingItem,
        origin: usize,
    ) -> Result<Vec<Keystroke>, CompileError> {
        let Some(reference) = item.prefix_scope.as_deref() else {
            return Ok(Vec::new());
        };
        let mut stack = Vec::new();
        self.resolve(reference, origin, &item.source, &mut stack)
    }

    fn resolve(
        &self,
        name: &str,
        origin: usize,
        referrer: &SourceTag,
        stack: &mut Vec<String>,
    ) -> Result<Vec<Keystroke>, CompileError> {
        if stack.iter().any(|seen| seen == name) {
            return Err(CompileError::Prefix {
                reference: name.to_string(),
                source: referrer.clone(),
                message: format!(
                    "self-referential prefix chain ({} -> {})",
                    stack.join(" -> "),
                    name
                ),
            });
        }
        let Some(decl) = self.find(name, origin) else {
            return Err(CompileError::Prefix {
                reference: name.to_string(),
                source: referrer.clone(),
                message: "no prefix declaration with this name".to_string(),
            });
        };

        stack.push(name.to_string());
        let mut keys = match decl.prefix_scope.as_deref() {
            Some(outer) => self.resolve(outer, origin, &decl.source, stack)?,
            None => Vec::new(),
        };
        stack.pop();

        keys.extend(decl.keys.iter().copied());
        Ok(keys)
    }
}

fn check_overlaps(
    grouped: &HashMap<(String, Vec<Keystroke>), Vec<CompiledBinding>>,
) -> Result<(), CompileError> {
    let mut keys: Vec<_> = grouped.keys().collect();
    keys.sort();

    for (mode, seq) in &keys {
        for (other_mode, longer) in &keys {
            if mode == other_mode && longer.len() > seq.len() && longer[..seq.len()] == seq[..] {
                return Err(CompileError::Overlap {
                    mode: mode.clone(),
                    shorter: format_sequence(seq),
                    longer: format_sequence(longer),
                    shorter_source: grouped[&(mode.clone(), seq.clone())][0].source.clone(),
                    longer_source: grouped[&(other_mode.clone(), longer.clone())][0]
                        .source
                        .clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::table::Lookup;
    use crate::keymap::types::parse_sequence;
    use crate::preset::{normalize, PresetDoc};

    fn preset_from_json(json: &str, name: &str, priority: i32) -> Preset {
        let doc: PresetDoc = serde_json::from_str(json).unwrap();
        normalize(&doc, name, priority).unwrap()
    }

    fn exact_command(table: &CompiledBindingTable, mode: &str, seq: &str) -> Option<String> {
        let seq = parse_sequence(seq).unwrap();
        match table.lookup(mode, &seq) {
            Lookup::Exact(c) | Lookup::ExactAndPrefix(c) => Some(c[0].command.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_compile_simple() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "ctrl+x ctrl+s", "command": "file.save"},
                {"key": "ctrl+x ctrl+f", "command": "file.open"}
            ]}"#,
            "t",
            0,
        );
        let table = compile(&[preset]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            exact_command(&table, "normal", "ctrl+x ctrl+s").unwrap(),
            "file.save"
        );
    }

    #[test]
    fn test_empty_mode_set_replicates_into_all_modes() {
        let preset = preset_from_json(
            r#"{
                "modes": [{"name": "normal"}, {"name": "visual"}],
                "bindings": [{"key": "ctrl+s", "command": "file.save"}]
            }"#,
            "t",
            0,
        );
        let table = compile(&[preset]).unwrap();
        assert!(exact_command(&table, "normal", "ctrl+s").is_some());
        assert!(exact_command(&table, "visual", "ctrl+s").is_some());
    }

    #[test]
    fn test_later_declaration_wins_within_preset() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "a", "command": "first"},
                {"key": "a", "command": "second"}
            ]}"#,
            "t",
            0,
        );
        let table = compile(&[preset]).unwrap();
        assert_eq!(exact_command(&table, "normal", "a").unwrap(), "second");
    }

    #[test]
    fn test_higher_priority_preset_wins() {
        let base = preset_from_json(
            r#"{"bindings": [{"key": "a", "command": "base"}]}"#,
            "base",
            0,
        );
        let user = preset_from_json(
            r#"{"bindings": [{"key": "a", "command": "user"}]}"#,
            "user",
            10,
        );
        let table = compile(&[base, user]).unwrap();
        assert_eq!(exact_command(&table, "normal", "a").unwrap(), "user");

        // Order in the slice does not matter, priority does
        let base = preset_from_json(
            r#"{"bindings": [{"key": "a", "command": "base"}]}"#,
            "base",
            0,
        );
        let user = preset_from_json(
            r#"{"bindings": [{"key": "a", "command": "user"}]}"#,
            "user",
            10,
        );
        let table = compile(&[user, base]).unwrap();
        assert_eq!(exact_command(&table, "normal", "a").unwrap(), "user");
    }

    #[test]
    fn test_equal_precedence_conflict_is_error() {
        let a = preset_from_json(r#"{"bindings": [{"key": "a", "command": "one"}]}"#, "a", 5);
        let b = preset_from_json(r#"{"bindings": [{"key": "a", "command": "two"}]}"#, "b", 5);
        match compile(&[a, b]) {
            Err(CompileError::Conflict { first, second, .. }) => {
                assert_eq!(first.preset, "a");
                assert_eq!(second.preset, "b");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_unbound_removes_inherited_binding() {
        let base = preset_from_json(
            r#"{"bindings": [{"key": "ctrl+q", "command": "app.quit"}]}"#,
            "base",
            0,
        );
        let user = preset_from_json(
            r#"{"bindings": [{"key": "ctrl+q", "command": "unbound"}]}"#,
            "user",
            10,
        );
        let table = compile(&[base, user]).unwrap();
        let seq = parse_sequence("ctrl+q").unwrap();
        assert_eq!(table.lookup("normal", &seq), Lookup::None);
    }

    #[test]
    fn test_prefix_chain_resolution() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "space", "name": "leader", "prefix": true},
                {"key": "f", "name": "files", "prefix": true, "bindings": [
                    {"key": "s", "command": "file.save"}
                ]}
            ]}"#,
            "t",
            0,
        );
        // "files" is not nested under "leader" here, so "f s" resolves from
        // the "files" declaration alone
        let table = compile(&[preset]).unwrap();
        assert_eq!(
            exact_command(&table, "normal", "f s").unwrap(),
            "file.save"
        );
    }

    #[test]
    fn test_nested_prefix_chain() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "space", "name": "leader", "prefix": true, "bindings": [
                    {"key": "f", "name": "files", "prefix": true, "bindings": [
                        {"key": "s", "command": "file.save"}
                    ]}
                ]}
            ]}"#,
            "t",
            0,
        );
        let table = compile(&[preset]).unwrap();
        assert_eq!(
            exact_command(&table, "normal", "space f s").unwrap(),
            "file.save"
        );
    }

    #[test]
    fn test_dangling_prefix_reference_is_error() {
        let preset = preset_from_json(
            r#"{"bindings": [{"key": "s", "command": "x", "prefix": "ghost"}]}"#,
            "t",
            0,
        );
        match compile(&[preset]) {
            Err(CompileError::Prefix { reference, .. }) => assert_eq!(reference, "ghost"),
            other => panic!("expected prefix error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_referential_prefix_is_error() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "a", "name": "x", "prefix": true},
                {"key": "b", "command": "cmd", "prefix": "x"}
            ]}"#,
            "t",
            0,
        );
        // Make the declaration reference itself
        let mut preset = preset;
        for item in &mut preset.items {
            if item.defines_prefix.as_deref() == Some("x") {
                item.prefix_scope = Some("x".to_string());
            }
        }
        match compile(&[preset]) {
            Err(CompileError::Prefix { message, .. }) => {
                assert!(message.contains("self-referential"));
            }
            other => panic!("expected prefix error, got {:?}", other),
        }
    }

    #[test]
    fn test_overlap_allowed_by_default() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "g", "command": "cursor.lineStart"},
                {"key": "g g", "command": "cursor.fileStart"}
            ]}"#,
            "t",
            0,
        );
        let table = compile(&[preset]).unwrap();
        let g = parse_sequence("g").unwrap();
        assert!(matches!(
            table.lookup("normal", &g),
            Lookup::ExactAndPrefix(_)
        ));
    }

    #[test]
    fn test_overlap_rejected_under_error_policy() {
        let preset = preset_from_json(
            r#"{
                "settings": {"overlap": "error"},
                "bindings": [
                    {"key": "g", "command": "cursor.lineStart"},
                    {"key": "g g", "command": "cursor.fileStart"}
                ]
            }"#,
            "t",
            0,
        );
        match compile(&[preset]) {
            Err(CompileError::Overlap { shorter, longer, .. }) => {
                assert_eq!(shorter, "g");
                assert_eq!(longer, "g g");
            }
            other => panic!("expected overlap error, got {:?}", other),
        }
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let make = || {
            preset_from_json(
                r#"{
                    "modes": [{"name": "normal"}, {"name": "visual"}],
                    "bindings": [
                        {"key": "g", "command": "cursor.lineStart"},
                        {"key": "g g", "command": "cursor.fileStart"},
                        {"key": "d", "command": "lines.delete", "when": "count > 1"},
                        {"key": "d", "command": "char.delete"}
                    ]
                }"#,
                "t",
                0,
            )
        };
        let first = compile(&[make()]).unwrap();
        let second = compile(&[make()]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_guarded_and_unguarded_coexist_guarded_first() {
        let preset = preset_from_json(
            r#"{"bindings": [
                {"key": "d", "command": "char.delete"},
                {"key": "d", "command": "lines.delete", "when": "count > 1"}
            ]}"#,
            "t",
            0,
        );
        let table = compile(&[preset]).unwrap();
        let d = parse_sequence("d").unwrap();
        match table.lookup("normal", &d) {
            Lookup::Exact(candidates) => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates[0].guard.is_some());
                assert!(candidates[1].guard.is_none());
            }
            other => panic!("expected Exact, got {:?}", other),
        }
    }
}
