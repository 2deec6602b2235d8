//! The compiled binding table: immutable output of the binding compiler.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::preset::Mode;

use super::binding::{ArgTemplate, Guard, SourceTag};
use super::types::{format_sequence, Keystroke};

/// One resolved binding: command plus arg template, with an optional guard.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBinding {
    pub command: String,
    pub args: ArgTemplate,
    pub guard: Option<Guard>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub source: SourceTag,
}

/// Result of looking up a key sequence in one mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    /// Nothing bound here and no longer binding starts this way
    None,
    /// Not bound itself, but a strict prefix of longer bindings
    Prefix,
    /// Bound, and no longer binding extends it
    Exact(&'a [CompiledBinding]),
    /// Bound, and at least one longer binding also starts this way
    ExactAndPrefix(&'a [CompiledBinding]),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ModeTable {
    /// Full sequence → candidates, guarded candidates first
    entries: HashMap<Vec<Keystroke>, Vec<CompiledBinding>>,
    /// Every strict prefix of every bound sequence
    prefixes: HashSet<Vec<Keystroke>>,
}

/// Mapping from (mode, full key sequence) to resolved command invocations.
///
/// Immutable once built; the state machine and status projection share it
/// read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBindingTable {
    modes: BTreeMap<String, Mode>,
    default_mode: String,
    tables: HashMap<String, ModeTable>,
}

impl CompiledBindingTable {
    pub(super) fn build(
        modes: BTreeMap<String, Mode>,
        default_mode: String,
        cells: Vec<(String, Vec<Keystroke>, Vec<CompiledBinding>)>,
    ) -> Self {
        let mut tables: HashMap<String, ModeTable> = HashMap::new();
        for name in modes.keys() {
            tables.insert(name.clone(), ModeTable::default());
        }

        for (mode, seq, candidates) in cells {
            let table = tables.entry(mode).or_default();
            for len in 1..seq.len() {
                table.prefixes.insert(seq[..len].to_vec());
            }
            table.entries.insert(seq, candidates);
        }

        Self {
            modes,
            default_mode,
            tables,
        }
    }

    /// Look up a typed sequence in the given mode.
    pub fn lookup(&self, mode: &str, seq: &[Keystroke]) -> Lookup<'_> {
        let Some(table) = self.tables.get(mode) else {
            return Lookup::None;
        };
        let exact = table.entries.get(seq).map(|c| c.as_slice());
        let is_prefix = table.prefixes.contains(seq);
        match (exact, is_prefix) {
            (Some(candidates), true) => Lookup::ExactAndPrefix(candidates),
            (Some(candidates), false) => Lookup::Exact(candidates),
            (None, true) => Lookup::Prefix,
            (None, false) => Lookup::None,
        }
    }

    pub fn mode(&self, name: &str) -> Option<&Mode> {
        self.modes.get(name)
    }

    pub fn modes(&self) -> impl Iterator<Item = &Mode> {
        self.modes.values()
    }

    /// The mode the engine starts in.
    pub fn default_mode(&self) -> &str {
        &self.default_mode
    }

    /// Total number of bound (mode, sequence) cells.
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All bindings in a stable order (mode, then sequence), for inspection.
    pub fn iter_sorted(&self) -> Vec<(&str, Vec<Keystroke>, &[CompiledBinding])> {
        let mut out = Vec::new();
        for (mode, table) in &self.tables {
            let mut seqs: Vec<_> = table.entries.keys().collect();
            seqs.sort();
            for seq in seqs {
                out.push((
                    mode.as_str(),
                    seq.clone(),
                    table.entries[seq].as_slice(),
                ));
            }
        }
        out
    }

    /// Sequences bound in a mode, rendered canonically. For diagnostics.
    pub fn sequences_in_mode(&self, mode: &str) -> Vec<String> {
        let Some(table) = self.tables.get(mode) else {
            return Vec::new();
        };
        let mut seqs: Vec<_> = table.entries.keys().collect();
        seqs.sort();
        seqs.iter().map(|s| format_sequence(s)).collect()
    }
}
