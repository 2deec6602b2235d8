//! Default preset and layered preset loading.
//!
//! Three layers, later layers taking precedence during compilation:
//! 1. The embedded default preset (compiled into the binary)
//! 2. `keyloom.{json,toml,yaml}` in the current directory (project-local)
//! 3. The user preset under the config directory
//!
//! Layer precedence is expressed through preset priorities; the compiler's
//! override rule does the actual merging.

use std::path::{Path, PathBuf};

use crate::config_paths;
use crate::keymap::types::{KeyCode, Keystroke, Modifiers};
use crate::keymap::{ArgTemplate, BindingItem, SourceTag};

use super::loader::{load_preset_file, parse_preset, Format};
use super::parser::{Mode, OverlapPolicy, Preset};

/// Default preset embedded at compile time
const DEFAULT_PRESET_JSON: &str = include_str!("../../keyloom.json");

/// Merge-layer priorities
pub const PRIORITY_EMBEDDED: i32 = 0;
pub const PRIORITY_PROJECT: i32 = 10;
pub const PRIORITY_USER: i32 = 20;

/// Candidate file names for project-local and user presets
const PRESET_FILE_NAMES: &[&str] = &["keyloom.json", "keyloom.toml", "keyloom.yaml", "keyloom.yml"];

/// The embedded default preset.
///
/// Falls back to a minimal hardcoded preset if the embedded document fails to
/// parse, so the engine always has something to run.
pub fn embedded_preset() -> Preset {
    match parse_preset(DEFAULT_PRESET_JSON, Format::Json, "default", PRIORITY_EMBEDDED) {
        Ok(preset) => {
            tracing::info!(
                "Loaded embedded default preset ({} items)",
                preset.items.len()
            );
            preset
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse embedded preset: {}, using hardcoded fallback",
                e
            );
            fallback_preset()
        }
    }
}

/// Load all preset layers: embedded defaults, project-local, user config.
pub fn load_preset_layers() -> Vec<Preset> {
    let mut presets = vec![embedded_preset()];

    if let Some(path) = find_preset_file(Path::new(".")) {
        match load_preset_file(&path, PRIORITY_PROJECT) {
            Ok(preset) => {
                tracing::info!("Merging project preset from {}", path.display());
                presets.push(preset);
            }
            Err(e) => tracing::warn!("Failed to load project preset {}: {}", path.display(), e),
        }
    }

    if let Some(dir) = config_paths::config_dir() {
        if let Some(path) = find_preset_file(&dir) {
            match load_preset_file(&path, PRIORITY_USER) {
                Ok(preset) => {
                    tracing::info!("Merging user preset from {}", path.display());
                    presets.push(preset);
                }
                Err(e) => tracing::warn!("Failed to load user preset {}: {}", path.display(), e),
            }
        }
    }

    presets
}

/// First existing preset file in `dir`, in format preference order.
pub fn find_preset_file(dir: &Path) -> Option<PathBuf> {
    PRESET_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Minimal hardcoded preset used only when the embedded document is broken.
fn fallback_preset() -> Preset {
    let entries: Vec<(Keystroke, &str)> = vec![
        (Keystroke::char_with_mods('s', Modifiers::CTRL), "file.save"),
        (Keystroke::char_with_mods('z', Modifiers::CTRL), "edit.undo"),
        (
            Keystroke::char_with_mods('z', Modifiers::CTRL | Modifiers::SHIFT),
            "edit.redo",
        ),
        (
            Keystroke::new(KeyCode::Escape, Modifiers::NONE),
            "state.cancel",
        ),
    ];

    let items = entries
        .into_iter()
        .enumerate()
        .map(|(index, (key, command))| BindingItem {
            keys: vec![key],
            command: Some(command.to_string()),
            args: ArgTemplate::Null,
            when: None,
            modes: Vec::new(),
            prefix_scope: None,
            defines_prefix: None,
            name: None,
            description: None,
            source: SourceTag {
                preset: "fallback".to_string(),
                priority: PRIORITY_EMBEDDED,
                index,
                path: format!("bindings[{}]", index),
            },
        })
        .collect();

    Preset {
        name: "fallback".to_string(),
        priority: PRIORITY_EMBEDDED,
        overlap: OverlapPolicy::Timeout,
        modes: vec![Mode::named("normal")],
        items,
    }
}
