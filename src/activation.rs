//! Persisted preset activation record
//!
//! Records which preset is currently active. Read once at startup, written
//! only when a preset is activated or deactivated — the engine itself never
//! touches it.

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// The activation record stored at `~/.config/keyloom/active.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// Schema version for forward compatibility
    #[serde(default)]
    pub version: u32,
    /// Name of the active preset
    pub preset: String,
    /// Source file, if the preset was activated from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// When the preset was activated (Unix epoch seconds)
    #[serde(default)]
    pub activated_at: u64,
}

impl ActivationRecord {
    pub fn new(preset: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            version: 1,
            preset: preset.into(),
            path,
            activated_at: now_epoch_secs(),
        }
    }

    /// Load the current activation record, if any.
    pub fn load() -> Option<Self> {
        let path = crate::config_paths::activation_file()?;
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(record) => {
                    tracing::debug!("Loaded activation record from {}", path.display());
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!("Ignoring corrupt activation record: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist this record as the active preset.
    pub fn save(&self) -> Result<(), String> {
        let path = crate::config_paths::activation_file()
            .ok_or_else(|| "No config directory available".to_string())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize activation record: {}", e))?;
        std::fs::write(&path, content)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        tracing::info!("Activated preset {:?}", self.preset);
        Ok(())
    }

    /// Remove the activation record, returning whether one existed.
    pub fn clear() -> Result<bool, String> {
        let Some(path) = crate::config_paths::activation_file() else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .map_err(|e| format!("Failed to remove {}: {}", path.display(), e))?;
        tracing::info!("Deactivated preset");
        Ok(true)
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = ActivationRecord::new("vim-basics", Some(PathBuf::from("/tmp/vim.json")));
        let json = serde_json::to_string(&record).unwrap();
        let back: ActivationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_path_omitted_when_none() {
        let record = ActivationRecord::new("default", None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("path"));
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let record: ActivationRecord = serde_json::from_str(
            r#"{"version": 2, "preset": "x", "activated_at": 0, "future": true}"#,
        )
        .unwrap();
        assert_eq!(record.preset, "x");
    }
}
