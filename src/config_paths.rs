//! Centralized configuration paths for keyloom
//!
//! All config files live under:
//! - Unix/macOS: `~/.config/keyloom/`
//! - Windows: `%APPDATA%\keyloom\`
//!
//! This module is the single source of truth for config paths.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "keyloom";

/// Base config directory for keyloom
///
/// Unix/macOS:
///   - If XDG_CONFIG_HOME is set: `$XDG_CONFIG_HOME/keyloom`
///   - Else: `~/.config/keyloom`
///
/// Windows:
///   - `%APPDATA%\keyloom`
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_DIR))
    }

    #[cfg(not(target_os = "windows"))]
    {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .map(|config| config.join(APP_DIR))
    }
}

/// `~/.config/keyloom/config.yaml`
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.yaml"))
}

/// `~/.config/keyloom/active.json` — which preset is activated
pub fn activation_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("active.json"))
}

/// `~/.config/keyloom/presets/`
pub fn presets_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("presets"))
}

/// `~/.config/keyloom/logs/`
pub fn logs_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("logs"))
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))
}

/// Ensure the base config dir exists, returning it
pub fn ensure_config_dir() -> Result<PathBuf, String> {
    let dir = config_dir().ok_or_else(|| "No config directory available".to_string())?;
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Ensure presets dir exists, returning it
pub fn ensure_presets_dir() -> Result<PathBuf, String> {
    let config = ensure_config_dir()?;
    let presets = config.join("presets");
    ensure_dir(&presets)?;
    Ok(presets)
}

/// Ensure logs dir exists, returning it
pub fn ensure_logs_dir() -> Result<PathBuf, String> {
    let config = ensure_config_dir()?;
    let logs = config.join("logs");
    ensure_dir(&logs)?;
    Ok(logs)
}
