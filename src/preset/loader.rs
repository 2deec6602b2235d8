//! Loading preset documents from disk: format detection and decoding.

use std::fmt;
use std::path::{Path, PathBuf};

use super::document::PresetDoc;
use super::parser::{normalize, ParseError, Preset};

/// Supported preset document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
    Yaml,
}

impl Format {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Failure to load a preset from disk.
#[derive(Debug, Clone)]
pub enum LoadError {
    Io { path: PathBuf, message: String },
    UnknownFormat { path: PathBuf },
    /// The document text did not decode at all
    Decode(ParseError),
    /// The document decoded but failed validation
    Invalid(Vec<ParseError>),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, message } => {
                write!(f, "failed to read {}: {}", path.display(), message)
            }
            LoadError::UnknownFormat { path } => write!(
                f,
                "unrecognized preset format for {} (expected .json, .toml or .yaml)",
                path.display()
            ),
            LoadError::Decode(e) => write!(f, "{}", e),
            LoadError::Invalid(errors) => {
                write!(f, "{} validation error(s)", errors.len())?;
                for e in errors {
                    write!(f, "\n  {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Decode preset text in the given format into the raw document model.
pub fn decode(text: &str, format: Format) -> Result<PresetDoc, ParseError> {
    match format {
        Format::Json => serde_json::from_str(text)
            .map_err(|e| ParseError::new("", format!("invalid JSON: {}", e))),
        Format::Toml => {
            toml::from_str(text).map_err(|e| ParseError::new("", format!("invalid TOML: {}", e)))
        }
        Format::Yaml => serde_yaml::from_str(text)
            .map_err(|e| ParseError::new("", format!("invalid YAML: {}", e))),
    }
}

/// Decode and normalize preset text in one step.
pub fn parse_preset(
    text: &str,
    format: Format,
    fallback_name: &str,
    default_priority: i32,
) -> Result<Preset, LoadError> {
    let doc = decode(text, format).map_err(LoadError::Decode)?;
    normalize(&doc, fallback_name, default_priority).map_err(LoadError::Invalid)
}

/// Load a preset file, detecting the format from its extension.
pub fn load_preset_file(path: &Path, default_priority: i32) -> Result<Preset, LoadError> {
    let format = Format::from_path(path).ok_or_else(|| LoadError::UnknownFormat {
        path: path.to_path_buf(),
    })?;
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let fallback_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("preset");

    let preset = parse_preset(&text, format, fallback_name, default_priority)?;
    tracing::info!(
        "Loaded preset {:?} from {} ({} items, {} modes)",
        preset.name,
        path.display(),
        preset.items.len(),
        preset.modes.len()
    );
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path(Path::new("a.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("a.toml")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("a.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("a.txt")), None);
        assert_eq!(Format::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_parse_preset_json() {
        let preset = parse_preset(
            r#"{"bindings": [{"key": "ctrl+s", "command": "file.save"}]}"#,
            Format::Json,
            "fallback",
            0,
        )
        .unwrap();
        assert_eq!(preset.name, "fallback");
        assert_eq!(preset.items.len(), 1);
    }

    #[test]
    fn test_parse_preset_toml_equivalent() {
        let toml_preset = parse_preset(
            "[[bindings]]\nkey = \"ctrl+s\"\ncommand = \"file.save\"\n",
            Format::Toml,
            "t",
            0,
        )
        .unwrap();
        let json_preset = parse_preset(
            r#"{"bindings": [{"key": "ctrl+s", "command": "file.save"}]}"#,
            Format::Json,
            "t",
            0,
        )
        .unwrap();
        assert_eq!(toml_preset.items, json_preset.items);
    }

    #[test]
    fn test_decode_error_is_single_parse_error() {
        let e = parse_preset("{not json", Format::Json, "t", 0).unwrap_err();
        assert!(matches!(e, LoadError::Decode(_)));
    }

    #[test]
    fn test_validation_errors_surface() {
        let e = parse_preset(
            r#"{"bindings": [{"key": "nope+key", "command": "x"}]}"#,
            Format::Json,
            "t",
            0,
        )
        .unwrap_err();
        match e {
            LoadError::Invalid(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }
}
