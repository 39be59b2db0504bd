//! File plumbing for scenario loading: format detection (RON/JSON/TOML),
//! file discovery, deserialization and name lookup.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use valueflow_core::error::ConfigError;

// ===========================================================================
// Errors
// ===========================================================================

/// Why a scenario could not be loaded. Every variant names the file at fault.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("scenario directory {dir} has no '{file}' file")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("{file}: expected a .ron, .toml or .json extension")]
    UnsupportedFormat { file: PathBuf },

    #[error("{a} and {b} describe the same scenario part")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("cannot parse {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("{file} refers to unknown {expected_kind} '{name}'")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("{file} defines '{name}' more than once")]
    DuplicateName { file: PathBuf, name: String },

    /// The data parsed but describes an invalid simulation.
    #[error("invalid definition in {file}: {source}")]
    Config {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DataLoadError {
    pub(crate) fn config(file: &Path) -> impl FnOnce(ConfigError) -> Self + '_ {
        move |source| DataLoadError::Config {
            file: file.to_path_buf(),
            source,
        }
    }
}

// ===========================================================================
// Formats and discovery
// ===========================================================================

/// Scenario file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Every format with its extension, in lookup order.
    pub const ALL: [(Format, &'static str); 3] =
        [(Format::Ron, "ron"), (Format::Toml, "toml"), (Format::Json, "json")];
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|(_, known)| Some(*known) == ext)
        .map(|(format, _)| format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// The single `{base_name}.{ron,toml,json}` in `dir`, if any.
///
/// Two formats of the same part are ambiguous and rejected.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .into_iter()
        .map(|(_, ext)| dir.join(format!("{base_name}.{ext}")))
        .filter(|candidate| candidate.exists());
    let first = present.next();
    match (first, present.next()) {
        (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
        (first, _) => Ok(first),
    }
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path) -> impl FnOnce(String) -> DataLoadError + '_ {
    move |detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path)(e.to_string())),
        Format::Json => {
            serde_json::from_str(&content).map_err(|e| parse_error(path)(e.to_string()))
        }
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path)(e.to_string())),
    }
}

/// Deserialize a list. RON and JSON files hold a bare array; TOML has no
/// top-level arrays, so the list lives under `toml_key` (`[[chains]]`, ...).
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }

    let content = std::fs::read_to_string(path)?;
    let mut table: toml::Table =
        toml::from_str(&content).map_err(|e| parse_error(path)(e.to_string()))?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path)(format!("missing key '{toml_key}' in TOML file")))?;
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path)(e.to_string()))
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Fail with `DuplicateName` if `name` is already taken.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Reject NaN and infinities before they reach fixed-point conversion.
pub fn require_finite(value: f64, what: &str, file: &Path) -> Result<f64, DataLoadError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(parse_error(file)(format!("{what} must be finite, got {value}")))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
