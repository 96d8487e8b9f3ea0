//! # Config Files
//!
//! Load and save the form's field texts as a flat JSON object:
//!
//! ```json
//! {
//!   "crystal_size": "250 nm",
//!   "xray_energy": "10.00 keV"
//! }
//! ```
//!
//! - **Default extension**: `.json` is appended when the path has none
//! - **Atomic saves**: write to `.json.tmp`, sync, rename over the target
//! - **Missing files**: load as an empty mapping
//! - **Unknown keys**: skipped with a warning, so configs from newer versions
//!   still load
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use cdicalc_core::config_file::{load_config, save_config};
//! use cdicalc_core::fields::FieldId;
//!
//! let mut texts = BTreeMap::new();
//! texts.insert(FieldId::CrystalSize, "250 nm".to_string());
//! let written = save_config(Path::new("beamtime/id01"), &texts)?;
//! assert!(written.ends_with("id01.json"));
//!
//! let loaded = load_config(&written)?;
//! assert_eq!(loaded, texts);
//! # Ok::<(), cdicalc_core::errors::CalcError>(())
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{CalcError, CalcResult};
use crate::fields::FieldId;

/// Extension given to config files saved without one
pub const CONFIG_EXTENSION: &str = "json";

/// `path` with the default extension appended unless it already ends with it.
///
/// Dotted names keep their dots: `beamtime.2024` becomes `beamtime.2024.json`.
pub fn config_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == CONFIG_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(CONFIG_EXTENSION);
    PathBuf::from(name)
}

/// Save field texts with atomic write semantics.
///
/// 1. Serialize the mapping to JSON, keyed by field name
/// 2. Create missing parent directories
/// 3. Write to a temporary file and sync it to disk
/// 4. Rename the temporary file over the target
///
/// Returns the path actually written.
pub fn save_config(path: &Path, texts: &BTreeMap<FieldId, String>) -> CalcResult<PathBuf> {
    let path = config_path(path);

    let by_name: BTreeMap<&str, &str> = texts.iter().map(|(f, t)| (f.name(), t.as_str())).collect();
    let json = serde_json::to_string_pretty(&by_name).map_err(|e| CalcError::SerializationError {
        reason: e.to_string(),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CalcError::file_error("create directory", parent.display().to_string(), e.to_string())
        })?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", extension_of(&path)));

    let mut tmp_file = File::create(&tmp_path).map_err(|e| {
        CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    tmp_file.write_all(json.as_bytes()).map_err(|e| {
        CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    tmp_file.sync_all().map_err(|e| {
        CalcError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    fs::rename(&tmp_path, &path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CalcError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    info!(path = %path.display(), fields = texts.len(), "config saved");
    Ok(path)
}

/// Load field texts from a config file.
///
/// # Returns
///
/// * `Ok(mapping)` - known fields and their texts; empty if the file does not exist
/// * `Err(CalcError::SerializationError)` - not a JSON object
/// * `Err(CalcError::FileError)` - I/O error
pub fn load_config(path: &Path) -> CalcResult<BTreeMap<FieldId, String>> {
    let path = config_path(path);
    if !path.exists() {
        info!(path = %path.display(), "no config file, starting empty");
        return Ok(BTreeMap::new());
    }

    let contents = fs::read_to_string(&path)
        .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))?;

    let value: Value = serde_json::from_str(&contents).map_err(|e| CalcError::SerializationError {
        reason: format!("Invalid JSON in {}: {}", path.display(), e),
    })?;

    let Value::Object(entries) = value else {
        return Err(CalcError::SerializationError {
            reason: format!("{} must contain a JSON object of field texts", path.display()),
        });
    };

    let mut texts = BTreeMap::new();
    for (key, value) in entries {
        let Ok(field) = key.parse::<FieldId>() else {
            warn!(key = %key, path = %path.display(), "ignoring unknown field in config");
            continue;
        };
        let text = match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                warn!(field = %field, "ignoring non-scalar config value");
                continue;
            }
        };
        texts.insert(field, text);
    }

    info!(path = %path.display(), fields = texts.len(), "config loaded");
    Ok(texts)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_EXTENSION.to_string())
}
