use crate::models::{GameVariant, ValueKind, default_rc_values};
use crate::paths;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use thiserror::Error;

/// Errors raised while loading or querying the rc file.
///
/// All of them are fatal: no task runs with a broken configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Config {path} is not valid JSON: {source}")]
    Parse {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },

    #[error("Config {0} must contain a JSON object")]
    NotAnObject(Utf8PathBuf),

    #[error("Config key '{key}' must be {expected}, found {found}")]
    IncompatibleType {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Config key '{0}' is not set")]
    MissingKey(String),

    #[error("Config key '{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("Invalid game variant '{0}', expected 1 or 2")]
    InvalidGameVariant(String),

    #[error("Invalid assignment '{0}', expected key=value")]
    InvalidAssignment(String),
}

/// Loads, merges and saves the `.vmbrc` file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    rc_path: Utf8PathBuf,
}

impl ConfigManager {
    pub fn new<P: AsRef<Utf8Path>>(rc_path: P) -> Self {
        Self {
            rc_path: rc_path.as_ref().to_path_buf(),
        }
    }

    pub fn rc_path(&self) -> &Utf8Path {
        &self.rc_path
    }

    /// Load the rc file, merging in defaults.
    ///
    /// A missing file is created with the defaults. Keys missing from an
    /// existing file are filled in and the file is written back. With `reset`
    /// the file is recreated from the defaults.
    pub fn load(&self, reset: bool) -> Result<Config, ConfigError> {
        if reset && self.rc_path.exists() {
            tracing::warn!("Resetting config {}", self.rc_path);
            fs::remove_file(&self.rc_path).map_err(|source| ConfigError::Write {
                path: self.rc_path.clone(),
                source,
            })?;
        }

        let base_dir = self.base_dir();

        if !self.rc_path.exists() {
            let config = Config::new(default_rc_values(), base_dir);
            self.save(&config)?;
            tracing::info!("Created default config at {}", self.rc_path);
            return Ok(config);
        }

        let text = fs::read_to_string(&self.rc_path).map_err(|source| ConfigError::Read {
            path: self.rc_path.clone(),
            source,
        })?;

        let mut values = self.parse(&text)?;
        let filled = merge_defaults(&mut values, &default_rc_values())?;

        let config = Config::new(values, base_dir);
        if filled > 0 {
            tracing::debug!("Filled {} missing config keys from defaults", filled);
            self.save(&config)?;
        }

        tracing::debug!("Loaded config from {}", self.rc_path);
        Ok(config)
    }

    /// Write the persisted values as pretty-printed JSON.
    ///
    /// Per-run overrides are never written.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.rc_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: self.rc_path.clone(),
                    source,
                })?;
            }
        }

        let mut json = serde_json::to_string_pretty(&config.values).map_err(|source| ConfigError::Parse {
            path: self.rc_path.clone(),
            source,
        })?;
        json.push('\n');

        fs::write(&self.rc_path, json).map_err(|source| ConfigError::Write {
            path: self.rc_path.clone(),
            source,
        })?;

        tracing::debug!("Saved config to {}", self.rc_path);
        Ok(())
    }

    fn parse(&self, text: &str) -> Result<IndexMap<String, Value>, ConfigError> {
        match serde_json::from_str::<IndexMap<String, Value>>(text) {
            Ok(values) => Ok(values),
            Err(source) => {
                // Valid JSON of the wrong shape gets a clearer message.
                if serde_json::from_str::<Value>(text).is_ok() {
                    Err(ConfigError::NotAnObject(self.rc_path.clone()))
                } else {
                    Err(ConfigError::Parse {
                        path: self.rc_path.clone(),
                        source,
                    })
                }
            }
        }
    }

    fn base_dir(&self) -> Utf8PathBuf {
        match self.rc_path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        }
    }
}

/// Fill missing or `null` keys from `defaults`, rejecting values whose shape
/// differs from the default's. Returns how many keys were filled.
pub fn merge_defaults(
    values: &mut IndexMap<String, Value>,
    defaults: &IndexMap<String, Value>,
) -> Result<usize, ConfigError> {
    let mut filled = 0;

    for (key, default) in defaults {
        match values.get(key) {
            None | Some(Value::Null) => {
                values.insert(key.clone(), default.clone());
                filled += 1;
            }
            Some(existing) => check_kind(key, default, existing)?,
        }
    }

    Ok(filled)
}

/// Reject a value for a known key whose shape differs from the default's.
/// Unknown keys and `null` are accepted.
pub fn check_value(key: &str, value: &Value) -> Result<(), ConfigError> {
    match default_rc_values().get(key) {
        Some(default) if !value.is_null() => check_kind(key, default, value),
        _ => Ok(()),
    }
}

fn check_kind(key: &str, default: &Value, value: &Value) -> Result<(), ConfigError> {
    let expected = ValueKind::of(default);
    let found = ValueKind::of(value);
    if expected != found {
        return Err(ConfigError::IncompatibleType {
            key: key.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Parse a `key=value` assignment from the command line.
///
/// The value is read as JSON when possible (`true`, `2`, `["a"]`) and kept
/// as a plain string otherwise.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidAssignment(raw.to_string()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidAssignment(raw.to_string()));
    }

    let value = serde_json::from_str(value.trim()).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// The effective configuration for one invocation.
///
/// Built once at startup and passed by reference to every component.
/// Per-run overrides shadow persisted values but are never saved.
#[derive(Debug, Clone)]
pub struct Config {
    values: IndexMap<String, Value>,
    overrides: IndexMap<String, Value>,
    base_dir: Utf8PathBuf,
}

impl Config {
    pub fn new(values: IndexMap<String, Value>, base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            values,
            overrides: IndexMap::new(),
            base_dir: base_dir.into(),
        }
    }

    /// Defaults rooted at `base_dir`, without touching the filesystem.
    pub fn with_defaults(base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self::new(default_rc_values(), base_dir)
    }

    /// Directory relative config paths resolve against.
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }

    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        match self.overrides.get(key).or_else(|| self.values.get(key)) {
            None | Some(Value::Null) => Err(ConfigError::MissingKey(key.to_string())),
            Some(value) => Ok(value),
        }
    }

    /// Set a value that will be written by [`ConfigManager::save`].
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.overrides.shift_remove(&key);
        self.values.insert(key, value);
    }

    /// Set a value for this run only.
    pub fn set_override(&mut self, key: impl Into<String>, value: Value) {
        self.overrides.insert(key.into(), value);
    }

    /// Persisted values merged with the per-run overrides.
    pub fn effective_values(&self) -> IndexMap<String, Value> {
        let mut merged = self.values.clone();
        for (key, value) in &self.overrides {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn variant(&self) -> Result<GameVariant, ConfigError> {
        let raw = self.get("game")?;
        GameVariant::from_value(raw).ok_or_else(|| ConfigError::InvalidGameVariant(value_to_string(raw)))
    }

    /// Look up `<base><N>` for the active game variant.
    pub fn variant_value(&self, base: &str) -> Result<&Value, ConfigError> {
        let key = self.variant()?.key(base);
        self.get(&key)
    }

    pub fn mods_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self.get_str("mods_dir")?;
        Ok(paths::resolve(&self.base_dir, raw))
    }

    /// Build scratch root. An empty value means `<mods_dir>/.temp`.
    pub fn temp_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self.get_str("temp_dir")?;
        if raw.trim().is_empty() {
            Ok(self.mods_dir()?.join(".temp"))
        } else {
            Ok(paths::resolve(&self.base_dir, raw))
        }
    }

    pub fn game_id(&self) -> Result<String, ConfigError> {
        self.variant_string("game_id")
    }

    pub fn tools_id(&self) -> Result<String, ConfigError> {
        self.variant_string("tools_id")
    }

    pub fn fallback_tools_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self.variant_string("fallback_tools_dir")?;
        Ok(paths::resolve(&self.base_dir, raw))
    }

    pub fn fallback_steamapps_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self.variant_string("fallback_steamapps_dir")?;
        Ok(paths::resolve(&self.base_dir, raw))
    }

    pub fn bundle_extension(&self) -> Result<String, ConfigError> {
        self.variant_string("bundle_extension")
    }

    pub fn use_new_format(&self) -> Result<bool, ConfigError> {
        let key = self.variant()?.key("use_new_format");
        self.get_bool(&key)
    }

    pub fn uploader_args(&self) -> Result<Vec<String>, ConfigError> {
        let key = self.variant()?.key("uploader_args");
        self.get_str_list(&key)
    }

    pub fn use_fallback(&self) -> Result<bool, ConfigError> {
        self.get_bool("use_fallback")
    }

    pub fn ignore_build_errors(&self) -> Result<bool, ConfigError> {
        self.get_bool("ignore_build_errors")
    }

    pub fn ignored_dirs(&self) -> Result<Vec<String>, ConfigError> {
        self.get_str_list("ignored_dirs")
    }

    /// Template folder, relative to the mods directory unless absolute.
    pub fn template_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self.get_str("template_dir")?;
        Ok(paths::resolve(&self.mods_dir()?, raw))
    }

    pub fn template_preview_image(&self) -> Result<String, ConfigError> {
        Ok(self.get_str("template_preview_image")?.to_string())
    }

    pub fn template_core_files(&self) -> Result<Vec<String>, ConfigError> {
        self.get_str_list("template_core_files")
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)?.as_str().ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "a string",
        })
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(ConfigError::WrongType {
                key: key.to_string(),
                expected: "a boolean",
            }),
        }
    }

    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let wrong_type = || ConfigError::WrongType {
            key: key.to_string(),
            expected: "an array of strings",
        };

        self.get(key)?
            .as_array()
            .ok_or_else(wrong_type)?
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(wrong_type))
            .collect()
    }

    fn variant_string(&self, base: &str) -> Result<String, ConfigError> {
        let key = self.variant()?.key(base);
        match self.get(&key)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(ConfigError::WrongType {
                key,
                expected: "a string",
            }),
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
