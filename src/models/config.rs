use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Name of the rc file created in the working directory on first run.
pub const DEFAULT_RC_FILE: &str = ".vmbrc";

/// Which of the two supported games a run targets.
///
/// Every per-variant key in the rc file is the base key name with the
/// variant number appended (`game_id1`, `game_id2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameVariant {
    One,
    Two,
}

impl GameVariant {
    /// Parse a variant from the raw rc/command-line value.
    ///
    /// Accepts the numbers `1` and `2`, as JSON numbers or strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(1) => Some(Self::One),
                Some(2) => Some(Self::Two),
                _ => None,
            },
            Value::String(s) => match s.trim() {
                "1" => Some(Self::One),
                "2" => Some(Self::Two),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Key name for a per-variant setting, e.g. `game_id` -> `game_id2`.
    pub fn key(self, base: &str) -> String {
        format!("{}{}", base, self.number())
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Default contents of the rc file.
///
/// Keys are kept in a stable order so the pretty-printed file reads the same
/// on every machine.
pub fn default_rc_values() -> IndexMap<String, Value> {
    let defaults = [
        ("mods_dir", json!("mods")),
        ("temp_dir", json!("")),
        ("game", json!(2)),
        ("game_id1", json!("235540")),
        ("game_id2", json!("552500")),
        ("tools_id1", json!("718610")),
        ("tools_id2", json!("718610")),
        (
            "fallback_tools_dir1",
            json!("C:/Program Files (x86)/Steam/steamapps/common/Warhammer End Times Vermintide Mod Tools/"),
        ),
        (
            "fallback_tools_dir2",
            json!("C:/Program Files (x86)/Steam/steamapps/common/Vermintide 2 SDK/"),
        ),
        ("fallback_steamapps_dir1", json!("C:/Program Files (x86)/Steam/steamapps/")),
        ("fallback_steamapps_dir2", json!("C:/Program Files (x86)/Steam/steamapps/")),
        ("bundle_extension1", json!("")),
        ("bundle_extension2", json!(".mod_bundle")),
        ("use_new_format1", json!(false)),
        ("use_new_format2", json!(true)),
        ("uploader_args1", json!([])),
        ("uploader_args2", json!([])),
        ("use_fallback", json!(false)),
        ("ignore_build_errors", json!(false)),
        ("ignored_dirs", json!([".git", ".temp", "node_modules"])),
        ("template_dir", json!(".template-vmf")),
        ("template_preview_image", json!("item_preview.jpg")),
        ("template_core_files", json!(["core/**"])),
    ];

    defaults
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Coarse JSON shape used to decide whether a stored value can replace a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Array,
    Object,
    Null,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
            _ => Self::Scalar,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
            Self::Null => write!(f, "null"),
        }
    }
}
