//! Reading and writing the per-mod item cfg.
//!
//! The file is a list of `key = value;` statements understood by the
//! Workshop uploader:
//!
//! ```text
//! title = "My Mod";
//! description = "Does things";
//! preview = "item_preview.jpg";
//! content = "bundleV2";
//! language = "english";
//! visibility = "private";
//! tags = ["Gameplay", "QoL"];
//! published_id = 1234567890L;
//! ```
//!
//! `published_id` is appended by the uploader after the first publish.

use crate::models::{ItemParams, Visibility};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fmt::Write as _;
use std::fs;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static PUBLISHED_ID_LINE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*published_id[ \t]*=.*$\n?").expect("Invalid published_id line regex"));

static TAGS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*tags\s*=\s*\[(.*?)\]\s*;").expect("Invalid tags regex"));

static QUOTED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("Invalid quoted string regex"));

#[derive(Error, Debug)]
pub enum ItemCfgError {
    #[error("Item cfg not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Unsupported value type '{0}', expected 'number' or 'string'")]
    UnsupportedValueType(String),

    #[error("Failed to read item cfg {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write item cfg {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
}

/// How a value is stored in the cfg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Unsigned integer without quotes, optionally suffixed with `L`
    Number,
    /// Double-quoted string
    String,
}

impl FromStr for ValueType {
    type Err = ItemCfgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            other => Err(ItemCfgError::UnsupportedValueType(other.to_string())),
        }
    }
}

/// Serialize item parameters into cfg text.
pub fn render(params: &ItemParams) -> String {
    let mut out = String::new();
    let fields = [
        ("title", params.title.as_str()),
        ("description", params.description.as_str()),
        ("preview", params.preview.as_str()),
        ("content", params.content.as_str()),
        ("language", params.language.as_str()),
        ("visibility", params.visibility.as_str()),
    ];

    for (key, value) in fields {
        let _ = writeln!(out, "{key} = \"{}\";", escape(value));
    }

    let tags: Vec<String> = params.tags.iter().map(|tag| format!("\"{}\"", escape(tag))).collect();
    let _ = writeln!(out, "tags = [{}];", tags.join(", "));
    out
}

/// Write a fresh cfg for a mod. Any existing file is replaced.
pub fn write(path: &Utf8Path, params: &ItemParams) -> Result<(), ItemCfgError> {
    let to_write_error = |source| ItemCfgError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_write_error)?;
    }
    fs::write(path, render(params)).map_err(to_write_error)?;

    tracing::debug!("Wrote item cfg {}", path);
    Ok(())
}

/// Read the raw cfg text.
pub fn read(path: &Utf8Path) -> Result<String, ItemCfgError> {
    if !path.is_file() {
        return Err(ItemCfgError::NotFound(path.to_path_buf()));
    }

    fs::read_to_string(path).map_err(|source| ItemCfgError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract a single value from cfg text.
///
/// Returns `None` when the key is absent, which is how an unpublished mod is
/// detected (`published_id` missing).
pub fn get_value(text: &str, key: &str, value_type: ValueType) -> Option<String> {
    let key = regex::escape(key);
    let pattern = match value_type {
        ValueType::Number => format!(r"(?m)^\s*{key}\s*=\s*(\d+)L?\s*;"),
        ValueType::String => format!(r#"(?m)^\s*{key}\s*=\s*"((?:[^"\\]|\\.)*)"\s*;"#),
    };

    let re = Regex::new(&pattern).ok()?;
    let raw = re.captures(text)?.get(1)?.as_str();

    match value_type {
        ValueType::Number => Some(raw.to_string()),
        ValueType::String => Some(unescape(raw)),
    }
}

/// Published Workshop id, if the mod has been published.
pub fn published_id(text: &str) -> Option<String> {
    get_value(text, "published_id", ValueType::Number)
}

/// Store the id reported by the uploader, unless the cfg already has it.
///
/// The uploader normally writes the id itself; this covers builds of the
/// tool that only print it.
pub fn record_published_id(path: &Utf8Path, id: &str) -> Result<(), ItemCfgError> {
    let text = read(path)?;
    if published_id(&text).as_deref() == Some(id) {
        return Ok(());
    }

    let mut updated = PUBLISHED_ID_LINE_PATTERN.replace_all(&text, "").into_owned();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    let _ = writeln!(updated, "published_id = {id}L;");

    fs::write(path, updated).map_err(|source| ItemCfgError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Recorded published_id {} in {}", id, path);
    Ok(())
}

/// Parse every known field. Missing string fields come back empty.
pub fn parse(text: &str) -> ItemParams {
    let string = |key: &str| get_value(text, key, ValueType::String).unwrap_or_default();

    ItemParams {
        title: string("title"),
        description: string("description"),
        preview: string("preview"),
        content: string("content"),
        language: string("language"),
        visibility: string("visibility").parse().unwrap_or(Visibility::Private),
        tags: parse_tags(text),
        published_id: published_id(text),
    }
}

fn parse_tags(text: &str) -> Vec<String> {
    let Some(list) = TAGS_PATTERN.captures(text).and_then(|caps| caps.get(1)) else {
        return Vec::new();
    };

    QUOTED_PATTERN
        .captures_iter(list.as_str())
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()))
        .collect()
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::split_tags;
    use tempfile::TempDir;

    fn sample_params() -> ItemParams {
        ItemParams {
            title: "Test Mod".to_string(),
            description: "A \"quoted\" description".to_string(),
            preview: "item_preview.jpg".to_string(),
            content: "bundleV2".to_string(),
            language: "english".to_string(),
            visibility: Visibility::Public,
            tags: split_tags("a; b;;c"),
            published_id: None,
        }
    }

    #[test]
    fn test_render_format() {
        let text = render(&sample_params());
        assert!(text.contains("title = \"Test Mod\";"));
        assert!(text.contains("visibility = \"public\";"));
        assert!(text.contains("tags = [\"a\", \"b\", \"c\"];"));
        assert!(!text.contains("published_id"));
    }

    #[test]
    fn test_get_value_number() {
        let text = "title = \"x\";\npublished_id = 123456;\n";
        assert_eq!(get_value(text, "published_id", ValueType::Number), Some("123456".to_string()));

        let with_suffix = "published_id = 987L;\n";
        assert_eq!(published_id(with_suffix), Some("987".to_string()));

        assert_eq!(published_id("title = \"x\";\n"), None);
    }

    #[test]
    fn test_get_value_string_unescapes() {
        let text = render(&sample_params());
        assert_eq!(
            get_value(&text, "description", ValueType::String),
            Some("A \"quoted\" description".to_string())
        );
        assert_eq!(get_value(&text, "missing", ValueType::String), None);
    }

    #[test]
    fn test_number_key_does_not_match_string_value() {
        let text = "published_id = \"123\";\n";
        assert_eq!(published_id(text), None);
    }

    #[test]
    fn test_unsupported_value_type() {
        assert!(matches!(
            "boolean".parse::<ValueType>(),
            Err(ItemCfgError::UnsupportedValueType(t)) if t == "boolean"
        ));
        assert_eq!("number".parse::<ValueType>().unwrap(), ValueType::Number);
    }

    #[test]
    fn test_write_read_parse_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("item_v2.cfg")).unwrap();

        write(&path, &sample_params()).unwrap();
        let text = read(&path).unwrap();
        let parsed = parse(&text);

        assert_eq!(parsed, sample_params());
    }

    #[test]
    fn test_record_published_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("item_v2.cfg")).unwrap();
        write(&path, &sample_params()).unwrap();

        record_published_id(&path, "42").unwrap();
        let text = read(&path).unwrap();
        assert_eq!(published_id(&text), Some("42".to_string()));
        assert!(text.ends_with("published_id = 42L;\n"));

        // Replaced rather than duplicated
        record_published_id(&path, "43").unwrap();
        let text = read(&path).unwrap();
        assert_eq!(text.matches("published_id").count(), 1);
        assert_eq!(parse(&text).title, "Test Mod");
    }

    #[test]
    fn test_parse_tags_and_indented_published_id() {
        let text = "title = \"T\";\n  tags = [ \"a\", \"b \\\"c\\\"\" ];\n\tpublished_id = 9L;\n";
        assert_eq!(parse(text).tags, vec!["a", "b \"c\""]);
        assert_eq!(parse("tags = [];\n").tags, Vec::<String>::new());

        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("item_v2.cfg")).unwrap();
        fs::write(&path, text).unwrap();

        record_published_id(&path, "10").unwrap();
        let updated = read(&path).unwrap();
        assert_eq!(updated.matches("published_id").count(), 1);
        assert_eq!(published_id(&updated), Some("10".to_string()));
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("nope.cfg")).unwrap();
        assert!(matches!(read(&path), Err(ItemCfgError::NotFound(_))));
    }
}
