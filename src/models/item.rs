use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workshop visibility of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
    Friends,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::Friends => "friends",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            "friends" => Ok(Self::Friends),
            other => Err(format!("unknown visibility '{other}'")),
        }
    }
}

/// Publish metadata kept in a mod's item cfg.
///
/// `published_id` is only ever filled from an existing file; it is written
/// by the uploader, never by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemParams {
    pub title: String,
    pub description: String,
    pub preview: String,
    pub content: String,
    pub language: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_id: Option<String>,
}

impl ItemParams {
    /// Defaults for a freshly created mod.
    pub fn for_mod(mod_name: &str, preview: &str, content: &str) -> Self {
        Self {
            title: mod_name.to_string(),
            description: format!("{mod_name} description"),
            preview: preview.to_string(),
            content: content.to_string(),
            language: "english".to_string(),
            visibility: Visibility::Private,
            tags: Vec::new(),
            published_id: None,
        }
    }
}

/// Split user-supplied tags on `;`, trimming and dropping empty segments.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags_drops_empty_segments() {
        assert_eq!(split_tags("a; b;;c"), vec!["a", "b", "c"]);
        assert!(split_tags(" ; ;").is_empty());
    }

    #[test]
    fn test_visibility_from_str() {
        assert_eq!("Public".parse::<Visibility>(), Ok(Visibility::Public));
        assert_eq!(" friends ".parse::<Visibility>(), Ok(Visibility::Friends));
        assert!("hidden".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_item_params_for_mod() {
        let params = ItemParams::for_mod("cool_mod", "item_preview.jpg", "bundleV2");
        assert_eq!(params.title, "cool_mod");
        assert_eq!(params.description, "cool_mod description");
        assert_eq!(params.visibility, Visibility::Private);
        assert!(params.published_id.is_none());
    }
}
