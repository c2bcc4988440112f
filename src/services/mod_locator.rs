//! Mod directory resolution and validation.

use crate::config::{Config, ConfigError};
use crate::models::GameVariant;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

static MOD_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-zA-Z_\- %]+$").expect("Invalid mod name regex"));

/// Whether `name` may be used as a mod folder name.
pub fn valid_mod_name(name: &str) -> bool {
    MOD_NAME_PATTERN.is_match(name)
}

/// Outcome of validating one requested mod name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModCheck {
    pub name: String,
    pub dir: Utf8PathBuf,
    pub cfg_exists: bool,
    pub error: Option<String>,
}

impl ModCheck {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Resolves where a mod and its build artifacts live.
///
/// All paths are pure compositions of the configured roots, the mod name and
/// the active game variant.
#[derive(Debug, Clone)]
pub struct ModLocator {
    mods_dir: Utf8PathBuf,
    temp_root: Utf8PathBuf,
    variant: GameVariant,
    ignored_dirs: Vec<String>,
    cfg_override: Option<Utf8PathBuf>,
}

impl ModLocator {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            mods_dir: config.mods_dir()?,
            temp_root: config.temp_dir()?,
            variant: config.variant()?,
            ignored_dirs: config.ignored_dirs()?,
            cfg_override: None,
        })
    }

    pub fn new(mods_dir: impl Into<Utf8PathBuf>, temp_root: impl Into<Utf8PathBuf>, variant: GameVariant) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            temp_root: temp_root.into(),
            variant,
            ignored_dirs: Vec::new(),
            cfg_override: None,
        }
    }

    /// Redirect the item cfg to an arbitrary file.
    pub fn with_cfg_override(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.cfg_override = path;
        self
    }

    pub fn with_ignored_dirs(mut self, ignored: Vec<String>) -> Self {
        self.ignored_dirs = ignored;
        self
    }

    pub fn mods_dir(&self) -> &Utf8Path {
        &self.mods_dir
    }

    pub fn variant(&self) -> GameVariant {
        self.variant
    }

    pub fn mod_dir(&self, name: &str) -> Utf8PathBuf {
        self.mods_dir.join(name)
    }

    /// Scratch directory, namespaced per variant so both games can be built
    /// from the same folder.
    pub fn temp_dir(&self, name: &str) -> Utf8PathBuf {
        self.temp_root.join(format!("{}V{}", name, self.variant))
    }

    /// Name of the default bundle folder inside a mod, e.g. `bundleV2`.
    pub fn default_bundle_dir_name(&self) -> String {
        format!("bundleV{}", self.variant)
    }

    pub fn default_bundle_dir(&self, name: &str) -> Utf8PathBuf {
        self.mod_dir(name).join(self.default_bundle_dir_name())
    }

    pub fn cfg_file_name(&self) -> String {
        format!("item_v{}.cfg", self.variant)
    }

    pub fn cfg_path(&self, name: &str) -> Utf8PathBuf {
        match &self.cfg_override {
            Some(path) => path.clone(),
            None => self.mod_dir(name).join(self.cfg_file_name()),
        }
    }

    /// Validate a batch of names without failing on the first bad one.
    pub fn validate_mod_names(&self, names: &[String], cfg_must_exist: bool) -> Vec<ModCheck> {
        names
            .iter()
            .map(|name| {
                let dir = self.mod_dir(name);
                let cfg_exists = self.cfg_path(name).is_file();

                let error = if !valid_mod_name(name) {
                    Some(format!("Folder name \"{name}\" is invalid"))
                } else if !dir.is_dir() {
                    Some(format!("Folder \"{dir}\" doesn't exist"))
                } else if cfg_must_exist && !cfg_exists {
                    Some(format!("Folder \"{dir}\" doesn't have {}", self.cfg_file_name()))
                } else {
                    None
                };

                ModCheck {
                    name: name.clone(),
                    dir,
                    cfg_exists,
                    error,
                }
            })
            .collect()
    }

    /// Every mod folder under the mods root, sorted by name.
    ///
    /// Ignored directories are skipped and so are dot-prefixed names unless
    /// `include_hidden` is set.
    pub fn list_mod_names(&self, include_hidden: bool) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.mods_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!("Skipping non UTF-8 folder name in {}", self.mods_dir);
                continue;
            };

            if self.ignored_dirs.iter().any(|ignored| ignored == &name) {
                continue;
            }
            if !include_hidden && name.starts_with('.') {
                continue;
            }

            names.push(name);
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn create_test_locator() -> (ModLocator, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let locator = ModLocator::new(root.join("mods"), root.join("mods/.temp"), GameVariant::Two)
            .with_ignored_dirs(vec!["node_modules".to_string()]);
        fs::create_dir_all(root.join("mods")).unwrap();
        (locator, temp_dir)
    }

    #[test]
    fn test_valid_mod_name_examples() {
        assert!(valid_mod_name("My-Mod 1"));
        assert!(valid_mod_name("100%_done"));
        assert!(!valid_mod_name("My/Mod"));
        assert!(!valid_mod_name(""));
        assert!(!valid_mod_name("dots.are.bad"));
    }

    #[test]
    fn test_paths_are_namespaced_per_variant() {
        let locator = ModLocator::new("/mods", "/tmp/vmb", GameVariant::Two);
        assert_eq!(locator.mod_dir("foo"), Utf8PathBuf::from("/mods/foo"));
        assert_eq!(locator.temp_dir("foo"), Utf8PathBuf::from("/tmp/vmb/fooV2"));
        assert_eq!(locator.default_bundle_dir("foo"), Utf8PathBuf::from("/mods/foo/bundleV2"));
        assert_eq!(locator.cfg_path("foo"), Utf8PathBuf::from("/mods/foo/item_v2.cfg"));

        let v1 = ModLocator::new("/mods", "/tmp/vmb", GameVariant::One);
        assert_eq!(v1.temp_dir("foo"), Utf8PathBuf::from("/tmp/vmb/fooV1"));
    }

    #[test]
    fn test_cfg_override() {
        let locator = ModLocator::new("/mods", "/tmp", GameVariant::One)
            .with_cfg_override(Some(Utf8PathBuf::from("/elsewhere/custom.cfg")));
        assert_eq!(locator.cfg_path("foo"), Utf8PathBuf::from("/elsewhere/custom.cfg"));
    }

    #[test]
    fn test_validate_mod_names_reports_each_problem() {
        let (locator, _temp_dir) = create_test_locator();
        fs::create_dir_all(locator.mod_dir("good")).unwrap();
        fs::write(locator.cfg_path("good"), "title = \"x\";\n").unwrap();
        fs::create_dir_all(locator.mod_dir("nocfg")).unwrap();

        let names: Vec<String> = ["good", "nocfg", "missing", "bad/name"].iter().map(|s| s.to_string()).collect();
        let checks = locator.validate_mod_names(&names, true);

        assert!(checks[0].is_valid());
        assert!(checks[0].cfg_exists);
        assert!(checks[1].error.as_deref().unwrap().contains("item_v2.cfg"));
        assert!(checks[2].error.as_deref().unwrap().contains("doesn't exist"));
        assert!(checks[3].error.as_deref().unwrap().contains("invalid"));

        let relaxed = locator.validate_mod_names(&names[1..2], false);
        assert!(relaxed[0].is_valid());
        assert!(!relaxed[0].cfg_exists);
    }

    #[test]
    fn test_list_mod_names_skips_ignored_and_hidden() {
        let (locator, _temp_dir) = create_test_locator();
        for name in ["b_mod", "a_mod", ".template-vmf", "node_modules"] {
            fs::create_dir_all(locator.mod_dir(name)).unwrap();
        }
        fs::write(locator.mods_dir().join("README.md"), "hi").unwrap();

        assert_eq!(locator.list_mod_names(false).unwrap(), vec!["a_mod", "b_mod"]);
        assert_eq!(
            locator.list_mod_names(true).unwrap(),
            vec![".template-vmf", "a_mod", "b_mod"]
        );
    }

    proptest! {
        #[test]
        fn prop_allowed_charset_is_valid(name in "[0-9a-zA-Z_\\- %]{1,40}") {
            prop_assert!(valid_mod_name(&name));
        }

        #[test]
        fn prop_foreign_char_is_invalid(
            prefix in "[0-9a-zA-Z_]{0,10}",
            bad in "[^0-9a-zA-Z_\\- %]",
            suffix in "[0-9a-zA-Z_]{0,10}",
        ) {
            let name = format!("{prefix}{bad}{suffix}");
            prop_assert!(!valid_mod_name(&name));
        }
    }
}
