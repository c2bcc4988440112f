//! Finding the SDK install and the Steam Workshop content folder.
//!
//! Steam install locations come from a [`SteamLookup`]. The system lookup
//! asks the Windows registry first and then scans Steam's library metadata
//! (`libraryfolders.vdf` + `appmanifest_<id>.acf`). When a lookup fails, or
//! `use_fallback` is set, the statically configured paths are used instead.

use crate::config::{Config, ConfigError};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use thiserror::Error;

static LIBRARY_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""path"\s+"((?:[^"\\]|\\.)*)""#).expect("Invalid library path regex"));

static INSTALL_DIR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""installdir"\s+"((?:[^"\\]|\\.)*)""#).expect("Invalid installdir regex"));

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Steam app {0} is not installed")]
    AppNotFound(String),

    #[error("SDK folder not found at {0}")]
    ToolsNotFound(Utf8PathBuf),

    #[error("Steam Workshop folder not found at {0}")]
    WorkshopDirNotFound(Utf8PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Source of Steam app install locations.
#[cfg_attr(test, mockall::automock)]
pub trait SteamLookup {
    /// Install folder of a Steam app, e.g. `<library>/steamapps/common/<name>`.
    fn app_install_dir(&self, app_id: &str) -> Result<Utf8PathBuf, LocatorError>;
}

/// Lookup backed by the registry and the Steam library files on disk.
#[derive(Debug, Clone, Default)]
pub struct SystemSteamLookup {
    steam_roots: Vec<Utf8PathBuf>,
}

impl SystemSteamLookup {
    /// Use the platform's usual Steam install folders.
    pub fn new() -> Self {
        Self {
            steam_roots: default_steam_roots(),
        }
    }

    /// Use specific Steam install folders.
    pub fn with_roots(steam_roots: Vec<Utf8PathBuf>) -> Self {
        Self { steam_roots }
    }

    /// Library folders from every known Steam root, in discovery order.
    pub fn library_dirs(&self) -> Vec<Utf8PathBuf> {
        let mut libraries: Vec<Utf8PathBuf> = Vec::new();

        for root in &self.steam_roots {
            let mut push = |dir: Utf8PathBuf| {
                if !libraries.contains(&dir) {
                    libraries.push(dir);
                }
            };

            if root.join("steamapps").is_dir() {
                push(root.clone());
            }

            let vdf = root.join("steamapps").join("libraryfolders.vdf");
            match fs::read_to_string(&vdf) {
                Ok(text) => parse_library_folders(&text).into_iter().for_each(&mut push),
                Err(e) => tracing::debug!("No library list at {}: {}", vdf, e),
            }
        }

        libraries
    }
}

impl SteamLookup for SystemSteamLookup {
    fn app_install_dir(&self, app_id: &str) -> Result<Utf8PathBuf, LocatorError> {
        #[cfg(windows)]
        if let Some(dir) = registry::app_install_location(app_id) {
            tracing::debug!("Found app {} in registry: {}", app_id, dir);
            return Ok(dir);
        }

        for library in self.library_dirs() {
            let steamapps = library.join("steamapps");
            let manifest = steamapps.join(format!("appmanifest_{app_id}.acf"));
            let Ok(text) = fs::read_to_string(&manifest) else {
                continue;
            };

            if let Some(install_dir) = parse_install_dir(&text) {
                let dir = steamapps.join("common").join(install_dir);
                tracing::debug!("Found app {} in library {}: {}", app_id, library, dir);
                return Ok(dir);
            }
        }

        Err(LocatorError::AppNotFound(app_id.to_string()))
    }
}

/// Extract library paths from a text `libraryfolders.vdf`.
pub fn parse_library_folders(text: &str) -> Vec<Utf8PathBuf> {
    LIBRARY_PATH_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| Utf8PathBuf::from(m.as_str().replace("\\\\", "\\")))
        .collect()
}

/// Extract the `installdir` value from an app manifest.
pub fn parse_install_dir(text: &str) -> Option<String> {
    INSTALL_DIR_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace("\\\\", "\\"))
}

fn default_steam_roots() -> Vec<Utf8PathBuf> {
    let mut roots = Vec::new();

    #[cfg(windows)]
    if let Some(root) = registry::steam_install_path() {
        roots.push(root);
    }

    if let Some(home) = dirs::home_dir().and_then(|home| Utf8PathBuf::from_path_buf(home).ok()) {
        #[cfg(target_os = "macos")]
        roots.push(home.join("Library/Application Support/Steam"));

        #[cfg(all(not(windows), not(target_os = "macos")))]
        {
            roots.push(home.join(".steam/steam"));
            roots.push(home.join(".local/share/Steam"));
        }

        #[cfg(windows)]
        let _ = home;
    }

    roots
}

#[cfg(windows)]
mod registry {
    use camino::Utf8PathBuf;
    use winreg::RegKey;
    use winreg::enums::HKEY_LOCAL_MACHINE;

    /// `InstallLocation` of the uninstall entry Steam writes per app.
    pub(super) fn app_install_location(app_id: &str) -> Option<Utf8PathBuf> {
        let subkey = format!(r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Steam App {app_id}");
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        let key = hklm.open_subkey(subkey).ok()?;
        let location: String = key.get_value("InstallLocation").ok()?;
        Some(Utf8PathBuf::from(location))
    }

    pub(super) fn steam_install_path() -> Option<Utf8PathBuf> {
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        [r"SOFTWARE\Wow6432Node\Valve\Steam", r"SOFTWARE\Valve\Steam"]
            .into_iter()
            .find_map(|subkey| {
                let key = hklm.open_subkey(subkey).ok()?;
                let path: String = key.get_value("InstallPath").ok()?;
                Some(Utf8PathBuf::from(path))
            })
    }
}

/// Resolves the SDK folder and the Workshop content folder for the active
/// game variant.
pub struct ToolLocator<'a, L: SteamLookup> {
    config: &'a Config,
    lookup: L,
}

impl<'a, L: SteamLookup> ToolLocator<'a, L> {
    pub fn new(config: &'a Config, lookup: L) -> Self {
        Self { config, lookup }
    }

    /// SDK install folder holding the compiler and the uploader.
    pub fn tools_dir(&self) -> Result<Utf8PathBuf, LocatorError> {
        let tools_id = self.config.tools_id()?;
        let dir = match self.resolve(&tools_id)? {
            Some(dir) => dir,
            None => self.config.fallback_tools_dir()?,
        };

        if !dir.is_dir() {
            return Err(LocatorError::ToolsNotFound(dir));
        }
        Ok(dir)
    }

    /// `steamapps` folder of the library the game is installed in.
    pub fn steamapps_dir(&self) -> Result<Utf8PathBuf, LocatorError> {
        let game_id = self.config.game_id()?;
        let game_dir = self.resolve(&game_id)?;

        // <library>/steamapps/common/<game>
        let steamapps = game_dir
            .as_deref()
            .and_then(Utf8Path::parent)
            .and_then(Utf8Path::parent)
            .map(Utf8Path::to_path_buf);

        match steamapps {
            Some(dir) => Ok(dir),
            None => {
                let fallback = self.config.fallback_steamapps_dir()?;
                tracing::debug!("Using fallback steamapps folder {}", fallback);
                Ok(fallback)
            }
        }
    }

    /// `workshop/content/<game_id>` inside the game's library.
    pub fn workshop_content_dir(&self) -> Result<Utf8PathBuf, LocatorError> {
        let steamapps = self.steamapps_dir()?;
        if !steamapps.is_dir() {
            return Err(LocatorError::WorkshopDirNotFound(steamapps));
        }
        Ok(steamapps.join("workshop").join("content").join(self.config.game_id()?))
    }

    /// Install folder reported by Steam, or `None` when the fallback paths
    /// should be used. A reported folder that doesn't exist counts as a miss.
    fn resolve(&self, app_id: &str) -> Result<Option<Utf8PathBuf>, LocatorError> {
        if self.config.use_fallback()? {
            tracing::debug!("Using fallback folders for app {}", app_id);
            return Ok(None);
        }

        match self.lookup.app_install_dir(app_id) {
            Ok(dir) if dir.is_dir() => Ok(Some(dir)),
            Ok(dir) => {
                tracing::warn!("Steam app {} points at missing folder {}, using fallback", app_id, dir);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("{}, using fallback", e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn utf8_temp() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_parse_library_folders() {
        let vdf = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
	}
	"1"
	{
		"path"		"D:\\SteamLibrary"
	}
}
"#;
        let libraries = parse_library_folders(vdf);
        assert_eq!(
            libraries,
            vec![
                Utf8PathBuf::from("C:\\Program Files (x86)\\Steam"),
                Utf8PathBuf::from("D:\\SteamLibrary"),
            ]
        );
    }

    #[test]
    fn test_parse_install_dir() {
        let acf = "\"AppState\"\n{\n\t\"appid\"\t\t\"552500\"\n\t\"installdir\"\t\t\"Warhammer Vermintide 2\"\n}\n";
        assert_eq!(parse_install_dir(acf), Some("Warhammer Vermintide 2".to_string()));
        assert_eq!(parse_install_dir("{}"), None);
    }

    #[test]
    fn test_system_lookup_scans_libraries() {
        let (_temp_dir, root) = utf8_temp();
        let steam = root.join("Steam");
        let library = root.join("Library");

        fs::create_dir_all(steam.join("steamapps")).unwrap();
        fs::create_dir_all(library.join("steamapps")).unwrap();
        fs::write(
            steam.join("steamapps/libraryfolders.vdf"),
            format!("\"libraryfolders\"\n{{\n\t\"1\"\n\t{{\n\t\t\"path\"\t\t\"{library}\"\n\t}}\n}}\n"),
        )
        .unwrap();
        fs::write(
            library.join("steamapps/appmanifest_718610.acf"),
            "\"AppState\"\n{\n\t\"installdir\"\t\t\"Vermintide 2 SDK\"\n}\n",
        )
        .unwrap();

        let lookup = SystemSteamLookup::with_roots(vec![steam.clone()]);
        assert_eq!(lookup.library_dirs(), vec![steam, library.clone()]);
        assert_eq!(
            lookup.app_install_dir("718610").unwrap(),
            library.join("steamapps/common/Vermintide 2 SDK")
        );
        assert!(matches!(lookup.app_install_dir("1"), Err(LocatorError::AppNotFound(_))));
    }

    #[test]
    fn test_tools_dir_from_lookup() {
        let (_temp_dir, root) = utf8_temp();
        let sdk = root.join("steamapps/common/Vermintide 2 SDK");
        fs::create_dir_all(&sdk).unwrap();

        let config = Config::with_defaults(&root);
        let mut lookup = MockSteamLookup::new();
        let found = sdk.clone();
        lookup
            .expect_app_install_dir()
            .with(eq("718610"))
            .times(1)
            .returning(move |_| Ok(found.clone()));

        let locator = ToolLocator::new(&config, lookup);
        assert_eq!(locator.tools_dir().unwrap(), sdk);
    }

    #[test]
    fn test_tools_dir_falls_back_when_lookup_fails() {
        let (_temp_dir, root) = utf8_temp();
        let fallback = root.join("sdk");
        fs::create_dir_all(&fallback).unwrap();

        let mut config = Config::with_defaults(&root);
        config.set_override("fallback_tools_dir2", json!(fallback.as_str()));

        let mut lookup = MockSteamLookup::new();
        lookup
            .expect_app_install_dir()
            .returning(|id| Err(LocatorError::AppNotFound(id.to_string())));

        let locator = ToolLocator::new(&config, lookup);
        assert_eq!(locator.tools_dir().unwrap(), fallback);
    }

    #[test]
    fn test_stale_install_dir_falls_back() {
        let (_temp_dir, root) = utf8_temp();
        let fallback_sdk = root.join("sdk");
        fs::create_dir_all(&fallback_sdk).unwrap();

        let mut config = Config::with_defaults(&root);
        config.set_override("fallback_tools_dir2", json!(fallback_sdk.as_str()));
        config.set_override("fallback_steamapps_dir2", json!(root.as_str()));

        // Left behind by an uninstalled app
        let stale = root.join("lib/steamapps/common/uninstalled");
        let mut lookup = MockSteamLookup::new();
        lookup
            .expect_app_install_dir()
            .times(2)
            .returning(move |_| Ok(stale.clone()));

        let locator = ToolLocator::new(&config, lookup);
        assert_eq!(locator.tools_dir().unwrap(), fallback_sdk);
        assert_eq!(locator.steamapps_dir().unwrap(), root);
    }

    #[test]
    fn test_use_fallback_skips_lookup() {
        let (_temp_dir, root) = utf8_temp();
        let mut config = Config::with_defaults(&root);
        config.set_override("use_fallback", json!(true));
        config.set_override("fallback_tools_dir2", json!(root.join("missing").as_str()));
        config.set_override("fallback_steamapps_dir2", json!(root.as_str()));

        let mut lookup = MockSteamLookup::new();
        lookup.expect_app_install_dir().times(0);

        let locator = ToolLocator::new(&config, lookup);
        assert!(matches!(locator.tools_dir(), Err(LocatorError::ToolsNotFound(_))));
        assert_eq!(
            locator.workshop_content_dir().unwrap(),
            root.join("workshop/content/552500")
        );
    }

    #[test]
    fn test_workshop_dir_from_game_install() {
        let (_temp_dir, root) = utf8_temp();
        let steamapps = root.join("lib/steamapps");
        fs::create_dir_all(steamapps.join("common/Warhammer Vermintide 2")).unwrap();

        let config = Config::with_defaults(&root);
        let mut lookup = MockSteamLookup::new();
        let game_dir = steamapps.join("common/Warhammer Vermintide 2");
        lookup
            .expect_app_install_dir()
            .with(eq("552500"))
            .returning(move |_| Ok(game_dir.clone()));

        let locator = ToolLocator::new(&config, lookup);
        assert_eq!(
            locator.workshop_content_dir().unwrap(),
            steamapps.join("workshop/content/552500")
        );
    }

    #[test]
    fn test_missing_steamapps_is_error() {
        let (_temp_dir, root) = utf8_temp();
        let mut config = Config::with_defaults(&root);
        config.set_override("use_fallback", json!(true));
        config.set_override("fallback_steamapps_dir2", json!(root.join("nowhere").as_str()));

        let locator = ToolLocator::new(&config, MockSteamLookup::new());
        assert!(matches!(
            locator.workshop_content_dir(),
            Err(LocatorError::WorkshopDirNotFound(_))
        ));
    }
}
