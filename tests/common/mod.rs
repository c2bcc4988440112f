//! Shared fixtures: a mods folder, a template and a fake SDK whose compiler
//! and uploader are shell scripts.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use vmb::cli::GlobalArgs;
use vmb::{ConfigManager, TaskContext};

pub const FAKE_COMPILER: &str = r#"#!/bin/sh
while [ "$#" -gt 0 ]; do
  case "$1" in
    --source-dir) src="$2"; shift ;;
    --data-dir) data="$2"; shift ;;
    --bundle-dir) bundle="$2"; shift ;;
  esac
  shift
done
echo "Compiling $src"
mkdir -p "$data" "$bundle/dlc"
size=512
if [ -f "$src/broken_texture" ]; then size=0; fi
printf 'Bundle, Resource, Type, Size\n0123456789abcdef, "foo", "texture", %s\n' "$size" > "$data/processed_bundles.csv"
cat "$src/main.lua" > "$bundle/0123456789abcdef"
printf 'stream' > "$bundle/0123456789abcdef.stream"
printf 'dlc' > "$bundle/dlc/fedcba9876543210"
if [ -f "$src/exit_code" ]; then exit "$(cat "$src/exit_code")"; fi
exit 0
"#;

pub const FAKE_UPLOADER: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "$(dirname "$0")/args.log"
cfg=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -c) cfg="$2"; shift ;;
  esac
  shift
done
echo "You need to accept the Steam Workshop legal agreement. Accept? [y/n]"
read answer
if [ "$answer" != "y" ]; then exit 3; fi
id=$(sed -n 's/^published_id = \([0-9]*\)L;$/\1/p' "$cfg")
if [ -z "$id" ]; then
  id=555000111
  printf 'published_id = %sL;\n' "$id" >> "$cfg"
fi
echo "publisher_id: $id"
exit 0
"#;

pub struct Workspace {
    _temp_dir: TempDir,
    pub root: Utf8PathBuf,
}

impl Workspace {
    pub fn mods_dir(&self) -> Utf8PathBuf {
        self.root.join("mods")
    }

    pub fn mod_dir(&self, name: &str) -> Utf8PathBuf {
        self.mods_dir().join(name)
    }

    pub fn sdk_dir(&self) -> Utf8PathBuf {
        self.root.join("sdk")
    }

    pub fn steamapps_dir(&self) -> Utf8PathBuf {
        self.root.join("steamapps")
    }

    pub fn rc_path(&self) -> Utf8PathBuf {
        self.root.join(".vmbrc")
    }

    /// Context as `main` would build it, with extra global flags.
    pub fn context_with(&self, args: GlobalArgs) -> TaskContext {
        TaskContext::load(&args, &self.root).unwrap()
    }

    pub fn context(&self) -> TaskContext {
        self.context_with(GlobalArgs {
            rc: self.rc_path(),
            ..Default::default()
        })
    }

    /// A buildable mod with a `.mod` descriptor and one script.
    pub fn add_mod(&self, name: &str) -> Utf8PathBuf {
        let dir = self.mod_dir(name);
        fs::create_dir_all(dir.join("scripts/mods").join(name)).unwrap();
        fs::write(dir.join(format!("{name}.mod")), format!("return {{ name = \"{name}\" }}\n")).unwrap();
        fs::write(dir.join("main.lua"), format!("-- {name}\n")).unwrap();
        dir
    }
}

/// Temp workspace with a template, a fake SDK and a `.vmbrc` pointing at them.
pub fn create_workspace() -> Workspace {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let workspace = Workspace {
        _temp_dir: temp_dir,
        root,
    };

    fs::create_dir_all(workspace.mods_dir()).unwrap();
    fs::create_dir_all(workspace.steamapps_dir()).unwrap();
    create_template(&workspace.mods_dir().join(".template-vmf"));
    create_sdk(&workspace.sdk_dir());

    let manager = ConfigManager::new(workspace.rc_path());
    let mut config = manager.load(false).unwrap();
    config.set("use_fallback", json!(true));
    for n in [1, 2] {
        config.set(format!("fallback_tools_dir{n}"), json!(workspace.sdk_dir().as_str()));
        config.set(format!("fallback_steamapps_dir{n}"), json!(workspace.steamapps_dir().as_str()));
    }
    manager.save(&config).unwrap();

    workspace
}

pub fn create_template(dir: &Utf8Path) {
    fs::create_dir_all(dir.join("scripts/mods/%%name")).unwrap();
    fs::create_dir_all(dir.join("core")).unwrap();
    fs::write(dir.join("item_preview.jpg"), [0xff, 0xd8, 0xff, 0xe0]).unwrap();
    fs::write(dir.join("%%name.mod"), "return { name = \"%%name\", title = \"%%title\" }\n").unwrap();
    fs::write(
        dir.join("scripts/mods/%%name/%%name.lua"),
        "local mod = get_mod(\"%%name\")\n-- %%description\n",
    )
    .unwrap();
    fs::write(dir.join("core/%%name.lua"), "-- %%name is kept\n").unwrap();
}

pub fn create_sdk(dir: &Utf8Path) {
    write_script(&dir.join("bin/stingray_win64_dev_x64.exe"), FAKE_COMPILER);
    write_script(&dir.join("ugc_uploader/ugc_tool.exe"), FAKE_UPLOADER);
}

fn write_script(path: &Utf8Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().unwrap().is_file())
        .map(|entry| entry.file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}
