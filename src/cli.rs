//! Command-line surface.

use crate::models::{DEFAULT_RC_FILE, ItemParams, Visibility, split_tags};
use crate::services::{BuildOptions, WorkshopTarget};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vmb", author, version, about = "Create, build and publish Vermintide mods")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every task. Everything except `--rc` and `--reset`
/// applies to this run only.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file to use
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_RC_FILE)]
    pub rc: Utf8PathBuf,

    /// Recreate the config file from defaults
    #[arg(long, global = true)]
    pub reset: bool,

    /// Log debug output and print full error chains
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also write logs to daily files in this folder
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<Utf8PathBuf>,

    /// Mods folder
    #[arg(long, global = true, value_name = "DIR")]
    pub mods_dir: Option<Utf8PathBuf>,

    /// Folder for intermediate build files
    #[arg(long, global = true, value_name = "DIR")]
    pub temp_dir: Option<Utf8PathBuf>,

    /// Game: 1 for Vermintide, 2 for Vermintide 2
    #[arg(short = 'g', long, global = true, value_name = "N")]
    pub game: Option<String>,

    /// Use the configured SDK and Steam folders instead of asking Steam
    #[arg(long, global = true)]
    pub use_fallback: bool,

    /// Item cfg file to use instead of item_v<N>.cfg in the mod folder
    #[arg(long, global = true, value_name = "FILE")]
    pub cfg: Option<Utf8PathBuf>,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self {
            rc: Utf8PathBuf::from(DEFAULT_RC_FILE),
            reset: false,
            debug: false,
            log_dir: None,
            mods_dir: None,
            temp_dir: None,
            game: None,
            use_fallback: false,
            cfg: None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a mod from the template and its Workshop item
    Create(CreateArgs),
    /// Build mods and copy the bundles
    Build(BuildArgs),
    /// Build a mod and create its Workshop item
    Publish(PublishArgs),
    /// Upload new versions of published mods
    Upload(UploadArgs),
    /// Open a mod's Workshop page
    Open(OpenArgs),
    /// Rebuild mods when their files change
    Watch(BuildArgs),
    /// Show where a mod's files are
    Info(InfoArgs),
    /// Show or change the config file
    Config(ConfigArgs),
}

/// Workshop item metadata for a new item cfg.
#[derive(Args, Debug, Clone, Default)]
pub struct ItemArgs {
    /// Item title (default: the mod name)
    #[arg(short = 't', long)]
    pub title: Option<String>,

    /// Item description
    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// Item language
    #[arg(short = 'l', long, default_value = "english")]
    pub language: String,

    /// Item visibility
    #[arg(short = 'v', long, value_enum, default_value_t = Visibility::Private)]
    pub visibility: Visibility,

    /// Tags separated by `;`
    #[arg(long, default_value = "")]
    pub tags: String,

    /// Open the item page once it's created
    #[arg(long)]
    pub open: bool,
}

impl ItemArgs {
    pub fn item_params(&self, mod_name: &str, preview: &str, content: &str) -> ItemParams {
        let mut params = ItemParams::for_mod(mod_name, preview, content);
        if let Some(title) = &self.title {
            params.title = title.clone();
        }
        if let Some(description) = &self.description {
            params.description = description.clone();
        }
        params.language = self.language.clone();
        params.visibility = self.visibility;
        params.tags = split_tags(&self.tags);
        params
    }
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Mod folder name
    pub name: String,

    #[command(flatten)]
    pub item: ItemArgs,

    /// Template folder (default: template_dir from the config)
    #[arg(long, value_name = "DIR")]
    pub template: Option<Utf8PathBuf>,

    /// Only create the folder and item cfg
    #[arg(long)]
    pub no_upload: bool,
}

/// Compiler switches shared by build, publish and watch.
#[derive(Args, Debug, Clone, Default)]
pub struct CompileFlags {
    /// Delete the temp folder before building
    #[arg(long)]
    pub clean: bool,

    /// Print compiler output
    #[arg(long)]
    pub verbose: bool,

    /// Copy bundles even if the compiler reported errors
    #[arg(long)]
    pub ignore_errors: bool,

    /// Copy the mod source into the bundle folder
    #[arg(long)]
    pub source: bool,
}

impl CompileFlags {
    /// `ignore_build_errors` from the config turns `--ignore-errors` on.
    pub fn options(&self, ignore_build_errors: bool, workshop: WorkshopTarget) -> BuildOptions {
        BuildOptions {
            clean: self.clean,
            verbose: self.verbose,
            ignore_errors: self.ignore_errors || ignore_build_errors,
            copy_source: self.source,
            workshop,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Mods to build (default: every mod)
    pub names: Vec<String>,

    #[command(flatten)]
    pub flags: CompileFlags,

    /// Workshop item id to copy the bundles to
    #[arg(long, conflicts_with = "no_workshop")]
    pub id: Option<String>,

    /// Don't copy the bundles to the Workshop folder
    #[arg(long)]
    pub no_workshop: bool,
}

impl BuildArgs {
    pub fn workshop_target(&self) -> WorkshopTarget {
        match (&self.id, self.no_workshop) {
            (_, true) => WorkshopTarget::Disabled,
            (Some(id), false) => WorkshopTarget::Id(id.clone()),
            (None, false) => WorkshopTarget::FromCfg,
        }
    }

    pub fn options(&self, ignore_build_errors: bool) -> BuildOptions {
        self.flags.options(ignore_build_errors, self.workshop_target())
    }
}

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Mod folder name
    pub name: String,

    #[command(flatten)]
    pub item: ItemArgs,

    #[command(flatten)]
    pub flags: CompileFlags,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Mods to upload
    #[arg(required_unless_present = "all")]
    pub names: Vec<String>,

    /// Upload every mod that has an item cfg
    #[arg(long, conflicts_with = "names")]
    pub all: bool,

    /// Change note
    #[arg(short = 'n', long)]
    pub note: Option<String>,

    /// Open the item pages after uploading
    #[arg(long)]
    pub open: bool,

    /// Only update the item metadata
    #[arg(long)]
    pub skip: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OpenArgs {
    /// Mod whose item page to open
    #[arg(required_unless_present = "id")]
    pub name: Option<String>,

    /// Workshop item id
    #[arg(long, conflicts_with = "name")]
    pub id: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct InfoArgs {
    /// Mods to describe (default: every mod)
    pub names: Vec<String>,

    /// Print the item cfg contents
    #[arg(long)]
    pub show_cfg: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Persist a value, e.g. `--set game=1` or `--set mods_dir=../mods`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}
