//! Tasks - one module per subcommand.
//!
//! A task gets a [`TaskContext`] holding the loaded configuration and
//! returns a [`BatchSummary`]. Per-mod problems are recorded in the summary
//! and never stop the other mods; an `Err` means the task as a whole could
//! not run (no SDK, unknown Workshop folder, bad arguments).

pub mod build;
pub mod config;
pub mod create;
pub mod info;
pub mod open;
pub mod publish;
pub mod upload;
pub mod watch;

use crate::cli::{Command, GlobalArgs};
use crate::config::{Config, ConfigError, ConfigManager};
use crate::paths;
use crate::services::{
    BuildPipeline, BuildSettings, ModLocator, SystemSteamLookup, ToolLocator, UgcUploader, UploadPipeline,
};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::fmt::Display;

/// Exit code for a task with at least one failed mod.
pub const EXIT_TASK_FAILED: u8 = 1;

/// Exit code when the config can't be loaded.
pub const EXIT_CONFIG_FAILED: u8 = 2;

/// Everything a task needs, built once at startup.
#[derive(Debug)]
pub struct TaskContext {
    pub config: Config,
    pub manager: ConfigManager,
    pub cfg_override: Option<Utf8PathBuf>,
    /// Folder relative command-line paths resolve against.
    pub cwd: Utf8PathBuf,
}

impl TaskContext {
    /// Load the rc file and apply the per-run overrides from the command line.
    ///
    /// Relative command-line paths resolve against `cwd`. The game variant is
    /// validated here so a bad `--game` fails before any task starts.
    pub fn load(args: &GlobalArgs, cwd: &Utf8Path) -> Result<Self, ConfigError> {
        let manager = ConfigManager::new(paths::resolve(cwd, &args.rc));
        let mut config = manager.load(args.reset)?;

        if let Some(mods_dir) = &args.mods_dir {
            config.set_override("mods_dir", Value::String(paths::resolve(cwd, mods_dir).into_string()));
        }
        if let Some(temp_dir) = &args.temp_dir {
            config.set_override("temp_dir", Value::String(paths::resolve(cwd, temp_dir).into_string()));
        }
        if let Some(game) = &args.game {
            config.set_override("game", Value::String(game.clone()));
        }
        if args.use_fallback {
            config.set_override("use_fallback", Value::Bool(true));
        }

        let variant = config.variant()?;
        tracing::debug!("Using game {} with config {}", variant, manager.rc_path());

        Ok(Self {
            config,
            manager,
            cfg_override: args.cfg.as_ref().map(|cfg| paths::resolve(cwd, cfg)),
            cwd: cwd.to_path_buf(),
        })
    }

    pub fn new(config: Config, manager: ConfigManager) -> Self {
        let cwd = config.base_dir().to_path_buf();
        Self {
            config,
            manager,
            cfg_override: None,
            cwd,
        }
    }

    pub fn locator(&self) -> Result<ModLocator> {
        Ok(ModLocator::from_config(&self.config)?.with_cfg_override(self.cfg_override.clone()))
    }

    pub fn tool_locator(&self) -> ToolLocator<'_, SystemSteamLookup> {
        ToolLocator::new(&self.config, SystemSteamLookup::new())
    }

    /// Build pipeline for `locator`. The Workshop folder is only looked up
    /// when some build will copy there.
    pub fn build_pipeline<'a>(&self, locator: &'a ModLocator, needs_workshop: bool) -> Result<BuildPipeline<'a>> {
        let tools = self.tool_locator();
        let tools_dir = tools.tools_dir()?;
        let workshop_root = if needs_workshop {
            Some(tools.workshop_content_dir()?)
        } else {
            None
        };

        let settings = BuildSettings::from_config(&self.config, tools_dir, workshop_root)?;
        Ok(BuildPipeline::new(locator, settings))
    }

    pub fn upload_pipeline(&self) -> Result<UploadPipeline<UgcUploader>> {
        let tools_dir = self.tool_locator().tools_dir()?;
        let uploader = UgcUploader::new(tools_dir, self.config.game_id()?);
        Ok(UploadPipeline::new(uploader, self.config.uploader_args()?))
    }
}

/// Per-mod outcome of a task.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn success(&mut self, name: impl Into<String>) {
        self.succeeded.push(name.into());
    }

    /// Record and log a failed mod.
    pub fn failure(&mut self, name: impl Into<String>, error: impl Display) {
        let name = name.into();
        let message = error.to_string();
        tracing::error!("{}: {}", name, message);
        self.failed.push((name, message));
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { EXIT_TASK_FAILED }
    }

    /// Log a one-line result for batches of more than one mod.
    pub fn log_result(&self, task: &str) {
        let total = self.succeeded.len() + self.failed.len();
        if total < 2 {
            return;
        }

        if self.failed.is_empty() {
            tracing::info!("{}: all {} mods succeeded", task, total);
        } else {
            let names: Vec<&str> = self.failed.iter().map(|(name, _)| name.as_str()).collect();
            tracing::warn!("{}: {} of {} mods failed: {}", task, self.failed.len(), total, names.join(", "));
        }
    }
}

/// Names to work on: the given ones, or every mod folder when none are
/// given. Invalid names are recorded as failures and left out.
pub fn select_mods(
    locator: &ModLocator,
    names: &[String],
    cfg_must_exist: bool,
    summary: &mut BatchSummary,
) -> Result<Vec<String>> {
    let names = if names.is_empty() {
        let all = locator.list_mod_names(false)?;
        tracing::debug!("Found {} mods in {}", all.len(), locator.mods_dir());
        all
    } else {
        names.to_vec()
    };

    let mut valid = Vec::new();
    for check in locator.validate_mod_names(&names, cfg_must_exist) {
        match check.error {
            Some(error) => summary.failure(check.name, error),
            None => valid.push(check.name),
        }
    }

    Ok(valid)
}

/// Run the selected task.
pub async fn run(ctx: &mut TaskContext, command: &Command) -> Result<BatchSummary> {
    let (task, summary) = match command {
        Command::Create(args) => ("create", create::run(ctx, args).await?),
        Command::Build(args) => ("build", build::run(ctx, args).await?),
        Command::Publish(args) => ("publish", publish::run(ctx, args).await?),
        Command::Upload(args) => ("upload", upload::run(ctx, args).await?),
        Command::Open(args) => ("open", open::run(ctx, args)?),
        Command::Watch(args) => ("watch", watch::run(ctx, args).await?),
        Command::Info(args) => ("info", info::run(ctx, args)?),
        Command::Config(args) => ("config", config::run(ctx, args)?),
    };

    summary.log_result(task);
    Ok(summary)
}
