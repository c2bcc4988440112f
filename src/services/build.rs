//! Building a mod with the Stingray compiler and placing the bundles.
//!
//! A build walks through these stages:
//!
//! `Idle -> TempPrep -> Compiling -> ParsingOutput -> Packaging -> Done`
//!
//! with `Failed` reachable from `Compiling` (the compiler couldn't be run) and
//! `ParsingOutput` (non-zero exit, missing manifest, or failed resources).
//! With `ignore_errors` the parsing failures are logged and packaging runs
//! anyway, which lets a partially broken mod be iterated on offline.

use crate::config::{Config, ConfigError};
use crate::paths;
use crate::services::bundle::{self, BundlePart};
use crate::services::item_cfg;
use crate::services::mod_locator::ModLocator;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use walkdir::WalkDir;

/// Compiler executable, relative to the SDK folder.
pub const COMPILER_EXE: &str = "bin/stingray_win64_dev_x64.exe";

/// Manifest the compiler writes into the data folder.
pub const MANIFEST_FILE: &str = "processed_bundles.csv";

/// Folder inside the bundle folder that receives a copy of the mod source.
pub const SOURCE_COPY_DIR: &str = "source";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to remove temp folder {path}: {source}")]
    TempCleanup {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Compiler not found at {0}")]
    CompilerNotFound(Utf8PathBuf),

    #[error("Failed to run compiler: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Mod \"{0}\" has no published id; publish it first or build without the Workshop copy")]
    NoPublishedId(String),

    #[error("Steam Workshop folder is unknown")]
    WorkshopDirUnknown,

    #[error("File operation failed on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where a build is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Idle,
    TempPrep,
    Compiling,
    ParsingOutput,
    Packaging,
    Done,
    Failed,
}

/// Where the Workshop copy of a build goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WorkshopTarget {
    /// Skip the Workshop copy
    Disabled,
    /// Use the `published_id` from the item cfg
    #[default]
    FromCfg,
    /// Use this item id
    Id(String),
}

/// Per-run build switches.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub clean: bool,
    pub verbose: bool,
    pub ignore_errors: bool,
    pub copy_source: bool,
    pub workshop: WorkshopTarget,
}

/// Environment-derived settings, resolved once per task.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub tools_dir: Utf8PathBuf,
    pub workshop_root: Option<Utf8PathBuf>,
    pub bundle_extension: String,
    pub use_new_format: bool,
    pub preview_image: String,
}

impl BuildSettings {
    pub fn from_config(
        config: &Config,
        tools_dir: Utf8PathBuf,
        workshop_root: Option<Utf8PathBuf>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            tools_dir,
            workshop_root,
            bundle_extension: config.bundle_extension()?,
            use_new_format: config.use_new_format()?,
            preview_image: config.template_preview_image()?,
        })
    }
}

/// One data row of `processed_bundles.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub bundle_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub size: String,
}

impl ManifestRow {
    /// A zero size means the resource failed to make it into the bundle.
    pub fn is_failed(&self) -> bool {
        self.size == "0"
    }

    /// `name.type`, the way the resource is referenced in mod code.
    pub fn resource(&self) -> String {
        format!("{}.{}", self.resource_name, self.resource_type)
    }
}

/// Parse the compiler's manifest. The first line is a header; rows with
/// fewer than four `", "`-separated fields are skipped.
pub fn parse_manifest(text: &str) -> Vec<ManifestRow> {
    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(", ").collect();
            if fields.len() < 4 {
                tracing::debug!("Skipping malformed manifest line: {}", line);
                return None;
            }

            Some(ManifestRow {
                bundle_id: fields[0].trim().to_string(),
                resource_name: unquote(fields[1]),
                resource_type: unquote(fields[2]),
                size: fields[3].trim().to_string(),
            })
        })
        .collect()
}

fn unquote(field: &str) -> String {
    field.trim().trim_matches('"').to_string()
}

/// Result of running the compiler.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub mod_name: String,
    pub stage: BuildStage,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub failed_resources: Vec<String>,
    pub warnings: Vec<String>,
    pub files: Vec<String>,
    pub destinations: Vec<Utf8PathBuf>,
}

impl BuildReport {
    fn new(mod_name: &str) -> Self {
        Self {
            mod_name: mod_name.to_string(),
            stage: BuildStage::Idle,
            exit_code: None,
            duration: Duration::ZERO,
            failed_resources: Vec::new(),
            warnings: Vec::new(),
            files: Vec::new(),
            destinations: Vec::new(),
        }
    }

    fn advance(&mut self, stage: BuildStage) {
        tracing::debug!("{}: {:?} -> {:?}", self.mod_name, self.stage, stage);
        self.stage = stage;
    }
}

/// Runs builds for mods under one mods folder.
pub struct BuildPipeline<'a> {
    locator: &'a ModLocator,
    settings: BuildSettings,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(locator: &'a ModLocator, settings: BuildSettings) -> Self {
        Self { locator, settings }
    }

    /// Build one mod and copy its bundles to every destination.
    pub async fn build(&self, mod_name: &str, options: &BuildOptions) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::new(mod_name);
        let mod_dir = self.locator.mod_dir(mod_name);
        let cfg_text = item_cfg::read(&self.locator.cfg_path(mod_name)).ok();

        // Destinations are resolved up front so a missing id fails before
        // the compiler runs.
        let bundle_dir = bundle_destination(self.locator, mod_name, cfg_text.as_deref());
        let workshop_dir = self.workshop_destination(mod_name, cfg_text.as_deref(), &options.workshop)?;

        report.advance(BuildStage::TempPrep);
        let temp_dir = self.locator.temp_dir(mod_name);
        prepare_temp_dir(&temp_dir, options.clean)?;
        let data_dir = temp_dir.join("compile");
        let temp_bundle_dir = temp_dir.join("bundle");
        for dir in [&data_dir, &temp_bundle_dir] {
            fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        }

        // A manifest left over from an earlier run must not hide a failure.
        let manifest_path = data_dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path).map_err(|source| io_error(&manifest_path, source))?;
        }

        report.advance(BuildStage::Compiling);
        tracing::info!("Building {}", mod_name);
        let outcome = match self.compile(&mod_dir, &data_dir, &temp_bundle_dir, options.verbose).await {
            Ok(outcome) => outcome,
            Err(e) => {
                report.advance(BuildStage::Failed);
                return Err(e);
            }
        };
        report.exit_code = outcome.exit_code;
        report.duration = outcome.duration;

        report.advance(BuildStage::ParsingOutput);
        let problems = self.check_output(&mut report, &manifest_path);
        if !problems.is_empty() {
            if options.ignore_errors {
                for problem in &problems {
                    tracing::warn!("{}: {} (ignored)", mod_name, problem);
                }
                report.warnings.extend(problems);
            } else {
                report.advance(BuildStage::Failed);
                return Err(BuildError::BuildFailed(problems.join("; ")));
            }
        }

        report.advance(BuildStage::Packaging);
        let parts = collect_bundle_parts(&temp_bundle_dir)?;
        if parts.is_empty() {
            let warning = format!("No bundle files in {temp_bundle_dir}, nothing copied");
            tracing::warn!("{}: {}", mod_name, warning);
            report.warnings.push(warning);
        } else {
            let mut destinations = vec![bundle_dir.clone()];
            destinations.extend(workshop_dir);

            for dest in destinations {
                let files = self.place_bundles(mod_name, &mod_dir, &parts, &dest)?;
                tracing::info!("{}: copied {} files to {}", mod_name, files.len(), dest);
                report.files = files;
                report.destinations.push(dest);
            }
        }

        if options.copy_source {
            let source_dir = bundle_dir.join(SOURCE_COPY_DIR);
            copy_source(&mod_dir, &source_dir, &self.source_excludes(&bundle_dir, cfg_text.as_deref()))?;
            tracing::info!("{}: copied source to {}", mod_name, source_dir);
        }

        report.advance(BuildStage::Done);
        tracing::info!(
            "Finished building {} in {:.2}s",
            mod_name,
            report.duration.as_secs_f32()
        );
        Ok(report)
    }

    fn workshop_destination(
        &self,
        mod_name: &str,
        cfg_text: Option<&str>,
        target: &WorkshopTarget,
    ) -> Result<Option<Utf8PathBuf>, BuildError> {
        let id = match target {
            WorkshopTarget::Disabled => return Ok(None),
            WorkshopTarget::Id(id) => id.clone(),
            WorkshopTarget::FromCfg => cfg_text
                .and_then(item_cfg::published_id)
                .ok_or_else(|| BuildError::NoPublishedId(mod_name.to_string()))?,
        };

        let root = self.settings.workshop_root.as_ref().ok_or(BuildError::WorkshopDirUnknown)?;
        Ok(Some(root.join(id)))
    }

    async fn compile(
        &self,
        mod_dir: &Utf8Path,
        data_dir: &Utf8Path,
        bundle_dir: &Utf8Path,
        verbose: bool,
    ) -> Result<CompileOutcome, BuildError> {
        let exe = self.settings.tools_dir.join(COMPILER_EXE);
        if !exe.is_file() {
            return Err(BuildError::CompilerNotFound(exe));
        }

        tracing::debug!(
            "Running {} --compile-for win32 --source-dir {} --data-dir {} --bundle-dir {}",
            exe,
            mod_dir,
            data_dir,
            bundle_dir
        );

        let start = Instant::now();
        let mut child = Command::new(&exe)
            .args(["--compile-for", "win32"])
            .arg("--source-dir")
            .arg(mod_dir)
            .arg("--data-dir")
            .arg(data_dir)
            .arg("--bundle-dir")
            .arg(bundle_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BuildError::Spawn)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(echo_output(stdout, verbose), echo_output(stderr, verbose));

        let status = child.wait().await.map_err(BuildError::Spawn)?;
        let duration = start.elapsed();

        tracing::debug!(
            "Compiler finished in {:.2}s with exit code {:?}",
            duration.as_secs_f32(),
            status.code()
        );

        Ok(CompileOutcome {
            exit_code: status.code(),
            duration,
        })
    }

    /// Inspect exit code and manifest. Returns the reasons the build failed.
    fn check_output(&self, report: &mut BuildReport, manifest_path: &Utf8Path) -> Vec<String> {
        let mut problems = Vec::new();

        match report.exit_code {
            Some(0) => {}
            Some(code) => problems.push(format!("compiler exited with code {code}")),
            None => problems.push("compiler was terminated".to_string()),
        }

        match fs::read_to_string(manifest_path) {
            Ok(text) => {
                for row in parse_manifest(&text).into_iter().filter(ManifestRow::is_failed) {
                    tracing::error!("{}: failed to build {}", report.mod_name, row.resource());
                    report.failed_resources.push(row.resource());
                }
                if !report.failed_resources.is_empty() {
                    problems.push(format!("{} resources failed to build", report.failed_resources.len()));
                }
            }
            Err(e) => problems.push(format!("failed to read {manifest_path}: {e}")),
        }

        problems
    }

    /// Replace the bundles in `dest` with the fresh output. Returns the
    /// copied file names.
    fn place_bundles(
        &self,
        mod_name: &str,
        mod_dir: &Utf8Path,
        parts: &[(Utf8PathBuf, BundlePart)],
        dest: &Utf8Path,
    ) -> Result<Vec<String>, BuildError> {
        let extension = &self.settings.bundle_extension;
        fs::create_dir_all(dest).map_err(|source| io_error(dest, source))?;
        remove_stale_outputs(dest, extension)?;

        let mod_hash = bundle::mod_bundle_hash(mod_name);
        let mut copied = Vec::new();

        for (source, part) in parts {
            let name = if self.settings.use_new_format {
                part.new_format_name(extension)
            } else {
                format!("{}{}", part.legacy_name(&mod_hash), extension)
            };

            if copied.contains(&name) {
                tracing::warn!("{}: {} is produced twice, keeping the last one", mod_name, name);
            }

            let target = dest.join(&name);
            fs::copy(source, &target).map_err(|source| io_error(&target, source))?;
            if !copied.contains(&name) {
                copied.push(name);
            }
        }

        if self.settings.use_new_format {
            let descriptor_name = format!("{mod_name}.mod");
            let descriptor = mod_dir.join(&descriptor_name);
            if descriptor.is_file() {
                let target = dest.join(&descriptor_name);
                fs::copy(&descriptor, &target).map_err(|source| io_error(&target, source))?;
                copied.push(descriptor_name);
            } else {
                tracing::warn!("{}: {} not found, the game won't load this mod", mod_name, descriptor);
            }
        }

        Ok(copied)
    }

    fn source_excludes(&self, bundle_dir: &Utf8Path, cfg_text: Option<&str>) -> SourceExcludes {
        let preview = cfg_text
            .and_then(|text| item_cfg::get_value(text, "preview", item_cfg::ValueType::String))
            .unwrap_or_else(|| self.settings.preview_image.clone());

        SourceExcludes {
            bundle_dir: bundle_dir.to_path_buf(),
            bundle_prefix: "bundleV".to_string(),
            preview,
        }
    }
}

/// Bundle folder from the cfg's `content`, or the variant default.
pub fn bundle_destination(locator: &ModLocator, mod_name: &str, cfg_text: Option<&str>) -> Utf8PathBuf {
    let content = cfg_text
        .and_then(|text| item_cfg::get_value(text, "content", item_cfg::ValueType::String))
        .filter(|content| !content.trim().is_empty());

    match content {
        Some(content) => paths::resolve(&locator.mod_dir(mod_name), content),
        None => locator.default_bundle_dir(mod_name),
    }
}

/// Delete or reuse the temp folder before compiling.
pub fn prepare_temp_dir(temp_dir: &Utf8Path, clean: bool) -> Result<(), BuildError> {
    if !temp_dir.exists() {
        return Ok(());
    }

    if clean {
        tracing::info!("Removing temp folder {}", temp_dir);
        fs::remove_dir_all(temp_dir).map_err(|source| BuildError::TempCleanup {
            path: temp_dir.to_path_buf(),
            source,
        })?;
    } else {
        tracing::warn!("Reusing temp folder {}, existing output may be overwritten", temp_dir);
    }

    Ok(())
}

/// Bundle part files the compiler produced, sorted by path. Anything under
/// a `dlc` folder is left out.
pub fn collect_bundle_parts(bundle_dir: &Utf8Path) -> Result<Vec<(Utf8PathBuf, BundlePart)>, BuildError> {
    let mut parts = Vec::new();

    for entry in WalkDir::new(bundle_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = paths::utf8_lossy(entry.path());
        let in_dlc = path
            .strip_prefix(bundle_dir)
            .map(|rel| rel.components().any(|c| c.as_str().eq_ignore_ascii_case("dlc")))
            .unwrap_or(false);
        if in_dlc {
            continue;
        }

        if let Some(part) = path.file_name().and_then(BundlePart::parse) {
            parts.push((path, part));
        }
    }

    Ok(parts)
}

fn remove_stale_outputs(dest: &Utf8Path, extension: &str) -> Result<(), BuildError> {
    let entries = fs::read_dir(dest).map_err(|source| io_error(dest, source))?;

    for entry in entries {
        let entry = entry.map_err(|source| io_error(dest, source))?;
        let path = paths::utf8_lossy(&entry.path());
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);

        if is_file && path.file_name().is_some_and(|name| bundle::is_stale_output(name, extension)) {
            fs::remove_file(&path).map_err(|source| io_error(&path, source))?;
            tracing::debug!("Removed stale {}", path);
        }
    }

    Ok(())
}

struct SourceExcludes {
    bundle_dir: Utf8PathBuf,
    bundle_prefix: String,
    preview: String,
}

/// Mirror the mod source into `target` for reference, leaving out cfg files,
/// bundle folders, hidden folders and the preview image.
fn copy_source(mod_dir: &Utf8Path, target: &Utf8Path, excludes: &SourceExcludes) -> Result<(), BuildError> {
    if target.exists() {
        fs::remove_dir_all(target).map_err(|source| io_error(target, source))?;
    }

    let walker = WalkDir::new(mod_dir).into_iter().filter_entry(|entry| {
        let path = paths::utf8_lossy(entry.path());
        if path == excludes.bundle_dir {
            return false;
        }

        let Ok(rel) = path.strip_prefix(mod_dir) else {
            return true;
        };
        let mut components = rel.components();
        let Some(first) = components.next() else {
            return true;
        };
        let top_level = components.next().is_none();
        let first = first.as_str();

        if entry.file_type().is_dir() {
            return !(first.starts_with(&excludes.bundle_prefix) || (top_level && first.starts_with('.')));
        }

        !(first.ends_with(".cfg") && top_level) && !(top_level && first == excludes.preview)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = paths::utf8_lossy(entry.path());
        let Ok(rel) = path.strip_prefix(mod_dir) else {
            continue;
        };

        let dest = target.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        fs::copy(&path, &dest).map_err(|source| io_error(&dest, source))?;
    }

    Ok(())
}

async fn echo_output<R: AsyncRead + Unpin>(reader: Option<R>, verbose: bool) {
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if verbose {
                    tracing::info!(target: "stingray", "{}", line);
                } else {
                    tracing::debug!(target: "stingray", "{}", line);
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading compiler output: {}", e);
                break;
            }
        }
    }
}

fn io_error(path: &Utf8Path, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}
