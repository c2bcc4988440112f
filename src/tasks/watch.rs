//! Rebuild mods when their source changes.
//!
//! Each mod folder gets its own watcher. Events are reduced to mod names and
//! sent over a channel. After the first event the loop waits until the
//! folder has been quiet for [`DEBOUNCE`], then builds every pending mod once,
//! one at a time. Events that arrive during a build queue up and trigger a
//! single follow-up build, so a mod is never built twice concurrently.

use super::{BatchSummary, TaskContext, select_mods};
use crate::cli::BuildArgs;
use crate::paths;
use crate::services::build::bundle_destination;
use crate::services::{ModLocator, WorkshopTarget, item_cfg};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Quiet period before a batch of changes triggers a build.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Paths inside one mod folder whose changes don't trigger a build.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    ignored: Vec<Utf8PathBuf>,
}

impl WatchFilter {
    /// Ignore the build outputs of `name` plus the configured ignored folders.
    pub fn for_mod(locator: &ModLocator, name: &str, mod_dir: &Utf8Path, ignored_dirs: &[String]) -> Self {
        let cfg_text = item_cfg::read(&locator.cfg_path(name)).ok();
        let bundle_dir = bundle_destination(locator, name, cfg_text.as_deref());
        let rel_bundle = bundle_dir
            .strip_prefix(locator.mod_dir(name))
            .map(|rel| mod_dir.join(rel))
            .unwrap_or(bundle_dir.clone());

        let mut ignored = vec![rel_bundle, mod_dir.join("bundleV1"), mod_dir.join("bundleV2")];
        ignored.extend(ignored_dirs.iter().map(|dir| mod_dir.join(dir)));
        Self { ignored }
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        let path = paths::utf8_lossy(path);
        !self.ignored.iter().any(|ignored| path.starts_with(ignored))
    }

    /// Whether `event` should trigger a rebuild.
    pub fn triggers(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.iter().any(|path| self.is_relevant(path))
    }
}

pub async fn run(ctx: &TaskContext, args: &BuildArgs) -> Result<BatchSummary> {
    let locator = ctx.locator()?;
    let mut summary = BatchSummary::default();

    let names = select_mods(&locator, &args.names, false, &mut summary)?;
    if names.is_empty() {
        tracing::warn!("No mods to watch");
        return Ok(summary);
    }

    let options = args.options(ctx.config.ignore_build_errors()?);
    let pipeline = ctx.build_pipeline(&locator, options.workshop != WorkshopTarget::Disabled)?;
    let ignored_dirs = ctx.config.ignored_dirs()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut watchers: Vec<RecommendedWatcher> = Vec::new();

    for name in &names {
        // notify reports absolute, resolved paths
        let mod_dir = locator
            .mod_dir(name)
            .canonicalize_utf8()
            .with_context(|| format!("Failed to resolve folder of {name}"))?;
        let filter = WatchFilter::for_mod(&locator, name, &mod_dir, &ignored_dirs);

        let tx = tx.clone();
        let mod_name = name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if filter.triggers(&event) {
                        let _ = tx.send(mod_name.clone());
                    }
                }
                Err(e) => tracing::warn!("Watch error for {}: {}", mod_name, e),
            },
            Config::default(),
        )
        .with_context(|| format!("Failed to create watcher for {name}"))?;

        watcher
            .watch(mod_dir.as_std_path(), RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {mod_dir}"))?;
        tracing::info!("Watching {}", mod_dir);
        watchers.push(watcher);
    }
    drop(tx);

    tracing::info!("Waiting for changes, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let first = tokio::select! {
            _ = &mut ctrl_c => break,
            name = rx.recv() => match name {
                Some(name) => name,
                None => break,
            },
        };

        let mut pending = IndexSet::new();
        pending.insert(first);
        while let Ok(Some(name)) = tokio::time::timeout(DEBOUNCE, rx.recv()).await {
            pending.insert(name);
        }

        for name in pending {
            match pipeline.build(&name, &options).await {
                Ok(_) => summary.success(name),
                Err(e) => summary.failure(name, e),
            }
        }
    }

    tracing::info!("Stopped watching");
    drop(watchers);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameVariant;
    use notify::event::{AccessKind, CreateKind};
    use std::fs;
    use tempfile::TempDir;

    fn create_filter() -> (TempDir, Utf8PathBuf, WatchFilter) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let locator = ModLocator::new(root.join("mods"), root.join("temp"), GameVariant::Two);
        let mod_dir = locator.mod_dir("foo");
        fs::create_dir_all(&mod_dir).unwrap();
        fs::write(locator.cfg_path("foo"), "content = \"dist\";\n").unwrap();

        let filter = WatchFilter::for_mod(&locator, "foo", &mod_dir, &[".git".to_string()]);
        (temp_dir, mod_dir, filter)
    }

    #[test]
    fn test_filter_ignores_outputs() {
        let (_temp_dir, mod_dir, filter) = create_filter();

        assert!(filter.is_relevant(mod_dir.join("scripts/mods/foo/foo.lua").as_std_path()));
        assert!(!filter.is_relevant(mod_dir.join("dist/0123456789abcdef").as_std_path()));
        assert!(!filter.is_relevant(mod_dir.join("bundleV2/foo.mod").as_std_path()));
        assert!(!filter.is_relevant(mod_dir.join(".git/index").as_std_path()));
    }

    #[test]
    fn test_filter_events() {
        let (_temp_dir, mod_dir, filter) = create_filter();
        let source = mod_dir.join("foo.lua").into_std_path_buf();

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(source.clone());
        assert!(filter.triggers(&create));

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(source);
        assert!(!filter.triggers(&access));

        let output = Event::new(EventKind::Create(CreateKind::File))
            .add_path(mod_dir.join("dist/0123456789abcdef").into_std_path_buf());
        assert!(!filter.triggers(&output));
    }
}
