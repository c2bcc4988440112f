use super::{BatchSummary, TaskContext, select_mods};
use crate::cli::InfoArgs;
use crate::services::build::bundle_destination;
use crate::services::{ModLocator, item_cfg};
use anyhow::Result;
use std::fmt::Write as _;

/// Print where each mod's files live and whether it's published.
pub fn run(ctx: &TaskContext, args: &InfoArgs) -> Result<BatchSummary> {
    let locator = ctx.locator()?;
    let mut summary = BatchSummary::default();

    for name in select_mods(&locator, &args.names, false, &mut summary)? {
        println!("{}", describe(&locator, &name, args.show_cfg));
        summary.success(name);
    }

    Ok(summary)
}

/// Multi-line description of one mod.
pub fn describe(locator: &ModLocator, name: &str, show_cfg: bool) -> String {
    let cfg_path = locator.cfg_path(name);
    let cfg_text = item_cfg::read(&cfg_path).ok();

    let mut out = String::new();
    let _ = writeln!(out, "{name}");
    let _ = writeln!(out, "  folder:       {}", locator.mod_dir(name));
    match &cfg_text {
        Some(_) => {
            let _ = writeln!(out, "  item cfg:     {cfg_path}");
        }
        None => {
            let _ = writeln!(out, "  item cfg:     {cfg_path} (missing)");
        }
    }

    let published = cfg_text.as_deref().and_then(item_cfg::published_id);
    let _ = writeln!(
        out,
        "  published id: {}",
        published.as_deref().unwrap_or("not published")
    );
    let _ = writeln!(
        out,
        "  bundles:      {}",
        bundle_destination(locator, name, cfg_text.as_deref())
    );
    let _ = write!(out, "  temp:         {}", locator.temp_dir(name));

    if show_cfg {
        if let Some(text) = &cfg_text {
            let _ = write!(out, "\n\n{}", text.trim_end());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameVariant;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_describe() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let locator = ModLocator::new(root.join("mods"), root.join("temp"), GameVariant::Two);
        fs::create_dir_all(locator.mod_dir("foo")).unwrap();

        let text = describe(&locator, "foo", true);
        assert!(text.contains("(missing)"));
        assert!(text.contains("not published"));
        assert!(text.contains(locator.default_bundle_dir("foo").as_str()));

        fs::write(
            locator.cfg_path("foo"),
            "title = \"Foo\";\ncontent = \"out\";\npublished_id = 99L;\n",
        )
        .unwrap();
        let text = describe(&locator, "foo", true);
        assert!(text.contains("published id: 99"));
        assert!(text.contains(locator.mod_dir("foo").join("out").as_str()));
        assert!(text.ends_with("published_id = 99L;"));
    }
}
