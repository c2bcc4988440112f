use super::{BatchSummary, TaskContext, open, select_mods};
use crate::cli::UploadArgs;
use crate::services::item_cfg;
use anyhow::Result;

/// Push new versions of already published mods.
pub async fn run(ctx: &TaskContext, args: &UploadArgs) -> Result<BatchSummary> {
    let locator = ctx.locator()?;
    let mut summary = BatchSummary::default();

    let names = if args.all {
        let with_cfg: Vec<String> = locator
            .list_mod_names(false)?
            .into_iter()
            .filter(|name| locator.cfg_path(name).is_file())
            .collect();
        select_mods(&locator, &with_cfg, true, &mut summary)?
    } else {
        select_mods(&locator, &args.names, true, &mut summary)?
    };

    if names.is_empty() {
        tracing::warn!("No mods to upload");
        return Ok(summary);
    }

    let pipeline = ctx.upload_pipeline()?;

    for name in names {
        let cfg_path = locator.cfg_path(&name);
        let published = item_cfg::read(&cfg_path).map(|text| item_cfg::published_id(&text));

        match published {
            Ok(Some(_)) => {}
            Ok(None) => {
                summary.failure(name, "not published yet, use publish first");
                continue;
            }
            Err(e) => {
                summary.failure(name, e);
                continue;
            }
        }

        match pipeline
            .upload(&name, &cfg_path, args.note.as_deref(), args.skip)
            .await
        {
            Ok(id) => {
                if args.open {
                    if let Err(e) = open::open_item(&id) {
                        tracing::warn!("{}: {:#}", name, e);
                    }
                }
                summary.success(name);
            }
            Err(e) => summary.failure(name, e),
        }
    }

    Ok(summary)
}
