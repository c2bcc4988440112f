use super::{BatchSummary, TaskContext, open};
use crate::cli::PublishArgs;
use crate::services::{WorkshopTarget, item_cfg};
use anyhow::{Result, bail};

/// Build an existing, unpublished mod and create its Workshop item.
///
/// The item cfg is written from the arguments when the mod doesn't have one.
/// The build skips the Workshop copy since the item doesn't exist yet.
pub async fn run(ctx: &TaskContext, args: &PublishArgs) -> Result<BatchSummary> {
    let name = args.name.as_str();
    let locator = ctx.locator()?;

    let check = locator.validate_mod_names(std::slice::from_ref(&args.name), false).remove(0);
    if let Some(error) = check.error {
        bail!(error);
    }

    let cfg_path = locator.cfg_path(name);
    if check.cfg_exists {
        let text = item_cfg::read(&cfg_path)?;
        if let Some(id) = item_cfg::published_id(&text) {
            bail!("Mod \"{name}\" is already published as {id}, use upload to update it");
        }
        tracing::info!("Using existing {}", cfg_path);
    } else {
        let params = args.item.item_params(
            name,
            &ctx.config.template_preview_image()?,
            &locator.default_bundle_dir_name(),
        );
        item_cfg::write(&cfg_path, &params)?;
        tracing::info!("Wrote {}", cfg_path);
    }

    let options = args
        .flags
        .options(ctx.config.ignore_build_errors()?, WorkshopTarget::Disabled);
    let pipeline = ctx.build_pipeline(&locator, false)?;
    pipeline.build(name, &options).await?;

    let id = ctx.upload_pipeline()?.upload(name, &cfg_path, None, false).await?;
    if args.item.open {
        open::open_item(&id)?;
    }

    let mut summary = BatchSummary::default();
    summary.success(name);
    Ok(summary)
}
