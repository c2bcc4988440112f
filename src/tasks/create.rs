use super::{BatchSummary, TaskContext, open};
use crate::cli::CreateArgs;
use crate::paths;
use crate::services::{TemplateParams, Templater, item_cfg, valid_mod_name};
use anyhow::{Context, Result, bail};

/// Create a mod folder from the template, write its item cfg and create the
/// Workshop item.
pub async fn run(ctx: &TaskContext, args: &CreateArgs) -> Result<BatchSummary> {
    let name = args.name.as_str();
    if !valid_mod_name(name) {
        bail!("Folder name \"{name}\" is invalid");
    }

    let config = &ctx.config;
    let locator = ctx.locator()?;
    let mod_dir = locator.mod_dir(name);
    if mod_dir.exists() {
        bail!("Folder {mod_dir} already exists");
    }

    let template_dir = match &args.template {
        Some(dir) => paths::resolve(&ctx.cwd, dir),
        None => config.template_dir()?,
    };
    let preview_image = config.template_preview_image()?;
    let templater = Templater::new(template_dir, preview_image.as_str(), &config.template_core_files()?)?;
    templater.validate()?;

    let params = args
        .item
        .item_params(name, &preview_image, &locator.default_bundle_dir_name());
    let template_params = TemplateParams {
        name: name.to_string(),
        title: params.title.clone(),
        description: params.description.clone(),
    };

    tracing::info!("Creating {} from {}", name, templater.template_dir());
    templater
        .copy_template(&mod_dir, &template_params)
        .with_context(|| format!("Failed to create {mod_dir}"))?;
    templater.copy_placeholder_bundle(name, &locator.default_bundle_dir(name), &config.bundle_extension()?)?;

    let cfg_path = locator.cfg_path(name);
    item_cfg::write(&cfg_path, &params)?;
    tracing::info!("Wrote {}", cfg_path);

    let mut summary = BatchSummary::default();
    if args.no_upload {
        tracing::info!("Created {} without a Workshop item", name);
        summary.success(name);
        return Ok(summary);
    }

    let id = ctx.upload_pipeline()?.upload(name, &cfg_path, None, false).await?;
    if args.item.open {
        open::open_item(&id)?;
    }

    summary.success(name);
    Ok(summary)
}
