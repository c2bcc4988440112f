use super::{BatchSummary, TaskContext, select_mods};
use crate::cli::BuildArgs;
use crate::services::WorkshopTarget;
use anyhow::Result;

/// Build every requested mod, one after the other.
pub async fn run(ctx: &TaskContext, args: &BuildArgs) -> Result<BatchSummary> {
    let locator = ctx.locator()?;
    let mut summary = BatchSummary::default();

    let names = select_mods(&locator, &args.names, false, &mut summary)?;
    if names.is_empty() {
        tracing::warn!("No mods to build");
        return Ok(summary);
    }

    let options = args.options(ctx.config.ignore_build_errors()?);
    let pipeline = ctx.build_pipeline(&locator, options.workshop != WorkshopTarget::Disabled)?;

    for name in names {
        match pipeline.build(&name, &options).await {
            Ok(report) => {
                for dest in &report.destinations {
                    tracing::debug!("{}: {} files in {}", name, report.files.len(), dest);
                }
                summary.success(name);
            }
            Err(e) => summary.failure(name, e),
        }
    }

    Ok(summary)
}
