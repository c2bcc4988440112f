use super::{BatchSummary, TaskContext};
use crate::cli::ConfigArgs;
use crate::config::{check_value, parse_assignment};
use anyhow::{Context, Result};

/// Print the effective config, after persisting any `--set` values.
pub fn run(ctx: &mut TaskContext, args: &ConfigArgs) -> Result<BatchSummary> {
    if !args.set.is_empty() {
        for raw in &args.set {
            let (key, value) = parse_assignment(raw)?;
            check_value(&key, &value)?;
            tracing::info!("Setting {} to {}", key, value);
            ctx.config.set(key, value);
        }

        // Catch a bad game before it's written
        ctx.config.variant()?;
        ctx.manager.save(&ctx.config)?;
        tracing::info!("Saved {}", ctx.manager.rc_path());
    }

    let json = serde_json::to_string_pretty(&ctx.config.effective_values()).context("Failed to format config")?;
    println!("{json}");

    Ok(BatchSummary::default())
}
