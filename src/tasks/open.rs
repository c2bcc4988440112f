use super::{BatchSummary, TaskContext};
use crate::cli::OpenArgs;
use crate::services::item_cfg;
use anyhow::{Context, Result, bail};

/// Steam client URL of a Workshop item page.
pub fn item_url(published_id: &str) -> String {
    format!("steam://url/CommunityFilePage/{published_id}")
}

/// Open a Workshop item page in the Steam client.
pub fn open_item(published_id: &str) -> Result<()> {
    let url = item_url(published_id);
    tracing::info!("Opening {}", url);
    webbrowser::open(&url).with_context(|| format!("Failed to open {url}"))
}

pub fn run(ctx: &TaskContext, args: &OpenArgs) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    let (label, id) = match (&args.id, &args.name) {
        (Some(id), _) => (id.clone(), id.clone()),
        (None, Some(name)) => {
            let cfg_path = ctx.locator()?.cfg_path(name);
            let text = item_cfg::read(&cfg_path)?;
            let Some(id) = item_cfg::published_id(&text) else {
                bail!("Mod \"{name}\" has no published id in {cfg_path}");
            };
            (name.clone(), id)
        }
        (None, None) => bail!("Give a mod name or --id"),
    };

    match open_item(&id) {
        Ok(()) => summary.success(label),
        Err(e) => summary.failure(label, format!("{e:#}")),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_url() {
        assert_eq!(item_url("123456"), "steam://url/CommunityFilePage/123456");
    }
}
