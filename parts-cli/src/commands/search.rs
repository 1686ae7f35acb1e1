//! `parts search`: what settings search may index.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use parts_core::profile;
use parts_sync::search::{indexable_screens, non_indexable_keys};
use parts_sync::PackagesList;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// `packages.list` file; defaults to the profile's path.
    #[arg(long)]
    pub packages: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let device = profile::load_at(&home).context("failed to load device profile")?;
        let list_path = self
            .packages
            .unwrap_or_else(|| device.search.packages_list.clone());
        let packages = PackagesList::load(&list_path)
            .with_context(|| format!("failed to read {}", list_path.display()))?;

        let hidden = non_indexable_keys(&device, &packages);
        let screens = indexable_screens(&device);

        if self.json {
            let payload = serde_json::json!({
                "indexable_screens": screens,
                "non_indexable_keys": hidden,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render search JSON")?
            );
            return Ok(());
        }

        println!("indexable screens: {}", join_or_none(screens.iter().map(|s| s.to_string())));
        println!(
            "hidden keys: {}",
            join_or_none(hidden.iter().map(|k| k.to_string()))
        );
        Ok(())
    }
}

fn join_or_none(items: impl Iterator<Item = String>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}
