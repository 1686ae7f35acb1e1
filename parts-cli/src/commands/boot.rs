//! `parts boot`: the boot-completed sequence.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use parts_sync::{on_boot, resolver, ComponentStore};

#[derive(Args, Debug)]
pub struct BootArgs {
    /// Do not contact the service daemon.
    #[arg(long)]
    pub no_service: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl BootArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let (device, prefs) = super::load_device(&home)?;
        let mut components =
            ComponentStore::load_at(&home).context("failed to load component state")?;
        let service = super::service_control(&home, self.no_service);

        // A reboot ends the settings session.
        resolver::clear_at(&home).context("failed to clear pending choices")?;
        let report = on_boot(&device, &prefs, &mut components, service.as_ref());

        if self.json {
            let restored: Vec<_> = report
                .restored
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "key": r.key,
                        "node": r.node,
                        "value": r.value,
                        "written": r.written,
                    })
                })
                .collect();
            let payload = serde_json::json!({
                "button_nodes_present": report.button_nodes_present,
                "entry_point_enabled": report.entry_point_enabled,
                "restored": restored,
                "pocket": report.pocket.map(|a| format!("{a:?}").to_lowercase()),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render boot JSON")?
            );
            return Ok(());
        }

        if !report.button_nodes_present {
            println!("no button nodes found; button settings hidden");
            return Ok(());
        }
        for r in &report.restored {
            let mark = if r.written { "✓".green() } else { "✗".red() };
            println!("{mark} {} = {} → {}", r.key, r.value, r.node);
        }
        if let Some(action) = report.pocket {
            println!("pocket mode: {action:?}");
        }
        Ok(())
    }
}
