//! `parts show`: the button settings screen as the user would see it.
//!
//! Read-only: the screen is built against detached copies of the preference
//! store and the pending choices, so nothing under `~/.parts` is written.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use parts_sync::{ControlKind, NoService, PendingChoices, SyncEngine};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Tabled)]
struct ControlRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "enabled")]
    enabled: &'static str,
    #[tabled(rename = "value")]
    value: String,
    #[tabled(rename = "node")]
    node: String,
}

impl ShowArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let (device, prefs) = super::load_device(&home)?;
        let saved_at = prefs.saved_at();
        let pending =
            PendingChoices::load_at(&home).context("failed to load pending choices")?;
        let mut engine = SyncEngine::new(device, prefs.detached(), std::sync::Arc::new(NoService))
            .with_pending(pending.detached());
        let mut screen = engine.open_screen();
        engine.resume(&mut screen);

        let rows: Vec<ControlRow> = screen
            .iter()
            .map(|c| ControlRow {
                key: c.key.to_string(),
                kind: match c.kind {
                    ControlKind::Switch => "switch",
                    ControlKind::Text => "list",
                },
                enabled: super::yes_no(c.enabled),
                value: c
                    .current_value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                node: engine
                    .profile()
                    .bound_node(&c.key)
                    .map(|(n, _)| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to render controls JSON")?
            );
        } else {
            println!("{}", Table::new(rows).with(Style::rounded()));
            match saved_at {
                Some(at) => println!("preferences saved {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("preferences never saved"),
            }
        }
        Ok(())
    }
}
