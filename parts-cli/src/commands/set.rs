//! `parts set <key> <value>`

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use parts_core::PrefKey;
use parts_sync::{ChangeResult, SyncEngine};

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Preference key, e.g. `fp_wakeup`.
    pub key: String,

    /// `true`/`false` for switches, any text for list settings.
    pub value: String,

    /// Do not contact the service daemon.
    #[arg(long)]
    pub no_service: bool,
}

impl SetArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let (device, prefs) = super::load_device(&home)?;
        let service = super::service_control(&home, self.no_service);
        let mut engine = SyncEngine::new(device, prefs, service);
        let mut screen = engine.open_screen();
        engine.resume(&mut screen);

        let key = PrefKey::from(self.key.as_str());
        let Some(control) = screen.get(&key) else {
            bail!("unknown setting '{key}'");
        };
        let value = super::parse_value(control.kind, &self.value)?;

        match engine.apply_change(&mut screen, &key, value.clone()) {
            ChangeResult::Applied => {
                println!("{} {key} = {value}", "✓".green());
                for dependent in engine.profile().buttons.dependencies.keys() {
                    if let Some(c) = screen.get(dependent) {
                        if !c.enabled {
                            println!("  {} {dependent} is now unavailable", "·".dimmed());
                        }
                    }
                }
                Ok(())
            }
            ChangeResult::Rejected { reason } => bail!("{reason}"),
            ChangeResult::WriteFailed { error } => {
                bail!("{key} saved but the node was not updated: {error}")
            }
        }
    }
}
