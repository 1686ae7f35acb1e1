//! `parts pocket`: the pocket-mode decision.

use anyhow::{Context, Result};
use clap::Args;

use parts_sync::PocketModeController;

#[derive(Args, Debug)]
pub struct PocketArgs {
    /// Deliver the start/stop request.
    #[arg(long)]
    pub apply: bool,

    /// Do not contact the service daemon.
    #[arg(long)]
    pub no_service: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PocketArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let (device, prefs) = super::load_device(&home)?;
        let controller = PocketModeController::from_profile(&device);
        let should_run = controller.decide(&prefs);

        let action = if self.apply {
            let service = super::service_control(&home, self.no_service);
            Some(controller.apply(&prefs, service.as_ref()))
        } else {
            None
        };

        if self.json {
            let payload = serde_json::json!({
                "wakeup": prefs.get_bool(&device.pocket.wakeup_key, false),
                "pocket_mode": prefs.get_bool(&device.pocket.pocket_mode_key, false),
                "should_run": should_run,
                "applied": action.map(|a| format!("{a:?}").to_lowercase()),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render pocket JSON")?
            );
            return Ok(());
        }

        println!(
            "pocket mode service should {}",
            if should_run { "run" } else { "be stopped" }
        );
        if let Some(action) = action {
            println!("requested: {action:?}");
        }
        Ok(())
    }
}
