//! `parts key`: HOME key decisions and the touch-panel key nodes.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use parts_sync::keys::{KeyDisabler, KeyEvent, KeySwapper, KEYCODE_HOME};
use parts_sync::{KeyDisposition, KeyHandler, ScreenState};

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Run one key event through the handler.
    Event(KeyEventArgs),
    /// Show or set the back/recents key swap.
    Swap(ToggleArgs),
    /// Show or set the capacitive key disabler.
    Disable(ToggleArgs),
}

#[derive(Args, Debug)]
pub struct KeyEventArgs {
    /// Hardware scan code (96 fingerprint, 102 mechanical home).
    pub scan_code: u16,

    /// Android key code; HOME by default.
    #[arg(long, default_value_t = KEYCODE_HOME)]
    pub key_code: u16,

    /// Treat the screen as off.
    #[arg(long)]
    pub screen_off: bool,

    /// Treat user setup as not yet complete.
    #[arg(long)]
    pub setup_incomplete: bool,
}

#[derive(Args, Debug)]
pub struct ToggleArgs {
    /// `on`/`off`; omit to print the current state.
    pub value: Option<String>,
}

pub fn run(command: KeyCommand) -> Result<()> {
    let home = super::home()?;
    let (device, prefs) = super::load_device(&home)?;

    match command {
        KeyCommand::Event(args) => {
            let handler = KeyHandler::from_profile(&device);
            let screen = ScreenState::default();
            if args.screen_off {
                screen.screen_off();
            }
            let ctx = handler.context(!args.setup_incomplete, &screen, &prefs);
            let event = KeyEvent {
                key_code: args.key_code,
                scan_code: args.scan_code,
            };
            match handler.handle(event, &ctx) {
                KeyDisposition::Consumed => println!("consumed"),
                KeyDisposition::PassThrough => println!("pass-through"),
            }
        }
        KeyCommand::Swap(args) => {
            let Some(swapper) = KeySwapper::from_profile(&device) else {
                bail!("profile '{}' has no key swapper node", device.device);
            };
            if let Some(raw) = args.value {
                let enabled = super::parse_bool(&raw)?;
                if !swapper
                    .set_enabled(enabled)
                    .context("failed to write key swapper node")?
                {
                    bail!("key swap is not supported on this device");
                }
            }
            if swapper.is_supported() {
                println!("key swap: {}", on_off(swapper.is_enabled()));
            } else {
                println!("key swap: unsupported");
            }
        }
        KeyCommand::Disable(args) => {
            let Some(disabler) = KeyDisabler::from_profile(&device) else {
                bail!("profile '{}' has no key disabler node", device.device);
            };
            if let Some(raw) = args.value {
                let enabled = super::parse_bool(&raw)?;
                disabler
                    .set_enabled(enabled)
                    .context("failed to write key disabler node")?;
            }
            println!("capacitive keys disabled: {}", on_off(disabler.is_enabled()));
        }
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
