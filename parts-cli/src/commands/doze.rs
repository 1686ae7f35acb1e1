//! `parts doze`: ambient display switches.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use parts_core::PrefKey;
use parts_sync::{ChangeResult, DozeSettings};

#[derive(Subcommand, Debug)]
pub enum DozeCommand {
    /// Show the doze screen.
    Show,
    /// Turn the doze master switch on or off.
    Enable(EnableArgs),
    /// Toggle always-on display or a gesture.
    Set(DozeSetArgs),
}

#[derive(Args, Debug)]
pub struct EnableArgs {
    pub value: String,

    /// Do not contact the service daemon.
    #[arg(long)]
    pub no_service: bool,
}

#[derive(Args, Debug)]
pub struct DozeSetArgs {
    /// `always_on_display`, `gesture_pick_up`, `gesture_hand_wave` or `gesture_pocket`.
    pub key: String,
    pub value: String,

    /// Do not contact the service daemon.
    #[arg(long)]
    pub no_service: bool,
}

#[derive(Tabled)]
struct DozeRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "enabled")]
    enabled: &'static str,
    #[tabled(rename = "on")]
    on: &'static str,
}

pub fn run(command: DozeCommand) -> Result<()> {
    let home = super::home()?;
    let (device, mut prefs) = super::load_device(&home)?;
    let doze = DozeSettings::from_profile(&device);
    let mut screen = doze.open(&prefs);

    match command {
        DozeCommand::Show => {
            println!(
                "doze: {}",
                if doze.is_doze_enabled(&prefs) { "on" } else { "off" }
            );
            let rows: Vec<DozeRow> = screen
                .iter()
                .map(|c| DozeRow {
                    key: c.key.to_string(),
                    enabled: super::yes_no(c.enabled),
                    on: super::yes_no(c.checked),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!(
                "gesture service: {}",
                if doze.should_run_service(&prefs) {
                    "should run"
                } else {
                    "stopped"
                }
            );
        }
        DozeCommand::Enable(args) => {
            let enabled = super::parse_bool(&args.value)?;
            let service = super::service_control(&home, args.no_service);
            doze.set_doze_enabled(&mut screen, &mut prefs, enabled, service.as_ref());
            println!("doze {}", if enabled { "enabled" } else { "disabled" });
        }
        DozeCommand::Set(args) => {
            let value = super::parse_bool(&args.value)
                .with_context(|| format!("invalid value for '{}'", args.key))?;
            let service = super::service_control(&home, args.no_service);
            let key = PrefKey::from(args.key.as_str());
            match doze.set_switch(&mut screen, &mut prefs, &key, value, service.as_ref()) {
                ChangeResult::Applied => println!("{key} = {value}"),
                ChangeResult::Rejected { reason } => bail!("{reason}"),
                ChangeResult::WriteFailed { error } => bail!("{error}"),
            }
        }
    }
    Ok(())
}
