pub mod boot;
pub mod daemon;
pub mod doze;
pub mod init;
pub mod key;
pub mod pocket;
pub mod search;
pub mod set;
pub mod show;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use parts_core::{profile, DeviceProfile, PrefValue, PreferenceStore};
use parts_daemon::SocketServiceControl;
use parts_sync::{ControlKind, NoService, ServiceControl};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Profile + preference store for `home`.
pub(crate) fn load_device(home: &Path) -> Result<(DeviceProfile, PreferenceStore)> {
    let device = profile::load_at(home).context("failed to load device profile")?;
    let prefs = PreferenceStore::open_at(home).context("failed to open preference store")?;
    Ok((device, prefs))
}

/// Start/stop requests go to the daemon unless `--no-service` was given.
pub(crate) fn service_control(home: &Path, no_service: bool) -> Arc<dyn ServiceControl> {
    if no_service {
        Arc::new(NoService)
    } else {
        Arc::new(SocketServiceControl::new(home))
    }
}

pub(crate) fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => bail!("expected true/false, got '{other}'"),
    }
}

pub(crate) fn parse_value(kind: ControlKind, raw: &str) -> Result<PrefValue> {
    Ok(match kind {
        ControlKind::Switch => PrefValue::Bool(parse_bool(raw)?),
        ControlKind::Text => PrefValue::Text(raw.to_string()),
    })
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
