//! Boot restore: one-shot sequence run when the device finishes booting.
//!
//! 1. No button presence node → hide the button settings entry point, stop.
//! 2. Otherwise show it, push every bound preference to its node, and run
//!    the pocket-mode decision.

use parts_core::profile::NodeKind;
use parts_core::{DeviceProfile, NodePath, PrefKey, PrefValue, PreferenceStore};

use crate::components::{ComponentSwitch, BUTTON_SETTINGS};
use crate::node;
use crate::pocket::{PocketAction, PocketModeController};
use crate::search::has_button_nodes;
use crate::service::ServiceControl;

/// One preference pushed to its node at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub key: PrefKey,
    pub node: NodePath,
    pub value: PrefValue,
    pub written: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BootReport {
    pub button_nodes_present: bool,
    pub entry_point_enabled: bool,
    pub restored: Vec<RestoreOutcome>,
    /// `None` when the sequence stopped before the pocket decision.
    pub pocket: Option<PocketAction>,
}

impl BootReport {
    pub fn failed_writes(&self) -> impl Iterator<Item = &RestoreOutcome> {
        self.restored.iter().filter(|r| !r.written)
    }
}

/// Push stored (or default) values to every bound node.
///
/// String keys with neither a stored value nor a default are skipped. Write
/// failures are logged and recorded; the remaining keys are still restored.
pub fn restore_saved_preferences(
    profile: &DeviceProfile,
    prefs: &PreferenceStore,
) -> Vec<RestoreOutcome> {
    let mut outcomes = Vec::new();
    let bound = profile
        .buttons
        .boolean_nodes
        .iter()
        .map(|(k, n)| (k, n, NodeKind::Boolean))
        .chain(
            profile
                .buttons
                .string_nodes
                .iter()
                .map(|(k, n)| (k, n, NodeKind::Text)),
        );

    for (key, path, kind) in bound {
        let value = match kind {
            NodeKind::Boolean => PrefValue::Bool(prefs.get_bool_or_default(profile, key)),
            NodeKind::Text => match prefs.get_string_or_default(profile, key) {
                Some(s) => PrefValue::Text(s),
                None => {
                    tracing::debug!("'{key}' has no value to restore");
                    continue;
                }
            },
        };
        let written = node::write_line(path.as_path(), &value.node_token());
        if !written {
            tracing::warn!("boot restore of '{key}' to {path} failed");
        }
        outcomes.push(RestoreOutcome {
            key: key.clone(),
            node: path.clone(),
            value,
            written,
        });
    }
    outcomes
}

/// Run the boot sequence. Nothing here is fatal: failures are logged and
/// reflected in the report.
pub fn on_boot(
    profile: &DeviceProfile,
    prefs: &PreferenceStore,
    components: &mut dyn ComponentSwitch,
    service: &dyn ServiceControl,
) -> BootReport {
    if !has_button_nodes(profile) {
        tracing::info!("no button nodes on {}; hiding {BUTTON_SETTINGS}", profile.device);
        if let Err(err) = components.set_enabled(BUTTON_SETTINGS, false) {
            tracing::warn!("failed to disable {BUTTON_SETTINGS}: {err}");
        }
        return BootReport {
            button_nodes_present: false,
            entry_point_enabled: components.is_enabled(BUTTON_SETTINGS),
            ..BootReport::default()
        };
    }

    if !components.is_enabled(BUTTON_SETTINGS) {
        if let Err(err) = components.set_enabled(BUTTON_SETTINGS, true) {
            tracing::warn!("failed to enable {BUTTON_SETTINGS}: {err}");
        }
    }

    let restored = restore_saved_preferences(profile, prefs);
    let pocket = PocketModeController::from_profile(profile).apply(prefs, service);
    tracing::info!(
        "boot restore: {} node(s), {} failed, pocket mode {pocket:?}",
        restored.len(),
        restored.iter().filter(|r| !r.written).count()
    );

    BootReport {
        button_nodes_present: true,
        entry_point_enabled: components.is_enabled(BUTTON_SETTINGS),
        restored,
        pocket: Some(pocket),
    }
}
