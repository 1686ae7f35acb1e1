//! In-memory service state hosted by the daemon.

use serde::Serialize;

use parts_sync::Service;

/// Pocket-mode proximity gate.
///
/// The screen listener is registered by `proximity_toggle(true)`; while it
/// is registered, a screen-off arms the proximity gate provided fingerprint
/// wakeup is on, and a screen-on disarms it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PocketModeService {
    pub running: bool,
    pub screen_listener: bool,
    pub proximity_armed: bool,
}

impl PocketModeService {
    /// Idempotent.
    pub fn start(&mut self) -> bool {
        let changed = !self.running;
        self.running = true;
        changed
    }

    /// Idempotent. Drops the listener and disarms.
    pub fn stop(&mut self) -> bool {
        let changed = self.running;
        *self = Self::default();
        changed
    }

    pub fn proximity_toggle(&mut self, enabled: bool) {
        if !self.running {
            tracing::debug!("proximity toggle ignored; pocket mode not running");
            return;
        }
        self.screen_listener = enabled;
        if !enabled {
            self.proximity_armed = false;
        }
    }

    /// `wakeup_on` is whether the wakeup node currently reads `1`.
    pub fn screen_off(&mut self, wakeup_on: bool) {
        if self.running && self.screen_listener && wakeup_on {
            self.proximity_armed = true;
        }
    }

    pub fn screen_on(&mut self) {
        if self.screen_listener {
            self.proximity_armed = false;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DaemonState {
    pub pocket_mode: PocketModeService,
    pub doze: bool,
}

impl DaemonState {
    /// Returns whether the state changed.
    pub fn set_running(&mut self, service: Service, running: bool) -> bool {
        match (service, running) {
            (Service::PocketMode, true) => self.pocket_mode.start(),
            (Service::PocketMode, false) => self.pocket_mode.stop(),
            (Service::Doze, run) => std::mem::replace(&mut self.doze, run) != run,
        }
    }
}
