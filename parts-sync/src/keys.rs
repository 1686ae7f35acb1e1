//! Key handling: HOME-key filtering plus the touch-panel key nodes.

use std::sync::atomic::{AtomicBool, Ordering};

use parts_core::profile::VirtualKeySource;
use parts_core::{DeviceProfile, NodePath, PreferenceStore};

use crate::error::SyncError;
use crate::node;

pub const KEYCODE_HOME: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: u16,
    pub scan_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyContext {
    pub setup_complete: bool,
    pub screen_on: bool,
    pub virtual_keys_enabled: bool,
    pub fp_home_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Consumed,
    PassThrough,
}

// ---------------------------------------------------------------------------
// Screen state
// ---------------------------------------------------------------------------

/// Last screen on/off event. Starts "on".
#[derive(Debug)]
pub struct ScreenState {
    on: AtomicBool,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            on: AtomicBool::new(true),
        }
    }
}

impl ScreenState {
    pub fn screen_on(&self) {
        self.on.store(true, Ordering::SeqCst);
    }

    pub fn screen_off(&self) {
        self.on.store(false, Ordering::SeqCst);
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Touch-panel nodes
// ---------------------------------------------------------------------------

/// Capacitive key disabler. The node holds `0` while the keys are disabled.
#[derive(Debug, Clone)]
pub struct KeyDisabler {
    node: NodePath,
}

impl KeyDisabler {
    pub fn new(node: NodePath) -> Self {
        Self { node }
    }

    /// `None` when the profile has no disabler node.
    pub fn from_profile(profile: &DeviceProfile) -> Option<Self> {
        profile.keys.key_disabler_node.clone().map(Self::new)
    }

    /// `true` when the disabler is active; unreadable counts as inactive.
    pub fn is_enabled(&self) -> bool {
        match node::read_line(self.node.as_path()) {
            Ok(value) => value == "0",
            Err(err) => {
                tracing::warn!("{err}");
                false
            }
        }
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        node::try_write_line(self.node.as_path(), if enabled { "0" } else { "1" })
    }
}

/// Swaps the capacitive back and recents keys.
#[derive(Debug, Clone)]
pub struct KeySwapper {
    node: NodePath,
}

impl KeySwapper {
    pub fn new(node: NodePath) -> Self {
        Self { node }
    }

    /// `None` when the profile has no swapper node.
    pub fn from_profile(profile: &DeviceProfile) -> Option<Self> {
        profile.keys.key_swapper_node.clone().map(Self::new)
    }

    pub fn is_supported(&self) -> bool {
        node::exists(self.node.as_path())
    }

    pub fn is_enabled(&self) -> bool {
        self.is_supported() && node::is_set(self.node.as_path())
    }

    /// Unsupported hardware reports `Ok(false)` and writes nothing.
    pub fn set_enabled(&self, enabled: bool) -> Result<bool, SyncError> {
        if !self.is_supported() {
            return Ok(false);
        }
        node::try_write_line(self.node.as_path(), if enabled { "1" } else { "0" })?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KeyHandler {
    fp_home_scan_code: u16,
    mechanical_home_scan_code: u16,
    fp_home_node: Option<NodePath>,
    key_disabler: Option<KeyDisabler>,
    virtual_keys: VirtualKeySource,
}

impl KeyHandler {
    pub fn from_profile(profile: &DeviceProfile) -> Self {
        let keys = &profile.keys;
        Self {
            fp_home_scan_code: keys.fp_home_scan_code,
            mechanical_home_scan_code: keys.mechanical_home_scan_code,
            fp_home_node: keys.fp_home_node.clone(),
            key_disabler: KeyDisabler::from_profile(profile),
            virtual_keys: keys.virtual_keys.clone(),
        }
    }

    /// Gather the live inputs for [`KeyHandler::handle`].
    pub fn context(
        &self,
        setup_complete: bool,
        screen: &ScreenState,
        prefs: &PreferenceStore,
    ) -> KeyContext {
        let virtual_keys_enabled = match &self.virtual_keys {
            VirtualKeySource::KeyDisabler => {
                self.key_disabler.as_ref().is_some_and(KeyDisabler::is_enabled)
            }
            VirtualKeySource::Preference { key } => prefs.get_bool(key, false),
        };
        KeyContext {
            setup_complete,
            screen_on: screen.is_on(),
            virtual_keys_enabled,
            fp_home_enabled: self
                .fp_home_node
                .as_ref()
                .is_some_and(|n| node::is_set(n.as_path())),
        }
    }

    pub fn handle(&self, event: KeyEvent, ctx: &KeyContext) -> KeyDisposition {
        if !ctx.setup_complete || event.key_code != KEYCODE_HOME {
            return KeyDisposition::PassThrough;
        }
        let consume = if event.scan_code == self.fp_home_scan_code {
            ctx.virtual_keys_enabled
        } else if event.scan_code == self.mechanical_home_scan_code {
            ctx.screen_on && (ctx.virtual_keys_enabled || ctx.fp_home_enabled)
        } else {
            false
        };
        if consume {
            tracing::debug!("HOME scan code {} consumed", event.scan_code);
            KeyDisposition::Consumed
        } else {
            KeyDisposition::PassThrough
        }
    }
}
