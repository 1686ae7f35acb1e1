//! Per-device YAML profile: the static configuration tables.
//!
//! # Storage layout
//!
//! ```text
//! ~/.parts/
//!   profile.yaml      (device tables: mode 0600, created by `parts init`)
//!   prefs.json        (preference store, see [`crate::prefs`])
//!   components.json   (UI entry-point enable state)
//!   run/parts.sock    (service daemon socket)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DependencyBinding, NodePath, PrefKey, PrefValue};

/// Current on-disk profile schema version.
pub const PROFILE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// 1. Profile tables
// ---------------------------------------------------------------------------

/// Root of `profile.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub version: u32,
    pub device: String,
    #[serde(default)]
    pub buttons: ButtonsSection,
    #[serde(default)]
    pub pocket: PocketSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub keys: KeysSection,
    #[serde(default)]
    pub doze: DozeSection,
    /// Default values used when a preference has never been stored.
    #[serde(default)]
    pub defaults: BTreeMap<PrefKey, PrefValue>,
}

/// Button panel bindings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonsSection {
    /// Switch preferences mirrored to a `1`/`0` node.
    #[serde(default)]
    pub boolean_nodes: BTreeMap<PrefKey, NodePath>,
    /// List preferences mirrored verbatim to a node.
    #[serde(default)]
    pub string_nodes: BTreeMap<PrefKey, NodePath>,
    /// Controls only enabled while another node holds a required value.
    #[serde(default)]
    pub dependencies: BTreeMap<PrefKey, DependencyBinding>,
    /// If none of these nodes exist the button panel is hidden at boot.
    #[serde(default)]
    pub presence_nodes: Vec<NodePath>,
}

/// Pocket-mode controller inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocketSection {
    pub wakeup_key: PrefKey,
    pub pocket_mode_key: PrefKey,
    /// Companion package that hosts the proximity service.
    pub package: String,
    /// Node the service checks before arming the proximity gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wakeup_node: Option<NodePath>,
}

impl Default for PocketSection {
    fn default() -> Self {
        Self {
            wakeup_key: PrefKey::from("fp_wakeup"),
            pocket_mode_key: PrefKey::from("fp_pocketmode"),
            package: "org.lineageos.pocketmode".to_string(),
            wakeup_node: None,
        }
    }
}

/// Search-index provider inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSection {
    /// Keys hidden from search when no button presence node exists.
    #[serde(default)]
    pub node_gated_keys: Vec<PrefKey>,
    /// `packages.list`-format file listing installed packages.
    pub packages_list: PathBuf,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            node_gated_keys: vec![],
            packages_list: PathBuf::from("/data/system/packages.list"),
        }
    }
}

/// Where the "virtual keys enabled" toggle is read from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VirtualKeySource {
    /// The capacitive key-disabler node (hardware-manager style).
    #[default]
    KeyDisabler,
    /// A boolean preference (Lineage-settings style).
    Preference { key: PrefKey },
}

/// Key handler and touch-panel nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp_home_node: Option<NodePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_disabler_node: Option<NodePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_swapper_node: Option<NodePath>,
    #[serde(default = "default_fp_home_scan_code")]
    pub fp_home_scan_code: u16,
    #[serde(default = "default_mechanical_home_scan_code")]
    pub mechanical_home_scan_code: u16,
    #[serde(default)]
    pub virtual_keys: VirtualKeySource,
}

fn default_fp_home_scan_code() -> u16 {
    96
}

fn default_mechanical_home_scan_code() -> u16 {
    102
}

impl Default for KeysSection {
    fn default() -> Self {
        Self {
            fp_home_node: None,
            key_disabler_node: None,
            key_swapper_node: None,
            fp_home_scan_code: default_fp_home_scan_code(),
            mechanical_home_scan_code: default_mechanical_home_scan_code(),
            virtual_keys: VirtualKeySource::default(),
        }
    }
}

/// Ambient display gesture keys and capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DozeSection {
    pub enabled_key: PrefKey,
    pub always_on_key: PrefKey,
    pub pick_up_key: PrefKey,
    pub hand_wave_key: PrefKey,
    pub pocket_key: PrefKey,
    #[serde(default = "yes")]
    pub always_on_available: bool,
    #[serde(default = "yes")]
    pub proximity_check_before_pulse: bool,
}

fn yes() -> bool {
    true
}

impl Default for DozeSection {
    fn default() -> Self {
        Self {
            enabled_key: PrefKey::from("doze_enable"),
            always_on_key: PrefKey::from("always_on_display"),
            pick_up_key: PrefKey::from("gesture_pick_up"),
            hand_wave_key: PrefKey::from("gesture_hand_wave"),
            pocket_key: PrefKey::from("gesture_pocket"),
            always_on_available: true,
            proximity_check_before_pulse: true,
        }
    }
}

/// How a preference is mirrored to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Boolean,
    Text,
}

impl DeviceProfile {
    /// Tables for the Xiaomi msm8996 family (fpc1020 fingerprint sensor,
    /// capacitive touch keys).
    pub fn builtin() -> Self {
        let fpc = "/sys/devices/soc/soc:fpc_fpc1020";
        let home_node = NodePath::from(format!("{fpc}/enable_key_events").as_str());
        let wakeup_node = NodePath::from(format!("{fpc}/enable_wakeup").as_str());
        let swap_node = NodePath::from("/proc/touchpanel/reversed_keys_enable");

        let mut boolean_nodes = BTreeMap::new();
        boolean_nodes.insert(PrefKey::from("fp_home"), home_node.clone());
        boolean_nodes.insert(PrefKey::from("fp_wakeup"), wakeup_node.clone());
        boolean_nodes.insert(PrefKey::from("button_swap"), swap_node.clone());

        let mut dependencies = BTreeMap::new();
        dependencies.insert(
            PrefKey::from("fp_pocketmode"),
            DependencyBinding {
                node: wakeup_node.clone(),
                required: "1".to_string(),
            },
        );

        let mut defaults = BTreeMap::new();
        for key in ["fp_home", "fp_wakeup", "fp_pocketmode", "button_swap"] {
            defaults.insert(PrefKey::from(key), PrefValue::Bool(false));
        }

        Self {
            version: PROFILE_VERSION,
            device: "msm8996".to_string(),
            buttons: ButtonsSection {
                boolean_nodes,
                string_nodes: BTreeMap::new(),
                dependencies,
                presence_nodes: vec![home_node.clone(), wakeup_node.clone()],
            },
            pocket: PocketSection {
                wakeup_node: Some(wakeup_node),
                ..PocketSection::default()
            },
            search: SearchSection {
                node_gated_keys: vec![PrefKey::from("fp_home"), PrefKey::from("fp_wakeup")],
                ..SearchSection::default()
            },
            keys: KeysSection {
                fp_home_node: Some(home_node),
                key_disabler_node: Some(NodePath::from("/proc/touchpanel/capacitive_keys_enable")),
                key_swapper_node: Some(swap_node),
                ..KeysSection::default()
            },
            doze: DozeSection::default(),
            defaults,
        }
    }

    /// The node bound to `key`, if any, and how values are mirrored to it.
    pub fn bound_node(&self, key: &PrefKey) -> Option<(&NodePath, NodeKind)> {
        if let Some(node) = self.buttons.boolean_nodes.get(key) {
            return Some((node, NodeKind::Boolean));
        }
        self.buttons
            .string_nodes
            .get(key)
            .map(|node| (node, NodeKind::Text))
    }

    /// Dependent keys gated on `node`, in key order.
    pub fn dependents_of(&self, node: &NodePath) -> Vec<&PrefKey> {
        self.buttons
            .dependencies
            .iter()
            .filter(|(_, dep)| &dep.node == node)
            .map(|(key, _)| key)
            .collect()
    }

    /// Profile default for a switch; `false` when the table has none.
    pub fn default_bool(&self, key: &PrefKey) -> bool {
        self.defaults
            .get(key)
            .and_then(PrefValue::as_bool)
            .unwrap_or(false)
    }

    /// Profile default for a list preference.
    pub fn default_string(&self, key: &PrefKey) -> Option<&str> {
        self.defaults.get(key).and_then(PrefValue::as_text)
    }

    /// Reject tables that contradict each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != PROFILE_VERSION {
            return Err(ConfigError::InvalidProfile(format!(
                "unsupported profile version {} (expected {PROFILE_VERSION})",
                self.version
            )));
        }

        let boolean: BTreeSet<_> = self.buttons.boolean_nodes.keys().collect();
        if let Some(key) = self
            .buttons
            .string_nodes
            .keys()
            .find(|key| boolean.contains(key))
        {
            return Err(ConfigError::InvalidProfile(format!(
                "key '{key}' is bound as both a boolean and a string node"
            )));
        }

        if let Some(key) = self
            .buttons
            .dependencies
            .keys()
            .find(|key| self.buttons.string_nodes.contains_key(*key))
        {
            return Err(ConfigError::InvalidProfile(format!(
                "dependency key '{key}' must be a switch, not a string node"
            )));
        }

        for (key, value) in &self.defaults {
            let mismatched = match self.bound_node(key) {
                Some((_, NodeKind::Boolean)) => value.as_bool().is_none(),
                Some((_, NodeKind::Text)) => value.as_text().is_none(),
                None => false,
            };
            if mismatched {
                return Err(ConfigError::InvalidProfile(format!(
                    "default for '{key}' does not match its node kind"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.parts/`: pure, no I/O.
pub fn parts_root_at(home: &Path) -> PathBuf {
    home.join(".parts")
}

/// `<home>/.parts/profile.yaml`: pure, no I/O.
pub fn profile_path_at(home: &Path) -> PathBuf {
    parts_root_at(home).join("profile.yaml")
}

/// Creates `<home>/.parts/` (mode `0700`) if it does not yet exist.
pub fn ensure_root_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = parts_root_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.parts/profile.yaml`.
///
/// Returns `ConfigError::ProfileNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<DeviceProfile, ConfigError> {
    let path = profile_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ProfileNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let profile: DeviceProfile =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    profile.validate()?;
    Ok(profile)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<DeviceProfile, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the profile to `<home>/.parts/profile.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, profile: &DeviceProfile) -> Result<(), ConfigError> {
    profile.validate()?;
    ensure_root_at(home)?;
    let path = profile_path_at(home);
    let tmp_path = path.with_file_name("profile.yaml.tmp");

    let yaml = serde_yaml::to_string(profile)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(profile: &DeviceProfile) -> Result<(), ConfigError> {
    save_at(&home()?, profile)
}

// ---------------------------------------------------------------------------
// 5. Init
// ---------------------------------------------------------------------------

/// Write the built-in profile unless one already exists.
///
/// Idempotent: an existing profile is loaded and returned unchanged unless
/// `force` is set.
pub fn init_at(home: &Path, force: bool) -> Result<DeviceProfile, ConfigError> {
    if profile_path_at(home).exists() && !force {
        return load_at(home);
    }
    let profile = DeviceProfile::builtin();
    save_at(home, &profile)?;
    Ok(profile)
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<DeviceProfile, ConfigError> {
    init_at(&home()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
pub(crate) fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
