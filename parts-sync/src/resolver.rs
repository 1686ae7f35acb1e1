//! Dependency resolver: gates a control on another node's value and
//! restores the user's choice when the control comes back.
//!
//! State machine per dependent key:
//!
//! ```text
//!   Enabled ──(node != required)──▶ Disabled { pending: checked before? }
//!   Disabled ──(node == required)──▶ Enabled   (restore snapshot if it differs)
//!   Disabled ──(node != required)──▶ Disabled  (ensure disabled + unchecked)
//! ```
//!
//! Pending choices outlive a single settings session: a store opened with
//! [`PendingChoices::beside`] is kept in `<home>/.parts/run/pending.json`
//! and rewritten on every change. `parts boot` clears it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parts_core::{DependencyBinding, DeviceProfile, PrefKey, PreferenceStore};

use crate::engine::Control;
use crate::error::{io_err, SyncError};
use crate::node;

/// A user's last explicit choice captured while the control was disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub prior_value: bool,
    pub pending_restore: bool,
}

/// On-disk pending choices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingFile {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub choices: BTreeMap<PrefKey, PendingChoice>,
}

/// `<dir of prefs_file>/run/pending.json`
pub fn store_path_for(prefs_file: &Path) -> PathBuf {
    prefs_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("run")
        .join("pending.json")
}

/// `<home>/.parts/run/pending.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    store_path_for(&parts_core::prefs::store_path_at(home))
}

/// Drop every pending choice under `home`. A missing file is not an error.
pub fn clear_at(home: &Path) -> Result<(), SyncError> {
    let path = store_path_at(home);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::debug!("cleared pending choices at {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(&path, e)),
    }
}

/// Pending choices, at most one snapshot per key.
#[derive(Debug, Default)]
pub struct PendingChoices {
    path: Option<PathBuf>,
    inner: Mutex<BTreeMap<PrefKey, PendingChoice>>,
}

impl PendingChoices {
    /// In-memory only; lives as long as the value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the session file at `path`; a missing file is empty.
    pub fn load_file(path: PathBuf) -> Result<Self, SyncError> {
        let choices = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let file: PendingFile = serde_json::from_str(&contents)?;
            file.choices
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            inner: Mutex::new(choices),
        })
    }

    pub fn load_at(home: &Path) -> Result<Self, SyncError> {
        Self::load_file(store_path_at(home))
    }

    /// The session file that belongs to `prefs`. An in-memory store gets
    /// in-memory choices; an unreadable file starts an empty session.
    pub fn beside(prefs: &PreferenceStore) -> Self {
        let Some(prefs_file) = prefs.path() else {
            return Self::new();
        };
        let path = store_path_for(prefs_file);
        match Self::load_file(path.clone()) {
            Ok(choices) => choices,
            Err(err) => {
                tracing::warn!("discarding pending choices: {err}");
                Self {
                    path: Some(path),
                    inner: Mutex::new(BTreeMap::new()),
                }
            }
        }
    }

    /// Same choices, never written back.
    pub fn detached(self) -> Self {
        Self {
            path: None,
            inner: Mutex::new(
                self.inner
                    .into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            ),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &PrefKey) -> Option<PendingChoice> {
        self.lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PrefKey, PendingChoice>> {
        // A panic mid-reconcile leaves at worst a stale snapshot.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist `choices`; the caller holds the lock.
    fn save(&self, choices: &BTreeMap<PrefKey, PendingChoice>) -> Result<(), SyncError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if choices.is_empty() {
            return match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_err(path, e)),
            };
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let file = PendingFile {
            updated_at: Utc::now(),
            choices: choices.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

/// Where a dependent control ended up after [`DependencyResolver::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Enabled,
    Disabled { pending: bool },
}

#[derive(Debug)]
pub struct DependencyResolver {
    bindings: BTreeMap<PrefKey, DependencyBinding>,
    pending: PendingChoices,
}

impl DependencyResolver {
    pub fn new(bindings: BTreeMap<PrefKey, DependencyBinding>) -> Self {
        Self::with_pending(bindings, PendingChoices::new())
    }

    pub fn with_pending(
        bindings: BTreeMap<PrefKey, DependencyBinding>,
        pending: PendingChoices,
    ) -> Self {
        Self { bindings, pending }
    }

    pub fn from_profile(profile: &DeviceProfile) -> Self {
        Self::new(profile.buttons.dependencies.clone())
    }

    pub fn bindings(&self) -> &BTreeMap<PrefKey, DependencyBinding> {
        &self.bindings
    }

    pub fn pending(&self) -> &PendingChoices {
        &self.pending
    }

    pub(crate) fn replace_pending(&mut self, pending: PendingChoices) {
        self.pending = pending;
    }

    /// Whether `key`'s control should be enabled, from its dependency node.
    ///
    /// `None` when the key has no binding or the node cannot be read; the
    /// caller must then leave the control's enabled state as it is.
    pub fn resolve(&self, key: &PrefKey) -> Option<bool> {
        let dep = self.bindings.get(key)?;
        let path = dep.node.as_path();
        if !node::is_readable(path) {
            tracing::debug!("dependency node {} unreadable; keeping '{key}' as is", dep.node);
            return None;
        }
        match node::read_line(path) {
            Ok(value) => Some(value == dep.required),
            Err(err) => {
                tracing::warn!("dependency of '{key}': {err}");
                None
            }
        }
    }

    /// Drive `control` to `enabled`, snapshotting or restoring the user's
    /// choice. Holds the pending-choice lock for the whole transition,
    /// including the session file write.
    ///
    /// Forced checked-state changes are persisted to `prefs` the way a switch
    /// persists its own state; they are not written to any node.
    pub fn reconcile(
        &self,
        key: &PrefKey,
        enabled: bool,
        control: &mut Control,
        prefs: &mut PreferenceStore,
    ) -> DependencyState {
        let mut pending = self.pending.lock();
        let stored = prefs.get_bool(key, false);

        if enabled {
            control.enabled = true;
            control.checked = stored;
            if let Some(choice) = pending.remove(key) {
                if choice.pending_restore && choice.prior_value != stored {
                    tracing::info!("restoring '{key}' to {}", choice.prior_value);
                    control.checked = choice.prior_value;
                    persist(prefs, key, choice.prior_value);
                }
                self.save_locked(&pending);
            }
            return DependencyState::Enabled;
        }

        if control.enabled && control.checked {
            pending.insert(
                key.clone(),
                PendingChoice {
                    prior_value: true,
                    pending_restore: true,
                },
            );
            self.save_locked(&pending);
        }
        control.enabled = false;
        control.checked = false;
        if stored {
            persist(prefs, key, false);
        }

        DependencyState::Disabled {
            pending: pending.get(key).is_some_and(|c| c.pending_restore),
        }
    }

    fn save_locked(&self, choices: &BTreeMap<PrefKey, PendingChoice>) {
        if let Err(err) = self.pending.save(choices) {
            tracing::warn!("failed to save pending choices: {err}");
        }
    }
}

fn persist(prefs: &mut PreferenceStore, key: &PrefKey, value: bool) {
    if let Err(err) = prefs.set_bool(key, value) {
        tracing::warn!("failed to persist '{key}': {err}");
    }
}
