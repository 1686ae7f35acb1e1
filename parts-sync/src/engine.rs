//! Sync engine: keeps the button settings screen, the preference store and
//! the bound nodes consistent.
//!
//! ## Lifecycle
//!
//! 1. [`SyncEngine::open_screen`] pulls node state into controls.
//! 2. [`SyncEngine::resume`] reconciles dependency-gated controls.
//! 3. [`SyncEngine::apply_change`] pushes one user change to prefs + node.
//!
//! A failed node write is not rolled back: the preference keeps the new
//! value and disagrees with the node until the next boot-time restore.

use std::collections::BTreeMap;
use std::sync::Arc;

use parts_core::{DeviceProfile, PrefKey, PrefValue, PreferenceStore};

use crate::error::SyncError;
use crate::node;
use crate::pocket::{PocketModeController, PocketWorker};
use crate::resolver::{DependencyResolver, PendingChoices};
use crate::service::ServiceControl;

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Switch,
    Text,
}

/// One settings row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub key: PrefKey,
    pub kind: ControlKind,
    pub enabled: bool,
    pub checked: bool,
    pub value: Option<String>,
}

impl Control {
    pub fn switch(key: PrefKey, checked: bool) -> Self {
        Self {
            key,
            kind: ControlKind::Switch,
            enabled: true,
            checked,
            value: None,
        }
    }

    pub fn text(key: PrefKey, value: Option<String>) -> Self {
        Self {
            key,
            kind: ControlKind::Text,
            enabled: true,
            checked: false,
            value,
        }
    }

    /// The value the control currently displays.
    pub fn current_value(&self) -> Option<PrefValue> {
        match self.kind {
            ControlKind::Switch => Some(PrefValue::Bool(self.checked)),
            ControlKind::Text => self.value.clone().map(PrefValue::Text),
        }
    }
}

/// Controls of the button settings screen, keyed by preference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsScreen {
    controls: BTreeMap<PrefKey, Control>,
}

impl SettingsScreen {
    pub fn get(&self, key: &PrefKey) -> Option<&Control> {
        self.controls.get(key)
    }

    pub fn get_mut(&mut self, key: &PrefKey) -> Option<&mut Control> {
        self.controls.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub(crate) fn insert(&mut self, control: Control) {
        self.controls.insert(control.key.clone(), control);
    }
}

// ---------------------------------------------------------------------------
// Change results
// ---------------------------------------------------------------------------

/// Outcome of a user-initiated change.
#[derive(Debug)]
pub enum ChangeResult {
    /// Preference stored and node (if any) written.
    Applied,
    /// Nothing changed.
    Rejected { reason: String },
    /// Preference stored, node write failed; the two now disagree.
    WriteFailed { error: SyncError },
}

impl ChangeResult {
    fn rejected(reason: impl Into<String>) -> Self {
        ChangeResult::Rejected {
            reason: reason.into(),
        }
    }
}

/// Where pocket-mode decisions run after a relevant change.
#[derive(Debug, Default)]
pub enum PocketDispatch {
    /// On the caller's thread, before `apply_change` returns.
    #[default]
    Inline,
    /// Queued on a worker; runs eventually after the triggering write.
    Deferred(PocketWorker),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    profile: DeviceProfile,
    prefs: PreferenceStore,
    resolver: DependencyResolver,
    pocket: PocketModeController,
    service: Arc<dyn ServiceControl>,
    dispatch: PocketDispatch,
}

impl SyncEngine {
    /// Pending user choices are loaded from the session file beside
    /// `prefs` (see [`PendingChoices::beside`]).
    pub fn new(
        profile: DeviceProfile,
        prefs: PreferenceStore,
        service: Arc<dyn ServiceControl>,
    ) -> Self {
        let pending = PendingChoices::beside(&prefs);
        Self {
            resolver: DependencyResolver::with_pending(
                profile.buttons.dependencies.clone(),
                pending,
            ),
            pocket: PocketModeController::from_profile(&profile),
            profile,
            prefs,
            service,
            dispatch: PocketDispatch::Inline,
        }
    }

    /// Use `pending` instead of the session file beside the preference
    /// store.
    pub fn with_pending(mut self, pending: PendingChoices) -> Self {
        self.resolver.replace_pending(pending);
        self
    }

    pub fn with_dispatch(mut self, dispatch: PocketDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn prefs(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Tear down the engine, waiting for deferred pocket checks.
    pub fn into_prefs(self) -> PreferenceStore {
        self.prefs
    }

    /// Build the screen from current node state.
    ///
    /// Readable nodes drive the control (and are mirrored into the
    /// preference); unreadable nodes disable it.
    pub fn open_screen(&mut self) -> SettingsScreen {
        let mut screen = SettingsScreen::default();

        for (key, path) in &self.profile.buttons.boolean_nodes {
            let mut control =
                Control::switch(key.clone(), self.prefs.get_bool_or_default(&self.profile, key));
            match read_bound(path.as_path()) {
                Some(value) => {
                    control.checked = value == "1";
                    if self.prefs.get(key) != Some(&PrefValue::Bool(control.checked)) {
                        mirror(&mut self.prefs, key, PrefValue::Bool(control.checked));
                    }
                }
                None => control.enabled = false,
            }
            screen.insert(control);
        }

        for (key, path) in &self.profile.buttons.string_nodes {
            let stored = self.prefs.get_string_or_default(&self.profile, key);
            let mut control = Control::text(key.clone(), stored);
            match read_bound(path.as_path()) {
                Some(value) => {
                    if self.prefs.get(key) != Some(&PrefValue::Text(value.clone())) {
                        mirror(&mut self.prefs, key, PrefValue::Text(value.clone()));
                    }
                    control.value = Some(value);
                }
                None => control.enabled = false,
            }
            screen.insert(control);
        }

        for key in self.profile.buttons.dependencies.keys() {
            if screen.get(key).is_none() {
                let checked = self.prefs.get_bool_or_default(&self.profile, key);
                screen.insert(Control::switch(key.clone(), checked));
            }
        }

        screen
    }

    /// Apply one user change: persist, write the bound node, then reconcile
    /// dependents and re-run the pocket-mode decision when relevant.
    pub fn apply_change(
        &mut self,
        screen: &mut SettingsScreen,
        key: &PrefKey,
        value: PrefValue,
    ) -> ChangeResult {
        let Some(control) = screen.get_mut(key) else {
            return ChangeResult::rejected(format!("no control for '{key}'"));
        };
        if !control.enabled {
            return ChangeResult::rejected(format!("'{key}' is disabled"));
        }
        match (control.kind, &value) {
            (ControlKind::Switch, PrefValue::Bool(b)) => control.checked = *b,
            (ControlKind::Text, PrefValue::Text(s)) => control.value = Some(s.clone()),
            (ControlKind::Switch, PrefValue::Text(_)) => {
                return ChangeResult::rejected(format!("'{key}' expects true or false"));
            }
            (ControlKind::Text, PrefValue::Bool(_)) => {
                return ChangeResult::rejected(format!("'{key}' expects a text value"));
            }
        }

        mirror(&mut self.prefs, key, value.clone());

        let result = match self.profile.bound_node(key) {
            None => ChangeResult::Applied,
            Some((path, _)) => {
                let path = path.clone();
                match node::try_write_line(path.as_path(), &value.node_token()) {
                    Ok(()) => {
                        tracing::info!("'{key}' = {value} → {path}");
                        let dependents: Vec<PrefKey> = self
                            .profile
                            .dependents_of(&path)
                            .into_iter()
                            .cloned()
                            .collect();
                        for dependent in dependents {
                            self.reconcile_key(screen, &dependent);
                        }
                        ChangeResult::Applied
                    }
                    Err(error) => {
                        tracing::warn!("'{key}' stored but node not updated: {error}");
                        ChangeResult::WriteFailed { error }
                    }
                }
            }
        };

        if matches!(result, ChangeResult::Applied) && self.pocket.watches(key) {
            self.run_pocket_check();
        }
        result
    }

    /// Reconcile every dependency-gated control against its node.
    pub fn resume(&mut self, screen: &mut SettingsScreen) {
        let keys: Vec<PrefKey> = self.resolver.bindings().keys().cloned().collect();
        for key in keys {
            self.reconcile_key(screen, &key);
        }
    }

    fn reconcile_key(&mut self, screen: &mut SettingsScreen, key: &PrefKey) {
        let Some(enabled) = self.resolver.resolve(key) else {
            return;
        };
        let Some(control) = screen.get_mut(key) else {
            return;
        };
        self.resolver
            .reconcile(key, enabled, control, &mut self.prefs);
    }

    fn run_pocket_check(&self) {
        match &self.dispatch {
            PocketDispatch::Inline => {
                self.pocket.apply(&self.prefs, self.service.as_ref());
            }
            PocketDispatch::Deferred(worker) => worker.submit(self.pocket.decide(&self.prefs)),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("device", &self.profile.device)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

fn read_bound(path: &std::path::Path) -> Option<String> {
    if !node::is_readable(path) {
        return None;
    }
    match node::read_line(path) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("{err}");
            None
        }
    }
}

fn mirror(prefs: &mut PreferenceStore, key: &PrefKey, value: PrefValue) {
    if let Err(err) = prefs.set(key, value) {
        tracing::warn!("failed to persist '{key}': {err}");
    }
}
