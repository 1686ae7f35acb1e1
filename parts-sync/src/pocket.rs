//! Pocket-mode controller: runs the proximity service iff fingerprint
//! wakeup and pocket mode are both on.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parts_core::{DeviceProfile, PrefKey, PreferenceStore};

use crate::error::{io_err, SyncError};
use crate::service::{Service, ServiceControl};

/// What the controller requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PocketAction {
    Start,
    Stop,
}

impl PocketAction {
    fn from_decision(should_run: bool) -> Self {
        if should_run {
            PocketAction::Start
        } else {
            PocketAction::Stop
        }
    }
}

#[derive(Debug, Clone)]
pub struct PocketModeController {
    wakeup_key: PrefKey,
    pocket_mode_key: PrefKey,
}

impl PocketModeController {
    pub fn new(wakeup_key: PrefKey, pocket_mode_key: PrefKey) -> Self {
        Self {
            wakeup_key,
            pocket_mode_key,
        }
    }

    pub fn from_profile(profile: &DeviceProfile) -> Self {
        Self::new(
            profile.pocket.wakeup_key.clone(),
            profile.pocket.pocket_mode_key.clone(),
        )
    }

    /// Keys whose changes require a new decision.
    pub fn watches(&self, key: &PrefKey) -> bool {
        key == &self.wakeup_key || key == &self.pocket_mode_key
    }

    /// `wakeup AND pocket_mode`; unset preferences count as off.
    pub fn decide(&self, prefs: &PreferenceStore) -> bool {
        prefs.get_bool(&self.wakeup_key, false) && prefs.get_bool(&self.pocket_mode_key, false)
    }

    /// Decide and deliver the request.
    pub fn apply(&self, prefs: &PreferenceStore, service: &dyn ServiceControl) -> PocketAction {
        request(self.decide(prefs), service)
    }
}

/// Deliver a start/stop request; failures are logged, never raised.
pub fn request(should_run: bool, service: &dyn ServiceControl) -> PocketAction {
    let action = PocketAction::from_decision(should_run);
    let result = match action {
        PocketAction::Start => service.start(Service::PocketMode),
        PocketAction::Stop => service.stop(Service::PocketMode),
    };
    if let Err(err) = result {
        tracing::warn!("pocket mode {action:?} request failed: {err}");
    }
    action
}

/// Runs pocket-mode requests off the caller's thread, in submission order.
pub struct PocketWorker {
    tx: Option<Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl PocketWorker {
    pub fn spawn(service: Arc<dyn ServiceControl>) -> Result<Self, SyncError> {
        let (tx, rx) = mpsc::channel::<bool>();
        let handle = std::thread::Builder::new()
            .name("pocket-check".to_string())
            .spawn(move || {
                for should_run in rx {
                    request(should_run, service.as_ref());
                }
            })
            .map_err(|e| io_err("pocket-check thread", e))?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn submit(&self, should_run: bool) {
        let delivered = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send(should_run).is_ok());
        if !delivered {
            tracing::warn!("pocket-check worker is gone; request dropped");
        }
    }
}

impl Drop for PocketWorker {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain queued requests and exit.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("pocket-check worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for PocketWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PocketWorker")
            .field("running", &self.tx.is_some())
            .finish()
    }
}
