//! # parts-sync
//!
//! Node accessor and preference ↔ node synchronization.
//!
//! Open a [`SettingsScreen`] with [`SyncEngine::open_screen`], feed user
//! changes through [`SyncEngine::apply_change`], and call
//! [`SyncEngine::resume`] whenever the screen comes back to the foreground.
//! [`boot::on_boot`] runs the one-shot boot sequence.

pub mod boot;
pub mod components;
pub mod doze;
pub mod engine;
pub mod error;
pub mod keys;
pub mod node;
pub mod pocket;
pub mod resolver;
pub mod search;
pub mod service;

pub use boot::{on_boot, BootReport};
pub use components::{ComponentStore, ComponentSwitch, BUTTON_SETTINGS};
pub use doze::DozeSettings;
pub use engine::{ChangeResult, Control, ControlKind, PocketDispatch, SettingsScreen, SyncEngine};
pub use error::SyncError;
pub use keys::{KeyDisposition, KeyEvent, KeyHandler, ScreenState};
pub use pocket::{PocketAction, PocketModeController, PocketWorker};
pub use resolver::{DependencyResolver, DependencyState, PendingChoice, PendingChoices};
pub use search::{PackageQuery, PackagesList};
pub use service::{NoService, Service, ServiceControl};
