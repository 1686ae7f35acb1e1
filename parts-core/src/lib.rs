//! Parts core library: domain types, device profile, preference store, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and binding structs
//! - [`profile`]: YAML device profile (load / save / init)
//! - [`prefs`]: flat key/value preference store
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod prefs;
pub mod profile;
pub mod types;

pub use error::ConfigError;
pub use prefs::PreferenceStore;
pub use profile::DeviceProfile;
pub use types::{DependencyBinding, NodePath, PrefKey, PrefValue};
