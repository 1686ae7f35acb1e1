//! Component store: enable state of UI entry points.
//!
//! Persists a [`ComponentsFile`] JSON document at
//! `<home>/.parts/components.json`. Writes use the same atomic `.tmp` +
//! rename pattern as the profile and preference store. A component that was
//! never recorded counts as enabled.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// The button settings entry point.
pub const BUTTON_SETTINGS: &str = "ButtonSettings";

/// Enable/disable surface for UI entry points.
pub trait ComponentSwitch {
    fn is_enabled(&self, component: &str) -> bool;
    fn set_enabled(&mut self, component: &str, enabled: bool) -> Result<(), SyncError>;
}

/// On-disk component state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentsFile {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub components: BTreeMap<String, bool>,
}

/// `<home>/.parts/components.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    parts_core::profile::parts_root_at(home).join("components.json")
}

#[derive(Debug, Clone, Default)]
pub struct ComponentStore {
    path: Option<PathBuf>,
    components: BTreeMap<String, bool>,
}

impl ComponentStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store under `home`; a missing file is an empty store.
    pub fn load_at(home: &Path) -> Result<Self, SyncError> {
        let path = store_path_at(home);
        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                components: BTreeMap::new(),
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let file: ComponentsFile = serde_json::from_str(&contents)?;
        Ok(Self {
            path: Some(path),
            components: file.components,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.components.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn save(&self) -> Result<(), SyncError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let Some(dir) = path.parent() else {
            return Err(io_err(
                path,
                std::io::Error::other("invalid component store path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let file = ComponentsFile {
            updated_at: Utc::now(),
            components: self.components.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

impl ComponentSwitch for ComponentStore {
    fn is_enabled(&self, component: &str) -> bool {
        self.components.get(component).copied().unwrap_or(true)
    }

    fn set_enabled(&mut self, component: &str, enabled: bool) -> Result<(), SyncError> {
        self.components.insert(component.to_string(), enabled);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unknown_component_is_enabled() {
        let store = ComponentStore::in_memory();
        assert!(store.is_enabled(BUTTON_SETTINGS));
    }

    #[test]
    fn state_survives_reload() {
        let tmp = TempDir::new().unwrap();
        let mut store = ComponentStore::load_at(tmp.path()).unwrap();
        store.set_enabled(BUTTON_SETTINGS, false).unwrap();

        let reloaded = ComponentStore::load_at(tmp.path()).unwrap();
        assert!(!reloaded.is_enabled(BUTTON_SETTINGS));
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec![(BUTTON_SETTINGS, false)]);
        assert!(!store_path_at(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[").unwrap();
        assert!(matches!(
            ComponentStore::load_at(tmp.path()),
            Err(SyncError::Json(_))
        ));
    }
}
