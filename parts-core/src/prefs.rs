//! Preference store: flat key/value settings persisted as JSON.
//!
//! Persists a [`PrefsFile`] document at `<home>/.parts/prefs.json`.
//! Every setter saves synchronously with the atomic `.tmp` + rename pattern
//! used for the profile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::profile::{self, DeviceProfile};
use crate::types::{PrefKey, PrefValue};

/// On-disk preference document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrefsFile {
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub values: BTreeMap<PrefKey, PrefValue>,
}

/// `<home>/.parts/prefs.json`: pure, no I/O.
pub fn store_path_at(home: &Path) -> PathBuf {
    profile::parts_root_at(home).join("prefs.json")
}

/// Key/value preference store. Created on first access, overwritten on
/// every change.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    values: BTreeMap<PrefKey, PrefValue>,
    saved_at: Option<DateTime<Utc>>,
}

impl PreferenceStore {
    /// A store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: BTreeMap::new(),
            saved_at: None,
        }
    }

    /// Open the store under `home`. A missing file is an empty store.
    pub fn open_at(home: &Path) -> Result<Self, ConfigError> {
        Self::open_file(store_path_at(home))
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, ConfigError> {
        Self::open_at(&profile::home()?)
    }

    /// Open the store at an explicit file path.
    pub fn open_file(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                values: BTreeMap::new(),
                saved_at: None,
            });
        }
        let contents = std::fs::read_to_string(&path)?;
        let file: PrefsFile = serde_json::from_str(&contents).map_err(|e| {
            ConfigError::PrefsParse {
                path: path.clone(),
                source: e,
            }
        })?;
        Ok(Self {
            path: Some(path),
            values: file.values,
            saved_at: Some(file.saved_at),
        })
    }

    /// An in-memory copy of this store. Changes to the copy are never
    /// written back.
    pub fn detached(&self) -> Self {
        Self {
            path: None,
            values: self.values.clone(),
            saved_at: self.saved_at,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// When the store was last persisted; `None` if never.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    pub fn get(&self, key: &PrefKey) -> Option<&PrefValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &PrefKey) -> bool {
        self.values.contains_key(key)
    }

    /// Stored switch value, or `default` when unset or stored as text.
    pub fn get_bool(&self, key: &PrefKey, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(PrefValue::as_bool)
            .unwrap_or(default)
    }

    /// Stored list value, or `default` when unset or stored as a switch.
    pub fn get_string(&self, key: &PrefKey, default: &str) -> String {
        self.values
            .get(key)
            .and_then(PrefValue::as_text)
            .unwrap_or(default)
            .to_string()
    }

    /// Switch value falling back to the profile's defaults table.
    pub fn get_bool_or_default(&self, profile: &DeviceProfile, key: &PrefKey) -> bool {
        self.get_bool(key, profile.default_bool(key))
    }

    /// List value falling back to the profile's defaults table.
    pub fn get_string_or_default(&self, profile: &DeviceProfile, key: &PrefKey) -> Option<String> {
        match self.values.get(key).and_then(PrefValue::as_text) {
            Some(s) => Some(s.to_string()),
            None => profile.default_string(key).map(str::to_string),
        }
    }

    pub fn set_bool(&mut self, key: &PrefKey, value: bool) -> Result<(), ConfigError> {
        self.set(key, PrefValue::Bool(value))
    }

    pub fn set_string(&mut self, key: &PrefKey, value: &str) -> Result<(), ConfigError> {
        self.set(key, PrefValue::Text(value.to_string()))
    }

    /// Store `value` and persist. The in-memory value is kept even if the
    /// save fails.
    pub fn set(&mut self, key: &PrefKey, value: PrefValue) -> Result<(), ConfigError> {
        self.values.insert(key.clone(), value);
        self.save()
    }

    pub fn remove(&mut self, key: &PrefKey) -> Result<Option<PrefValue>, ConfigError> {
        let old = self.values.remove(key);
        if old.is_some() {
            self.save()?;
        }
        Ok(old)
    }

    /// Iterate stored values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PrefKey, &PrefValue)> {
        self.values.iter()
    }

    fn save(&mut self) -> Result<(), ConfigError> {
        let now = Utc::now();
        let Some(path) = self.path.as_ref() else {
            self.saved_at = Some(now);
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let file = PrefsFile {
            saved_at: now,
            values: self.values.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        profile::set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, path)?;
        self.saved_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> PrefKey {
        PrefKey::from(s)
    }

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = PreferenceStore::open_at(tmp.path()).unwrap();
        assert!(store.iter().next().is_none());
        assert!(store.saved_at().is_none());
        assert!(!store.get_bool(&key("fp_wakeup"), false));
        assert!(store.get_bool(&key("fp_wakeup"), true));
    }

    #[test]
    fn set_persists_synchronously() {
        let tmp = TempDir::new().unwrap();
        let mut store = PreferenceStore::open_at(tmp.path()).unwrap();
        store.set_bool(&key("fp_wakeup"), true).unwrap();
        store.set_string(&key("fp_home_action"), "back").unwrap();

        let reopened = PreferenceStore::open_at(tmp.path()).unwrap();
        assert!(reopened.get_bool(&key("fp_wakeup"), false));
        assert_eq!(reopened.get_string(&key("fp_home_action"), "home"), "back");
        assert!(reopened.saved_at().is_some());
    }

    #[test]
    fn type_mismatch_falls_back_to_default() {
        let mut store = PreferenceStore::in_memory();
        store.set_string(&key("fp_wakeup"), "yes").unwrap();
        assert!(!store.get_bool(&key("fp_wakeup"), false));
        store.set_bool(&key("fp_home_action"), true).unwrap();
        assert_eq!(store.get_string(&key("fp_home_action"), "home"), "home");
    }

    #[test]
    fn profile_defaults_apply_when_unset() {
        let mut profile = DeviceProfile::builtin();
        profile.defaults.insert(key("fp_home"), PrefValue::Bool(true));
        let store = PreferenceStore::in_memory();
        assert!(store.get_bool_or_default(&profile, &key("fp_home")));
        assert!(!store.get_bool_or_default(&profile, &key("unknown")));
        assert!(store.get_string_or_default(&profile, &key("unknown")).is_none());
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let mut store = PreferenceStore::open_at(tmp.path()).unwrap();
        store.set_bool(&key("fp_home"), false).unwrap();
        let tmp_path = store_path_at(tmp.path()).with_extension("json.tmp");
        assert!(!tmp_path.exists(), "tmp file should be removed after rename");
    }

    #[test]
    fn corrupt_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = PreferenceStore::open_at(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::PrefsParse { .. }));
        assert!(err.to_string().contains("prefs.json"));
    }

    #[test]
    fn detached_copy_does_not_touch_the_file() {
        let tmp = TempDir::new().unwrap();
        let mut store = PreferenceStore::open_at(tmp.path()).unwrap();
        store.set_bool(&key("fp_pocketmode"), true).unwrap();

        let mut copy = store.detached();
        assert!(copy.path().is_none());
        assert!(copy.get_bool(&key("fp_pocketmode"), false));
        copy.set_bool(&key("fp_pocketmode"), false).unwrap();

        let reopened = PreferenceStore::open_at(tmp.path()).unwrap();
        assert!(reopened.get_bool(&key("fp_pocketmode"), false));
    }

    #[test]
    fn remove_only_saves_when_present() {
        let mut store = PreferenceStore::in_memory();
        assert!(store.remove(&key("x")).unwrap().is_none());
        store.set_bool(&key("x"), true).unwrap();
        assert_eq!(store.remove(&key("x")).unwrap(), Some(PrefValue::Bool(true)));
    }
}
