//! Doze gating: ambient display switches and the gesture service decision.
//!
//! The gesture service runs only while doze is on, always-on display is off,
//! and at least one gesture is enabled. Every change re-runs that decision.

use parts_core::profile::DozeSection;
use parts_core::{DeviceProfile, PrefKey, PrefValue, PreferenceStore};

use crate::engine::{ChangeResult, Control, SettingsScreen};
use crate::service::{Service, ServiceControl};

#[derive(Debug, Clone)]
pub struct DozeSettings {
    keys: DozeSection,
}

impl DozeSettings {
    pub fn new(keys: DozeSection) -> Self {
        Self { keys }
    }

    pub fn from_profile(profile: &DeviceProfile) -> Self {
        Self::new(profile.doze.clone())
    }

    /// Doze defaults to on.
    pub fn is_doze_enabled(&self, prefs: &PreferenceStore) -> bool {
        prefs.get_bool(&self.keys.enabled_key, true)
    }

    pub fn is_always_on_enabled(&self, prefs: &PreferenceStore) -> bool {
        self.keys.always_on_available && prefs.get_bool(&self.keys.always_on_key, false)
    }

    fn gesture_keys(&self) -> Vec<&PrefKey> {
        let mut keys = vec![&self.keys.pick_up_key];
        if self.keys.proximity_check_before_pulse {
            keys.push(&self.keys.hand_wave_key);
            keys.push(&self.keys.pocket_key);
        }
        keys
    }

    /// Controls shown on the doze screen. The master switch is not a
    /// control; see [`DozeSettings::set_doze_enabled`].
    pub fn open(&self, prefs: &PreferenceStore) -> SettingsScreen {
        let mut screen = SettingsScreen::default();
        if self.keys.always_on_available {
            screen.insert(Control::switch(self.keys.always_on_key.clone(), false));
        }
        for key in self.gesture_keys() {
            screen.insert(Control::switch(key.clone(), prefs.get_bool(key, false)));
        }
        self.refresh_enabled(&mut screen, prefs);
        screen
    }

    fn refresh_enabled(&self, screen: &mut SettingsScreen, prefs: &PreferenceStore) {
        let doze = self.is_doze_enabled(prefs);
        let aod = self.is_always_on_enabled(prefs);
        if let Some(control) = screen.get_mut(&self.keys.always_on_key) {
            control.enabled = doze;
            control.checked = aod;
        }
        for key in self.gesture_keys() {
            if let Some(control) = screen.get_mut(key) {
                control.enabled = doze && !aod;
            }
        }
    }

    /// Flip the master switch. Turning doze off also turns always-on off.
    pub fn set_doze_enabled(
        &self,
        screen: &mut SettingsScreen,
        prefs: &mut PreferenceStore,
        enabled: bool,
        service: &dyn ServiceControl,
    ) {
        persist(prefs, &self.keys.enabled_key, enabled);
        if !enabled {
            persist(prefs, &self.keys.always_on_key, false);
        }
        self.refresh_enabled(screen, prefs);
        self.check_service(prefs, service);
    }

    /// Toggle always-on display or a gesture.
    pub fn set_switch(
        &self,
        screen: &mut SettingsScreen,
        prefs: &mut PreferenceStore,
        key: &PrefKey,
        value: bool,
        service: &dyn ServiceControl,
    ) -> ChangeResult {
        let Some(control) = screen.get_mut(key) else {
            return ChangeResult::Rejected {
                reason: format!("no doze control for '{key}'"),
            };
        };
        if !control.enabled {
            return ChangeResult::Rejected {
                reason: format!("'{key}' is disabled"),
            };
        }
        control.checked = value;
        persist(prefs, key, value);
        self.refresh_enabled(screen, prefs);
        self.check_service(prefs, service);
        ChangeResult::Applied
    }

    pub fn should_run_service(&self, prefs: &PreferenceStore) -> bool {
        let any_gesture = [
            &self.keys.pick_up_key,
            &self.keys.hand_wave_key,
            &self.keys.pocket_key,
        ]
        .into_iter()
        .any(|k| prefs.get_bool(k, false));
        self.is_doze_enabled(prefs) && !self.is_always_on_enabled(prefs) && any_gesture
    }

    /// Start or stop the gesture service to match the preferences.
    pub fn check_service(&self, prefs: &PreferenceStore, service: &dyn ServiceControl) -> bool {
        let run = self.should_run_service(prefs);
        let result = if run {
            service.start(Service::Doze)
        } else {
            service.stop(Service::Doze)
        };
        if let Err(err) = result {
            tracing::warn!("doze service request failed: {err}");
        }
        run
    }
}

fn persist(prefs: &mut PreferenceStore, key: &PrefKey, value: bool) {
    if let Err(err) = prefs.set(key, PrefValue::Bool(value)) {
        tracing::warn!("failed to persist '{key}': {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::RecordingService;
    use rstest::rstest;

    fn settings() -> DozeSettings {
        DozeSettings::from_profile(&DeviceProfile::builtin())
    }

    fn key(s: &str) -> PrefKey {
        PrefKey::from(s)
    }

    #[rstest]
    #[case(true, false, true, true)]
    #[case(true, true, true, false)]
    #[case(false, false, true, false)]
    #[case(true, false, false, false)]
    fn service_decision(
        #[case] doze: bool,
        #[case] aod: bool,
        #[case] gesture: bool,
        #[case] expected: bool,
    ) {
        let mut prefs = PreferenceStore::in_memory();
        prefs.set_bool(&key("doze_enable"), doze).unwrap();
        prefs.set_bool(&key("always_on_display"), aod).unwrap();
        prefs.set_bool(&key("gesture_hand_wave"), gesture).unwrap();
        assert_eq!(settings().should_run_service(&prefs), expected);
    }

    #[test]
    fn doze_defaults_on() {
        assert!(settings().is_doze_enabled(&PreferenceStore::in_memory()));
    }

    #[test]
    fn disabling_doze_forces_aod_off_and_disables_controls() {
        let mut prefs = PreferenceStore::in_memory();
        prefs.set_bool(&key("always_on_display"), true).unwrap();
        let service = RecordingService::default();
        let s = settings();
        let mut screen = s.open(&prefs);

        s.set_doze_enabled(&mut screen, &mut prefs, false, &service);

        assert!(!prefs.get_bool(&key("always_on_display"), true));
        assert!(screen.iter().all(|c| !c.enabled));
        assert!(!screen.get(&key("always_on_display")).unwrap().checked);
        assert_eq!(service.calls(), vec![(Service::Doze, false)]);
    }

    #[test]
    fn gesture_change_starts_service() {
        let mut prefs = PreferenceStore::in_memory();
        let service = RecordingService::default();
        let s = settings();
        let mut screen = s.open(&prefs);

        let r = s.set_switch(&mut screen, &mut prefs, &key("gesture_pick_up"), true, &service);
        assert!(matches!(r, ChangeResult::Applied));
        assert_eq!(service.calls(), vec![(Service::Doze, true)]);

        s.set_switch(&mut screen, &mut prefs, &key("always_on_display"), true, &service);
        assert!(!screen.get(&key("gesture_pick_up")).unwrap().enabled);
        assert_eq!(service.calls().last(), Some(&(Service::Doze, false)));
    }

    #[test]
    fn capability_flags_hide_controls() {
        let mut profile = DeviceProfile::builtin();
        profile.doze.always_on_available = false;
        profile.doze.proximity_check_before_pulse = false;
        let screen = DozeSettings::from_profile(&profile).open(&PreferenceStore::in_memory());
        assert_eq!(screen.len(), 1);
        assert!(screen.get(&key("gesture_pick_up")).is_some());
    }
}
