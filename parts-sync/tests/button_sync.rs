use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use parts_core::{profile, DeviceProfile, NodePath, PrefKey, PrefValue, PreferenceStore};
use parts_sync::{
    on_boot, ChangeResult, ComponentStore, ComponentSwitch, PocketAction, Service, ServiceControl,
    SyncEngine, SyncError, BUTTON_SETTINGS,
};
use tempfile::TempDir;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(Service, bool)>>);

impl Recorder {
    fn calls(&self) -> Vec<(Service, bool)> {
        self.0.lock().unwrap().clone()
    }
}

impl ServiceControl for Recorder {
    fn start(&self, service: Service) -> Result<(), SyncError> {
        self.0.lock().unwrap().push((service, true));
        Ok(())
    }

    fn stop(&self, service: Service) -> Result<(), SyncError> {
        self.0.lock().unwrap().push((service, false));
        Ok(())
    }
}

/// Builtin profile with every node moved under `nodes`.
fn relocated_profile(nodes: &Path) -> DeviceProfile {
    let mut profile = DeviceProfile::builtin();
    let relocate = |n: &NodePath| NodePath::from(nodes.join(n.as_path().file_name().unwrap()));
    for node in profile.buttons.boolean_nodes.values_mut() {
        *node = relocate(node);
    }
    for dep in profile.buttons.dependencies.values_mut() {
        dep.node = relocate(&dep.node);
    }
    profile.buttons.presence_nodes = profile.buttons.presence_nodes.iter().map(relocate).collect();
    profile
}

fn key(s: &str) -> PrefKey {
    PrefKey::from(s)
}

#[test]
fn user_session_then_boot_restores_choices() {
    init_logs();
    let home = TempDir::new().expect("home");
    let nodes = TempDir::new().expect("nodes");
    for name in ["enable_key_events", "enable_wakeup", "reversed_keys_enable"] {
        fs::write(nodes.path().join(name), "0\n").expect("seed node");
    }
    let profile = relocated_profile(nodes.path());
    profile::save_at(home.path(), &profile).expect("save profile");

    let service = Arc::new(Recorder::default());
    let prefs = PreferenceStore::open_at(home.path()).expect("open prefs");
    let mut engine = SyncEngine::new(profile::load_at(home.path()).expect("load"), prefs, service.clone());
    let mut screen = engine.open_screen();
    engine.resume(&mut screen);

    assert!(matches!(
        engine.apply_change(&mut screen, &key("fp_wakeup"), PrefValue::Bool(true)),
        ChangeResult::Applied
    ));
    assert!(matches!(
        engine.apply_change(&mut screen, &key("fp_pocketmode"), PrefValue::Bool(true)),
        ChangeResult::Applied
    ));
    assert_eq!(service.calls().last(), Some(&(Service::PocketMode, true)));
    drop(engine);

    // Simulate a reboot: nodes come back with driver defaults.
    for name in ["enable_key_events", "enable_wakeup", "reversed_keys_enable"] {
        fs::write(nodes.path().join(name), "0\n").expect("reset node");
    }
    let prefs = PreferenceStore::open_at(home.path()).expect("reopen prefs");
    let mut components = ComponentStore::load_at(home.path()).expect("components");
    let boot_service = Recorder::default();
    let report = on_boot(&profile, &prefs, &mut components, &boot_service);

    assert!(report.entry_point_enabled);
    assert_eq!(report.pocket, Some(PocketAction::Start));
    assert_eq!(
        fs::read_to_string(nodes.path().join("enable_wakeup")).unwrap(),
        "1"
    );
    assert_eq!(
        fs::read_to_string(nodes.path().join("enable_key_events")).unwrap(),
        "0"
    );
}

#[test]
fn write_failure_on_one_key_leaves_others_working() {
    init_logs();
    let nodes = TempDir::new().expect("nodes");
    fs::write(nodes.path().join("enable_wakeup"), "1").unwrap();
    fs::write(nodes.path().join("enable_key_events"), "0").unwrap();
    let profile = relocated_profile(nodes.path());

    let service = Arc::new(Recorder::default());
    let mut engine = SyncEngine::new(profile, PreferenceStore::in_memory(), service.clone());
    let mut screen = engine.open_screen();
    engine.resume(&mut screen);
    fs::remove_file(nodes.path().join("enable_key_events")).unwrap();

    let failed = engine.apply_change(&mut screen, &key("fp_home"), PrefValue::Bool(true));
    assert!(matches!(failed, ChangeResult::WriteFailed { .. }));

    let ok = engine.apply_change(&mut screen, &key("fp_pocketmode"), PrefValue::Bool(true));
    assert!(matches!(ok, ChangeResult::Applied));
    assert_eq!(service.calls(), vec![(Service::PocketMode, true)]);
    assert!(screen.get(&key("fp_pocketmode")).unwrap().enabled);
}

#[test]
fn boot_without_button_nodes_persists_hidden_entry_point() {
    init_logs();
    let home = TempDir::new().expect("home");
    let nodes = TempDir::new().expect("nodes");
    let profile = relocated_profile(nodes.path());
    let mut components = ComponentStore::load_at(home.path()).expect("components");

    let report = on_boot(
        &profile,
        &PreferenceStore::in_memory(),
        &mut components,
        &Recorder::default(),
    );

    assert!(!report.button_nodes_present);
    let reloaded = ComponentStore::load_at(home.path()).expect("reload");
    assert!(!reloaded.is_enabled(BUTTON_SETTINGS));
}

/// One `parts set`-sized session: fresh engine over the on-disk stores.
fn set_in_new_session(home: &Path, profile: &DeviceProfile, name: &str, value: bool) {
    let prefs = PreferenceStore::open_at(home).expect("open prefs");
    let mut engine = SyncEngine::new(profile.clone(), prefs, Arc::new(Recorder::default()));
    let mut screen = engine.open_screen();
    engine.resume(&mut screen);
    let result = engine.apply_change(&mut screen, &key(name), PrefValue::Bool(value));
    assert!(matches!(result, ChangeResult::Applied), "{name}: {result:?}");
}

#[test]
fn pocket_choice_restored_across_sessions() {
    init_logs();
    let home = TempDir::new().expect("home");
    let nodes = TempDir::new().expect("nodes");
    for name in ["enable_key_events", "enable_wakeup", "reversed_keys_enable"] {
        fs::write(nodes.path().join(name), "0\n").expect("seed node");
    }
    let profile = relocated_profile(nodes.path());

    set_in_new_session(home.path(), &profile, "fp_wakeup", true);
    set_in_new_session(home.path(), &profile, "fp_pocketmode", true);
    set_in_new_session(home.path(), &profile, "fp_wakeup", false);
    let prefs = PreferenceStore::open_at(home.path()).expect("prefs");
    assert!(!prefs.get_bool(&key("fp_pocketmode"), true));

    set_in_new_session(home.path(), &profile, "fp_wakeup", true);
    let prefs = PreferenceStore::open_at(home.path()).expect("prefs");
    assert!(prefs.get_bool(&key("fp_pocketmode"), false));
}
