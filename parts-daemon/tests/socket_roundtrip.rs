use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parts_core::{profile, DeviceProfile, NodePath, PrefKey, PreferenceStore};
use parts_daemon::{
    paths::socket_path, request_service, request_shutdown, request_status, send_request,
    DaemonError, DaemonRequest, SocketServiceControl,
};
use parts_sync::{PocketAction, PocketModeController, Service};
use tempfile::TempDir;

fn seed_home(home: &Path, wakeup: &Path) {
    let mut device = DeviceProfile::builtin();
    device.pocket.wakeup_node = Some(NodePath::from(wakeup));
    profile::save_at(home, &device).expect("save profile");
}

async fn wait_for_socket(home: &Path) {
    let socket = socket_path(home);
    for _ in 0..100 {
        if socket.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon socket never appeared at {}", socket.display());
}

/// Run blocking client calls off the runtime threads.
async fn blocking<T, F>(home: &Path, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(PathBuf) -> T + Send + 'static,
{
    let home = home.to_path_buf();
    tokio::task::spawn_blocking(move || f(home))
        .await
        .expect("client task")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pocket_mode_lifecycle_over_socket() {
    let home = TempDir::new().expect("home");
    let wakeup = home.path().join("enable_wakeup");
    fs::write(&wakeup, "1\n").expect("wakeup node");
    seed_home(home.path(), &wakeup);

    let daemon = tokio::spawn(parts_daemon::run(home.path().to_path_buf()));
    wait_for_socket(home.path()).await;

    // Controller decision delivered through the socket-backed ServiceControl.
    let action = blocking(home.path(), |home| {
        let mut prefs = PreferenceStore::in_memory();
        prefs.set_bool(&PrefKey::from("fp_wakeup"), true).unwrap();
        prefs.set_bool(&PrefKey::from("fp_pocketmode"), true).unwrap();
        let controller = PocketModeController::from_profile(&DeviceProfile::builtin());
        controller.apply(&prefs, &SocketServiceControl::new(home))
    })
    .await;
    assert_eq!(action, PocketAction::Start);

    let armed = blocking(home.path(), |home| {
        let toggle = DaemonRequest {
            enabled: Some(true),
            ..DaemonRequest::new("proximity")
        };
        send_request(&home, &toggle).expect("proximity");
        let response = send_request(&home, &DaemonRequest::new("screen_off")).expect("screen_off");
        response.data.expect("data")["proximity_armed"].clone()
    })
    .await;
    assert_eq!(armed, serde_json::json!(true));

    let status = blocking(home.path(), |home| request_status(&home).expect("status")).await;
    assert_eq!(status["pocket_mode"]["running"], serde_json::json!(true));
    assert_eq!(status["pocket_mode"]["proximity_armed"], serde_json::json!(true));

    let stopped = blocking(home.path(), |home| {
        request_service(&home, Service::PocketMode, false).expect("stop")
    })
    .await;
    assert_eq!(stopped["changed"], serde_json::json!(true));

    blocking(home.path(), |home| request_shutdown(&home).expect("shutdown")).await;
    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon exits")
        .expect("join")
        .expect("daemon result");
    assert!(!socket_path(home.path()).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daemon_refuses_to_start_without_profile() {
    let home = TempDir::new().expect("home");
    let err = parts_daemon::run(home.path().to_path_buf())
        .await
        .unwrap_err();
    assert!(matches!(err, DaemonError::Config(_)));
}

#[test]
fn client_reports_not_running() {
    let home = TempDir::new().expect("home");
    assert!(matches!(
        request_status(home.path()),
        Err(DaemonError::DaemonNotRunning { .. })
    ));
}
