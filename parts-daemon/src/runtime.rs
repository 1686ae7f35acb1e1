use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};

use parts_core::{profile, NodePath};
use parts_sync::{node, Service};

use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::state::DaemonState;

/// Shared, per-connection view of the daemon.
#[derive(Clone)]
struct Shared {
    state: Arc<RwLock<DaemonState>>,
    wakeup_node: Option<NodePath>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon until a `shutdown` request or ctrl-c.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let device = profile::load_at(&home)?;
    ensure_runtime_dirs(&home)?;
    tracing::info!(device = %device.device, "parts daemon starting");

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let shared = Shared {
        state: Arc::new(RwLock::new(DaemonState::default())),
        wakeup_node: device.pocket.wakeup_node.clone(),
        shutdown_tx: shutdown_tx.clone(),
        started_at_unix: unix_seconds_now(),
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let shared = shared.clone();
        tokio::spawn(async move {
            let result = socket_server_task(home, shared, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("parts daemon stopped");
    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    shared: Shared,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, shared).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(stream: UnixStream, shared: Shared) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = dispatch(&request, &shared).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "shutdown" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(request: &DaemonRequest, shared: &Shared) -> DaemonResponse {
    match request.cmd.as_str() {
        "start" | "stop" => {
            let running = request.cmd == "start";
            let service = request.service.unwrap_or(Service::PocketMode);
            let changed = shared.state.write().await.set_running(service, running);
            if changed {
                tracing::info!(%service, running, "service state changed");
            }
            DaemonResponse::ok(json!({ "service": service, "running": running, "changed": changed }))
        }
        "proximity" => match request.enabled {
            Some(enabled) => {
                let mut state = shared.state.write().await;
                state.pocket_mode.proximity_toggle(enabled);
                DaemonResponse::ok(json!(state.pocket_mode))
            }
            None => DaemonResponse::error("proximity requires 'enabled'"),
        },
        "screen_off" => {
            let wakeup_on = wakeup_is_on(shared.wakeup_node.clone()).await;
            let mut state = shared.state.write().await;
            state.pocket_mode.screen_off(wakeup_on);
            tracing::debug!(armed = state.pocket_mode.proximity_armed, "screen off");
            DaemonResponse::ok(json!(state.pocket_mode))
        }
        "screen_on" => {
            let mut state = shared.state.write().await;
            state.pocket_mode.screen_on();
            DaemonResponse::ok(json!(state.pocket_mode))
        }
        "status" => DaemonResponse::ok(status_payload(shared).await),
        "shutdown" => {
            let _ = shared.shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

async fn status_payload(shared: &Shared) -> Value {
    let state = shared.state.read().await;
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": shared.started_at_unix,
        "uptime_secs": unix_seconds_now().saturating_sub(shared.started_at_unix),
        "pocket_mode": state.pocket_mode,
        "doze": state.doze,
    })
}

async fn wakeup_is_on(wakeup_node: Option<NodePath>) -> bool {
    let Some(path) = wakeup_node else {
        return false;
    };
    tokio::task::spawn_blocking(move || node::is_set(path.as_path()))
        .await
        .unwrap_or(false)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the stderr subscriber (`RUST_LOG`, default `info`). Also picks up
/// `log` records from the library crates. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shared(wakeup_node: Option<NodePath>) -> (Shared, broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        (
            Shared {
                state: Arc::new(RwLock::new(DaemonState::default())),
                wakeup_node,
                shutdown_tx,
                started_at_unix: unix_seconds_now(),
            },
            shutdown_rx,
        )
    }

    fn req(cmd: &str) -> DaemonRequest {
        DaemonRequest::new(cmd)
    }

    #[tokio::test]
    async fn screen_off_arms_when_wakeup_node_is_one() {
        let dir = TempDir::new().unwrap();
        let node_path = dir.path().join("enable_wakeup");
        fs::write(&node_path, "1\n").unwrap();
        let (shared, _rx) = shared(Some(NodePath::from(node_path.clone())));

        assert!(dispatch(&req("start"), &shared).await.ok);
        let toggle = DaemonRequest {
            enabled: Some(true),
            ..req("proximity")
        };
        assert!(dispatch(&toggle, &shared).await.ok);

        let off = dispatch(&req("screen_off"), &shared).await;
        assert_eq!(off.data.unwrap()["proximity_armed"], json!(true));
        let on = dispatch(&req("screen_on"), &shared).await;
        assert_eq!(on.data.unwrap()["proximity_armed"], json!(false));

        fs::write(&node_path, "0\n").unwrap();
        let off = dispatch(&req("screen_off"), &shared).await;
        assert_eq!(off.data.unwrap()["proximity_armed"], json!(false));
    }

    #[tokio::test]
    async fn proximity_without_flag_is_an_error() {
        let (shared, _rx) = shared(None);
        let response = dispatch(&req("proximity"), &shared).await;
        assert!(!response.ok);
    }

    #[tokio::test]
    async fn start_twice_reports_no_change() {
        let (shared, _rx) = shared(None);
        let first = dispatch(&req("start"), &shared).await;
        let second = dispatch(&req("start"), &shared).await;
        assert_eq!(first.data.unwrap()["changed"], json!(true));
        assert_eq!(second.data.unwrap()["changed"], json!(false));
    }

    #[tokio::test]
    async fn status_reports_services_and_shutdown_signals() {
        let (shared, mut rx) = shared(None);
        let doze = DaemonRequest {
            service: Some(Service::Doze),
            ..req("start")
        };
        dispatch(&doze, &shared).await;

        let status = dispatch(&req("status"), &shared).await.data.unwrap();
        assert_eq!(status["doze"], json!(true));
        assert_eq!(status["pocket_mode"]["running"], json!(false));

        assert!(dispatch(&req("shutdown"), &shared).await.ok);
        rx.recv().await.expect("shutdown signal");
    }

    #[tokio::test]
    async fn unknown_command_is_rejected() {
        let (shared, _rx) = shared(None);
        let response = dispatch(&req("reboot"), &shared).await;
        assert_eq!(response.error.as_deref(), Some("unknown command 'reboot'"));
    }

    #[test]
    fn live_socket_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("parts.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
        let err = prepare_socket_for_bind(&socket).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg.contains("already in use")));
        assert!(socket.exists());
    }

    #[tokio::test]
    async fn panicked_task_is_a_protocol_error() {
        let joined = tokio::spawn(async {
            if true {
                panic!("boom");
            }
            Ok::<(), DaemonError>(())
        })
        .await;
        let err = handle_join("socket_server", joined).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg.contains("socket_server")));
    }

    #[tokio::test]
    async fn socket_rejects_malformed_json_and_keeps_serving() {
        let dir = TempDir::new().unwrap();
        let (shared, _rx) = shared(None);
        let socket = socket_path(dir.path());
        fs::create_dir_all(run_dir(dir.path())).unwrap();
        let listener = UnixListener::bind(&socket).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_socket_client(stream, shared).await
        });

        let client = UnixStream::connect(&socket).await.unwrap();
        let (reader, mut writer) = client.into_split();
        writer.write_all(b"not json\n{\"cmd\":\"status\"}\n").await.unwrap();
        writer.shutdown().await.unwrap();
        let mut lines = BufReader::new(reader).lines();

        let bad: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(!bad.ok);
        assert!(bad.error.unwrap().contains("invalid request JSON"));
        let good: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(good.data.unwrap()["running"], json!(true));

        server.await.unwrap().unwrap();
    }

    #[test]
    fn stale_socket_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("parts.sock");
        fs::write(&socket, "").unwrap();
        prepare_socket_for_bind(&socket).unwrap();
        assert!(!socket.exists());
    }
}
