use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parts_sync::{Service, ServiceControl, SyncError};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// JSON newline-delimited request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl DaemonRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            service: None,
            enabled: None,
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Status with a short retry window for a daemon that is still binding.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new("status");

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_shutdown(home: &Path) -> Result<(), DaemonError> {
    let response = send_request(home, &DaemonRequest::new("shutdown"))?;
    response_into_data(response).map(|_| ())
}

/// `start` or `stop` one service.
pub fn request_service(home: &Path, service: Service, start: bool) -> Result<Value, DaemonError> {
    let request = DaemonRequest {
        service: Some(service),
        ..DaemonRequest::new(if start { "start" } else { "stop" })
    };
    response_into_data(send_request(home, &request)?)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}

/// [`ServiceControl`] backed by the daemon socket under `home`.
#[derive(Debug, Clone)]
pub struct SocketServiceControl {
    home: PathBuf,
}

impl SocketServiceControl {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    fn send(&self, service: Service, start: bool) -> Result<(), SyncError> {
        request_service(&self.home, service, start)
            .map(|_| ())
            .map_err(|err| SyncError::Service(err.to_string()))
    }
}

impl ServiceControl for SocketServiceControl {
    fn start(&self, service: Service) -> Result<(), SyncError> {
        self.send(service, true)
    }

    fn stop(&self, service: Service) -> Result<(), SyncError> {
        self.send(service, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn request_omits_unset_fields() {
        let encoded = serde_json::to_string(&DaemonRequest::new("status")).unwrap();
        assert_eq!(encoded, r#"{"cmd":"status"}"#);

        let decoded: DaemonRequest =
            serde_json::from_str(r#"{"cmd":"start","service":"pocket_mode"}"#).unwrap();
        assert_eq!(decoded.service, Some(Service::PocketMode));
        assert_eq!(decoded.enabled, None);
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = response_into_data(DaemonResponse::error("unknown command 'x'")).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg == "unknown command 'x'"));

        let bare = DaemonResponse {
            ok: false,
            data: None,
            error: None,
        };
        let err = response_into_data(bare).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg == "unknown daemon error"));
        assert_eq!(
            response_into_data(DaemonResponse { ok: true, data: None, error: None }).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn missing_socket_is_not_running() {
        let home = TempDir::new().unwrap();
        let err = send_request(home.path(), &DaemonRequest::new("status")).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }

    #[test]
    fn socket_control_reports_service_error_without_daemon() {
        let home = TempDir::new().unwrap();
        let control = SocketServiceControl::new(home.path());
        let err = control.start(Service::PocketMode).unwrap_err();
        assert!(matches!(err, SyncError::Service(msg) if msg.contains("not running")));
    }
}
