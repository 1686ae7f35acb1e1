//! Start/stop surface for background services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Background services the parts can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// Proximity-gated fingerprint wakeup suppression.
    PocketMode,
    /// Ambient display gesture sensors.
    Doze,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::PocketMode => "pocket_mode",
            Service::Doze => "doze",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pocket_mode" | "pocketmode" => Ok(Service::PocketMode),
            "doze" => Ok(Service::Doze),
            other => Err(format!(
                "unknown service '{other}'; expected: pocket_mode, doze"
            )),
        }
    }
}

/// Delivers start/stop requests. Both requests must be idempotent: starting
/// a running service or stopping a stopped one is not an error.
pub trait ServiceControl: Send + Sync {
    fn start(&self, service: Service) -> Result<(), SyncError>;
    fn stop(&self, service: Service) -> Result<(), SyncError>;
}

/// Discards every request. Used for dry runs where the daemon must not be
/// contacted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoService;

impl ServiceControl for NoService {
    fn start(&self, service: Service) -> Result<(), SyncError> {
        tracing::debug!("start {service} discarded");
        Ok(())
    }

    fn stop(&self, service: Service) -> Result<(), SyncError> {
        tracing::debug!("stop {service} discarded");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every request in order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingService {
        pub(crate) calls: Mutex<Vec<(Service, bool)>>,
    }

    impl RecordingService {
        pub(crate) fn calls(&self) -> Vec<(Service, bool)> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl ServiceControl for RecordingService {
        fn start(&self, service: Service) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push((service, true));
            Ok(())
        }

        fn stop(&self, service: Service) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push((service, false));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_roundtrip() {
        for service in [Service::PocketMode, Service::Doze] {
            assert_eq!(service.as_str().parse::<Service>().unwrap(), service);
        }
        assert!("camera".parse::<Service>().is_err());
    }
}
