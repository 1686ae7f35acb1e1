//! Service host daemon: pocket-mode proximity gate + doze flag behind a
//! JSON-lines Unix socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod state;

pub use error::DaemonError;
pub use protocol::{
    request_service, request_shutdown, request_status, send_request, DaemonRequest,
    DaemonResponse, SocketServiceControl,
};
pub use runtime::{init_tracing, run, start_blocking};
pub use state::{DaemonState, PocketModeService};
