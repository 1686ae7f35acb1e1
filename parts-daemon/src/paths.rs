use std::path::{Path, PathBuf};

use parts_core::profile::parts_root_at;

pub const DAEMON_SOCKET: &str = "parts.sock";

pub fn run_dir(home: &Path) -> PathBuf {
    parts_root_at(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_SOCKET)
}
