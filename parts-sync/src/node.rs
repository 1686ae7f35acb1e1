//! Node accessor: single-line reads and writes of kernel control files.
//!
//! Nodes are owned by the kernel driver: writes open the file without
//! `create`, so a missing node is reported, never created. There are no
//! retries and no timeouts.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;

use crate::error::{io_err, SyncError};

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn is_readable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if !meta.is_dir() => File::open(path).is_ok(),
        _ => false,
    }
}

pub fn is_writable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if !meta.is_dir() && !meta.permissions().readonly() => {
            OpenOptions::new().write(true).open(path).is_ok()
        }
        _ => false,
    }
}

/// Read the first line of `path`, trimmed.
pub fn read_line(path: &Path) -> Result<String, SyncError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SyncError::NodeMissing {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => SyncError::NodeUnreadable {
            path: path.to_path_buf(),
        },
        _ => io_err(path, e),
    })?;

    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| io_err(path, e))?;
    Ok(line.trim().to_string())
}

/// `true` when `path` is readable and holds `1`.
pub fn is_set(path: &Path) -> bool {
    is_readable(path) && matches!(read_line(path).as_deref(), Ok("1"))
}

/// Write `value` to `path`, classifying the failure.
pub fn try_write_line(path: &Path, value: &str) -> Result<(), SyncError> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => SyncError::NodeMissing {
                path: path.to_path_buf(),
            },
            ErrorKind::PermissionDenied => SyncError::NodeUnwritable {
                path: path.to_path_buf(),
            },
            _ => io_err(path, e),
        })?;

    file.write_all(value.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|source| SyncError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `value` to `path`. Failures are logged and reported as `false`,
/// never raised.
pub fn write_line(path: &Path, value: &str) -> bool {
    match try_write_line(path, value) {
        Ok(()) => {
            tracing::debug!("wrote '{}' to {}", value, path.display());
            true
        }
        Err(err) => {
            tracing::warn!("{err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_line_trims_first_line() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("enable_wakeup");
        fs::write(&node, "1\nignored\n").unwrap();
        assert_eq!(read_line(&node).unwrap(), "1");
    }

    #[test]
    fn missing_node_is_classified() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("absent");
        assert!(!exists(&node));
        assert!(!is_readable(&node));
        assert!(!is_writable(&node));
        assert!(matches!(read_line(&node), Err(SyncError::NodeMissing { .. })));
        assert!(matches!(
            try_write_line(&node, "1"),
            Err(SyncError::NodeMissing { .. })
        ));
    }

    #[test]
    fn write_never_creates_a_node() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("absent");
        assert!(!write_line(&node, "1"));
        assert!(!node.exists());
    }

    #[test]
    fn write_replaces_previous_value() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("enable_key_events");
        fs::write(&node, "0\n").unwrap();
        assert!(write_line(&node, "1"));
        assert_eq!(read_line(&node).unwrap(), "1");
        assert!(write_line(&node, "0"));
        assert_eq!(fs::read_to_string(&node).unwrap(), "0");
    }

    #[test]
    fn directory_is_neither_readable_nor_writable() {
        let tmp = TempDir::new().unwrap();
        assert!(exists(tmp.path()));
        assert!(!is_readable(tmp.path()));
        assert!(!is_writable(tmp.path()));
        assert!(!write_line(tmp.path(), "1"));
    }

    #[cfg(unix)]
    #[test]
    fn readonly_bits_mean_unwritable() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("ro");
        fs::write(&node, "1").unwrap();
        fs::set_permissions(&node, fs::Permissions::from_mode(0o444)).unwrap();
        assert!(is_readable(&node));
        assert!(!is_writable(&node));
    }

    #[test]
    fn is_set_only_for_one() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("flag");
        fs::write(&node, "1\n").unwrap();
        assert!(is_set(&node));
        fs::write(&node, "0\n").unwrap();
        assert!(!is_set(&node));
        assert!(!is_set(&tmp.path().join("absent")));
    }
}
