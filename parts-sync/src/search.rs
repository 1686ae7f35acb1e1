//! Search-index provider: which screens and keys settings search may show.

use std::collections::BTreeSet;
use std::path::Path;

use parts_core::{DeviceProfile, PrefKey};

use crate::error::{io_err, SyncError};
use crate::node;

/// Indexable screen name for the button panel.
pub const BUTTON_PANEL: &str = "button_panel";

/// Answers "is this package installed?".
pub trait PackageQuery {
    fn is_installed(&self, package: &str) -> bool;
}

/// Installed packages from a `packages.list`-format file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagesList {
    names: BTreeSet<String>,
}

impl PackagesList {
    /// Parse `path`. The first whitespace-separated token on each line is
    /// the package name. A missing file means nothing is installed.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found; assuming no packages", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(io_err(path, e)),
        };
        let names = contents
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect();
        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl PackageQuery for PackagesList {
    fn is_installed(&self, package: &str) -> bool {
        self.names.contains(package)
    }
}

/// `true` when at least one button presence node exists.
pub fn has_button_nodes(profile: &DeviceProfile) -> bool {
    profile
        .buttons
        .presence_nodes
        .iter()
        .any(|n| node::exists(n.as_path()))
}

/// Keys to hide from settings search.
pub fn non_indexable_keys(profile: &DeviceProfile, packages: &dyn PackageQuery) -> Vec<PrefKey> {
    let mut keys = Vec::new();
    if !packages.is_installed(&profile.pocket.package) {
        keys.push(profile.pocket.pocket_mode_key.clone());
    }
    if !has_button_nodes(profile) {
        keys.extend(profile.search.node_gated_keys.iter().cloned());
    }
    keys
}

/// Screens settings search may index.
pub fn indexable_screens(profile: &DeviceProfile) -> Vec<&'static str> {
    if has_button_nodes(profile) {
        vec![BUTTON_PANEL]
    } else {
        vec![]
    }
}
