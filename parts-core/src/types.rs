//! Domain types shared by every parts crate.
//!
//! Node paths use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable via serde (YAML profile, JSON preference store).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed preference key (`fp_wakeup`, `fp_pocketmode`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrefKey(pub String);

impl PrefKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PrefKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrefKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Path of a kernel-exposed control node (sysfs / procfs text file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(pub PathBuf);

impl NodePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

impl From<PathBuf> for NodePath {
    fn from(p: PathBuf) -> Self {
        Self(p)
    }
}

impl From<&Path> for NodePath {
    fn from(p: &Path) -> Self {
        Self(p.to_path_buf())
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self(PathBuf::from(s))
    }
}

impl AsRef<Path> for NodePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A stored preference value. Switches hold booleans, list preferences hold text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Text(String),
}

impl PrefValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            PrefValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PrefValue::Bool(_) => None,
            PrefValue::Text(s) => Some(s),
        }
    }

    /// The token written to a node for this value: booleans as `1`/`0`,
    /// text verbatim.
    pub fn node_token(&self) -> String {
        match self {
            PrefValue::Bool(true) => "1".to_string(),
            PrefValue::Bool(false) => "0".to_string(),
            PrefValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefValue::Bool(b) => b.fmt(f),
            PrefValue::Text(s) => s.fmt(f),
        }
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        PrefValue::Bool(b)
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        PrefValue::Text(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Gates a preference's control on another node holding `required`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyBinding {
    pub node: NodePath,
    pub required: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(PrefKey::from("fp_wakeup").to_string(), "fp_wakeup");
        assert_eq!(
            NodePath::from("/proc/touchpanel/capacitive_keys_enable").to_string(),
            "/proc/touchpanel/capacitive_keys_enable"
        );
    }

    #[test]
    fn node_token_for_bools_and_text() {
        assert_eq!(PrefValue::Bool(true).node_token(), "1");
        assert_eq!(PrefValue::Bool(false).node_token(), "0");
        assert_eq!(PrefValue::from("back").node_token(), "back");
    }

    #[test]
    fn untagged_json_shapes() {
        let b: PrefValue = serde_json::from_str("true").expect("bool");
        assert_eq!(b, PrefValue::Bool(true));
        let t: PrefValue = serde_json::from_str(r#""home""#).expect("text");
        assert_eq!(t, PrefValue::Text("home".into()));
    }
}
