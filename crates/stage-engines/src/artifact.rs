//! Typed artifacts and the channels that group them.
//!
//! Storage is an opaque hierarchical path namespace. A split-aware artifact
//! lives at `<base>/<split>/`, an unsplit one at `<base>/`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// One concrete, stored unit of data or model state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Semantic kind (e.g., "Examples", "TransformGraph").
    #[serde(rename = "type")]
    pub type_name: String,

    /// Storage location. Empty only while the artifact is an unresolved
    /// output placeholder.
    #[serde(default)]
    pub uri: String,

    /// Split label (e.g., "train"). `None` is an unpartitioned artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
}

/// Ordered group of artifacts sharing one declared name.
pub type Channel = Vec<Artifact>;

/// Channels keyed by their declared name.
pub type ArtifactMap = BTreeMap<String, Channel>;

impl Artifact {
    /// Create an unresolved, unsplit artifact of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            uri: String::new(),
            split: None,
        }
    }

    /// Set the split label.
    pub fn with_split(mut self, split: Option<String>) -> Self {
        self.split = split;
        self
    }

    /// Set the storage location.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Returns true once a storage location has been assigned.
    pub fn is_resolved(&self) -> bool {
        !self.uri.is_empty()
    }

    /// Split label, with the empty string standing for "no split".
    pub fn split_name(&self) -> &str {
        self.split.as_deref().unwrap_or("")
    }

    /// Storage location as a path.
    pub fn path(&self) -> &Path {
        Path::new(&self.uri)
    }
}

/// Split labels of a channel, in channel order.
pub fn channel_splits(channel: &[Artifact]) -> Vec<Option<String>> {
    channel.iter().map(|a| a.split.clone()).collect()
}

/// Find the artifact carrying `split` in a channel.
pub fn find_split<'a>(channel: &'a [Artifact], split: &str) -> Option<&'a Artifact> {
    channel.iter().find(|a| a.split.as_deref() == Some(split))
}

/// Absolute form of `path` with trailing separators removed.
///
/// Lexical only: the path does not need to exist and symlinks are kept.
pub fn absolute_location(path: &Path) -> io::Result<String> {
    let abs = std::path::absolute(path)?;
    let s = abs.to_string_lossy();
    let trimmed = s.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Absolute directory URI of `path`, ending in exactly one `/`.
pub fn directory_uri(path: &Path) -> io::Result<String> {
    let location = absolute_location(path)?;
    if location == "/" {
        return Ok(location);
    }
    Ok(format!("{}/", location))
}
