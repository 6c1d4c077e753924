//! Backup payload handle passed between pipeline stages.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

/// Opaque reference to backup payload data as it moves through a pipeline.
///
/// An artifact names the file currently holding the payload plus free-form
/// metadata that stages may annotate (for example the remote upload path).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Artifact {
    path: Utf8PathBuf,
    metadata: BTreeMap<String, String>,
}

impl Artifact {
    /// Creates an artifact pointing at `path` with no metadata.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Returns the file currently holding the payload.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the artifact re-pointed at `path`, keeping its metadata.
    #[must_use]
    pub fn relocated(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns the artifact with `key` set to `value`.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Looks up a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
