use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Canonical absolute path of a project file. Identity for all per-file state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentKey(PathBuf);

impl DocumentKey {
    /// Wrap a path that is already canonical.
    ///
    /// Keys handed to the coordinator must come from [`crate::ProjectRoot::resolve`]
    /// or from a host that reports the same paths it was given.
    pub fn from_canonical(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for DocumentKey {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Undo or redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Undo,
    Redo,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Undo => Direction::Redo,
            Direction::Redo => Direction::Undo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Undo => "undo",
            Direction::Redo => "redo",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer for document saves performed by the host editor.
///
/// The host must call this synchronously from inside its save, before the
/// save returns, so that a save the bridge itself started is still seen
/// while the document is marked as locked.
pub trait SaveListener: Send + Sync {
    fn document_saved(&self, path: &Path);
}
