//! The host editor as seen by the bridge.
//!
//! The bridge never writes project files directly. Every change goes through
//! the host's edit transaction and save path, so the host's own undo UI and
//! save notifications stay in the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ferrule_core::{Direction, SaveListener};

mod fs_host;

pub use fs_host::{FsHost, SaveBehaviour};

/// One edit applied through the host's edit transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace the whole text of an existing document.
    ReplaceAll(String),
    /// Create a document that does not exist yet.
    Create(Vec<u8>),
    /// Remove the document. Takes effect on disk at the next save.
    Delete,
    /// Set the content byte for byte, or remove the document with `None`,
    /// without adding a step to the native undo history. Binary content,
    /// which the native history cannot hold, goes through here.
    Untracked(Option<Vec<u8>>),
}

/// Operations the bridge consumes from the host editor. All of them may be
/// slow or fail; callers bound and log them.
#[async_trait::async_trait]
pub trait HostEditor: Send + Sync {
    /// Current bytes on disk, `None` if the file does not exist.
    async fn read_file(&self, path: &Path) -> anyhow::Result<Option<Vec<u8>>>;

    /// Apply `edit` as a single undoable step labelled `label`.
    /// Returns false if the host refused the edit.
    async fn apply_edit(&self, path: &Path, edit: Edit, label: Option<&str>) -> anyhow::Result<bool>;

    /// Save the document through the host's save path. Returns false on failure.
    /// Save listeners must be notified before this returns.
    async fn save_document(&self, path: &Path) -> anyhow::Result<bool>;

    /// Open the document in a non-preview editor and make it active.
    async fn show_document(&self, path: &Path) -> anyhow::Result<()>;

    /// Run the host's own undo or redo on the active editor.
    async fn native_undo_redo(&self, direction: Direction) -> anyhow::Result<()>;

    /// Show the document with the caret at `line`/`column` (zero based).
    async fn reveal(&self, path: &Path, line: u32, column: u32) -> anyhow::Result<()>;

    /// Resynchronize the document model with what is on disk.
    async fn refresh(&self) -> anyhow::Result<()>;

    /// Bring the host window to the front.
    async fn focus_window(&self) -> anyhow::Result<()>;

    fn active_document(&self) -> Option<PathBuf>;

    fn is_document_visible(&self, path: &Path) -> bool;

    fn is_document_dirty(&self, path: &Path) -> bool;

    /// Register for save notifications, both bridge and user caused.
    fn subscribe_saves(&self, listener: Arc<dyn SaveListener>);
}
