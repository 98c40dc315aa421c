use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ferrule_core::{Direction, SaveListener};
use tracing::{debug, info};

use crate::{Edit, HostEditor};

/// How [`FsHost::save_document`] behaves. Anything but `Normal` exists to
/// exercise the bridge's failure paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveBehaviour {
    #[default]
    Normal,
    /// Report failure without writing.
    Fail,
    /// Return an error without writing.
    Error,
    /// Never complete.
    Stall,
}

struct Step {
    content: Option<Vec<u8>>,
    label: Option<String>,
}

/// In-memory model of one document. `None` content means "does not exist".
struct Document {
    content: Option<Vec<u8>>,
    saved: Option<Vec<u8>>,
    undo: Vec<Step>,
    redo: Vec<Step>,
}

impl Document {
    fn loaded(disk: Option<Vec<u8>>) -> Self {
        Self {
            content: disk.clone(),
            saved: disk,
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    fn is_dirty(&self) -> bool {
        self.content != self.saved
    }

    fn stack_mut(&mut self, direction: Direction) -> &mut Vec<Step> {
        match direction {
            Direction::Undo => &mut self.undo,
            Direction::Redo => &mut self.redo,
        }
    }
}

#[derive(Default)]
struct HostState {
    docs: HashMap<PathBuf, Document>,
    visible: Vec<PathBuf>,
    active: Option<PathBuf>,
    caret: Option<(PathBuf, u32, u32)>,
}

/// A headless host editor over the local filesystem.
///
/// Keeps a document model with per-document native undo/redo, a list of
/// "visible editors" and an active editor, and writes to disk only on save.
/// A file that changed on disk while its document was clean is reloaded on
/// next access and reported to save listeners as a user save, since someone
/// other than the bridge wrote it.
#[derive(Default)]
pub struct FsHost {
    state: Mutex<HostState>,
    listeners: Mutex<Vec<Arc<dyn SaveListener>>>,
    save_behaviour: Mutex<SaveBehaviour>,
}

impl FsHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_save_behaviour(&self, behaviour: SaveBehaviour) {
        *self.save_behaviour.lock().unwrap_or_else(PoisonError::into_inner) = behaviour;
    }

    /// Where the last [`HostEditor::reveal`] put the caret.
    pub fn caret(&self) -> Option<(PathBuf, u32, u32)> {
        self.state().caret.clone()
    }

    pub fn visible_documents(&self) -> Vec<PathBuf> {
        self.state().visible.clone()
    }

    /// Close the editor for `path`, keeping its document model.
    pub fn close_document(&self, path: &Path) {
        let mut state = self.state();
        state.visible.retain(|p| p != path);
        if state.active.as_deref() == Some(path) {
            state.active = state.visible.last().cloned();
        }
    }

    fn notify_saved(&self, path: &Path) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.document_saved(path);
        }
    }

    /// Load the document model for `path`, or pick up an outside change.
    fn sync(&self, path: &Path) -> anyhow::Result<()> {
        let disk = ferrule_store::read_optional(path)?;
        let external = {
            let mut state = self.state();
            match state.docs.get_mut(path) {
                None => {
                    state.docs.insert(path.to_path_buf(), Document::loaded(disk));
                    false
                }
                Some(doc) if !doc.is_dirty() && doc.saved != disk => {
                    *doc = Document::loaded(disk);
                    true
                }
                Some(_) => false,
            }
        };
        if external {
            info!(path = %path.display(), "file changed outside the editor, reloaded");
            self.notify_saved(path);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HostEditor for FsHost {
    async fn read_file(&self, path: &Path) -> anyhow::Result<Option<Vec<u8>>> {
        ferrule_store::read_optional(path)
    }

    async fn apply_edit(&self, path: &Path, edit: Edit, label: Option<&str>) -> anyhow::Result<bool> {
        self.sync(path)?;
        let mut state = self.state();
        let doc = state
            .docs
            .get_mut(path)
            .ok_or_else(|| anyhow::anyhow!("no document for {}", path.display()))?;
        let next = match edit {
            Edit::ReplaceAll(text) => {
                if doc.content.is_none() {
                    return Ok(false);
                }
                Some(text.into_bytes())
            }
            Edit::Create(bytes) => {
                if doc.content.is_some() {
                    return Ok(false);
                }
                Some(bytes)
            }
            Edit::Delete => None,
            Edit::Untracked(content) => {
                doc.content = content;
                debug!(path = %path.display(), "untracked edit applied");
                return Ok(true);
            }
        };
        let previous = std::mem::replace(&mut doc.content, next);
        doc.undo.push(Step {
            content: previous,
            label: label.map(String::from),
        });
        doc.redo.clear();
        debug!(path = %path.display(), label = label.unwrap_or(""), "edit applied");
        Ok(true)
    }

    async fn save_document(&self, path: &Path) -> anyhow::Result<bool> {
        let behaviour = *self.save_behaviour.lock().unwrap_or_else(PoisonError::into_inner);
        match behaviour {
            SaveBehaviour::Normal => {}
            SaveBehaviour::Fail => return Ok(false),
            SaveBehaviour::Error => anyhow::bail!("save of {} failed", path.display()),
            SaveBehaviour::Stall => std::future::pending::<()>().await,
        }

        self.sync(path)?;
        {
            let mut state = self.state();
            let Some(doc) = state.docs.get_mut(path) else {
                return Ok(false);
            };
            if !doc.is_dirty() {
                return Ok(true);
            }
            match &doc.content {
                Some(bytes) => ferrule_store::write_atomic(path, bytes)?,
                None => {
                    ferrule_store::remove_if_exists(path)?;
                }
            }
            doc.saved = doc.content.clone();
        }
        self.notify_saved(path);
        Ok(true)
    }

    async fn show_document(&self, path: &Path) -> anyhow::Result<()> {
        self.sync(path)?;
        let mut state = self.state();
        if !state.visible.iter().any(|p| p == path) {
            state.visible.push(path.to_path_buf());
        }
        state.active = Some(path.to_path_buf());
        Ok(())
    }

    async fn native_undo_redo(&self, direction: Direction) -> anyhow::Result<()> {
        let active = self
            .active_document()
            .ok_or_else(|| anyhow::anyhow!("no active editor to {direction}"))?;
        self.sync(&active)?;
        let mut state = self.state();
        let doc = state
            .docs
            .get_mut(&active)
            .ok_or_else(|| anyhow::anyhow!("no document for {}", active.display()))?;
        let step = doc
            .stack_mut(direction)
            .pop()
            .ok_or_else(|| anyhow::anyhow!("nothing to {direction} in {}", active.display()))?;
        let current = std::mem::replace(&mut doc.content, step.content);
        doc.stack_mut(direction.opposite()).push(Step {
            content: current,
            label: step.label,
        });
        Ok(())
    }

    async fn reveal(&self, path: &Path, line: u32, column: u32) -> anyhow::Result<()> {
        self.show_document(path).await?;
        self.state().caret = Some((path.to_path_buf(), line, column));
        Ok(())
    }

    async fn refresh(&self) -> anyhow::Result<()> {
        let paths: Vec<PathBuf> = self.state().docs.keys().cloned().collect();
        for path in paths {
            self.sync(&path)?;
        }
        Ok(())
    }

    async fn focus_window(&self) -> anyhow::Result<()> {
        debug!("headless host has no window to focus");
        Ok(())
    }

    fn active_document(&self) -> Option<PathBuf> {
        self.state().active.clone()
    }

    fn is_document_visible(&self, path: &Path) -> bool {
        self.state().visible.iter().any(|p| p == path)
    }

    fn is_document_dirty(&self, path: &Path) -> bool {
        self.state().docs.get(path).is_some_and(Document::is_dirty)
    }

    fn subscribe_saves(&self, listener: Arc<dyn SaveListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[derive(Default)]
    struct CollectSaves {
        saved: Mutex<Vec<PathBuf>>,
    }

    impl SaveListener for CollectSaves {
        fn document_saved(&self, path: &Path) {
            self.saved.lock().unwrap().push(path.to_path_buf());
        }
    }

    fn setup() -> (tempfile::TempDir, FsHost, Arc<CollectSaves>) {
        let tmp = tempfile::tempdir().unwrap();
        let host = FsHost::new();
        let saves = Arc::new(CollectSaves::default());
        host.subscribe_saves(saves.clone());
        (tmp, host, saves)
    }

    #[tokio::test]
    async fn edits_reach_disk_only_on_save() {
        let (tmp, host, saves) = setup();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "old").unwrap();

        assert!(host
            .apply_edit(&path, Edit::ReplaceAll("new".into()), Some("Edit"))
            .await
            .unwrap());
        assert!(host.is_document_dirty(&path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");

        assert!(host.save_document(&path).await.unwrap());
        assert!(!host.is_document_dirty(&path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(saves.saved.lock().unwrap().as_slice(), &[path]);
    }

    #[tokio::test]
    async fn create_refuses_existing_and_replace_refuses_missing() {
        let (tmp, host, _) = setup();
        let existing = tmp.path().join("there.txt");
        fs::write(&existing, "x").unwrap();
        let missing = tmp.path().join("missing.txt");

        assert!(!host.apply_edit(&existing, Edit::Create(b"y".to_vec()), None).await.unwrap());
        assert!(!host
            .apply_edit(&missing, Edit::ReplaceAll("y".into()), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn native_undo_and_redo_on_active_editor() {
        let (tmp, host, _) = setup();
        let path = tmp.path().join("new.txt");

        host.apply_edit(&path, Edit::Create(b"A".to_vec()), None).await.unwrap();
        host.save_document(&path).await.unwrap();
        host.apply_edit(&path, Edit::ReplaceAll("B".into()), None).await.unwrap();
        host.save_document(&path).await.unwrap();

        host.show_document(&path).await.unwrap();
        host.native_undo_redo(Direction::Undo).await.unwrap();
        host.save_document(&path).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A");

        host.native_undo_redo(Direction::Undo).await.unwrap();
        host.save_document(&path).await.unwrap();
        assert!(!path.exists());

        host.native_undo_redo(Direction::Redo).await.unwrap();
        host.native_undo_redo(Direction::Redo).await.unwrap();
        host.save_document(&path).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "B");
    }

    #[tokio::test]
    async fn untracked_edits_stay_out_of_native_history() {
        let (tmp, host, _) = setup();
        let path = tmp.path().join("a.bin");
        fs::write(&path, "zero").unwrap();

        host.apply_edit(&path, Edit::ReplaceAll("A".into()), None).await.unwrap();
        host.save_document(&path).await.unwrap();
        host.apply_edit(&path, Edit::Untracked(Some(b"B".to_vec())), None).await.unwrap();
        host.apply_edit(&path, Edit::Untracked(Some(b"A".to_vec())), None).await.unwrap();
        host.save_document(&path).await.unwrap();

        host.show_document(&path).await.unwrap();
        host.native_undo_redo(Direction::Undo).await.unwrap();
        host.save_document(&path).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "zero");
        assert!(host.native_undo_redo(Direction::Undo).await.is_err());

        host.apply_edit(&path, Edit::Untracked(None), None).await.unwrap();
        host.save_document(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn native_undo_without_active_editor_fails() {
        let (_tmp, host, _) = setup();
        assert!(host.native_undo_redo(Direction::Undo).await.is_err());
    }

    #[tokio::test]
    async fn outside_change_is_reported_as_save() {
        let (tmp, host, saves) = setup();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "one").unwrap();
        host.show_document(&path).await.unwrap();
        assert!(saves.saved.lock().unwrap().is_empty());

        fs::write(&path, "two").unwrap();
        host.refresh().await.unwrap();
        assert_eq!(saves.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_saves_leave_disk_alone() {
        let (tmp, host, saves) = setup();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "one").unwrap();
        host.apply_edit(&path, Edit::Untracked(Some(b"two".to_vec())), None).await.unwrap();

        host.set_save_behaviour(SaveBehaviour::Fail);
        assert!(!host.save_document(&path).await.unwrap());
        host.set_save_behaviour(SaveBehaviour::Error);
        assert!(host.save_document(&path).await.is_err());
        host.set_save_behaviour(SaveBehaviour::Stall);
        let stalled = tokio::time::timeout(Duration::from_millis(50), host.save_document(&path)).await;
        assert!(stalled.is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), "one");
        assert!(saves.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reveal_sets_caret_and_activates() {
        let (tmp, host, _) = setup();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        host.reveal(&path, 3, 7).await.unwrap();
        assert_eq!(host.caret(), Some((path.clone(), 3, 7)));
        assert_eq!(host.active_document(), Some(path.clone()));
        assert_eq!(host.visible_documents(), vec![path.clone()]);

        host.close_document(&path);
        assert!(!host.is_document_visible(&path));
        assert_eq!(host.active_document(), None);
    }
}
