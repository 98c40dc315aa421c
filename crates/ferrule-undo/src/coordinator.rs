use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ferrule_core::{Direction, DocumentKey, SaveListener};
use tracing::{debug, error, warn};

use crate::history::{BinaryHistory, Snapshot, UndoState};

#[derive(Default)]
struct Ledger {
    states: HashMap<DocumentKey, UndoState>,
    binary: HashMap<DocumentKey, BinaryHistory>,
}

/// Sole authority on whether a bridge undo/redo may run for a document.
///
/// Two separate primitives live here:
///
/// - the `locked` flag in [`UndoState`], which tells a save the bridge caused
///   apart from a save the user made ([`Coordinator::suppress_saves`]);
/// - a real async mutex per document ([`Coordinator::acquire`]) that
///   serializes bridge operations on the same file in arrival order.
///
/// All ledger methods are synchronous and never block on I/O.
#[derive(Default)]
pub struct Coordinator {
    ledger: Mutex<Ledger>,
    documents: Mutex<HashMap<DocumentKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Exclusive access to one document for the duration of a bridge operation.
pub struct DocumentGuard {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

/// Marks a document as locked for exactly one bridge save. Unlocks on drop,
/// so the flag is released on every exit path including errors and timeouts.
pub struct SaveScope<'a> {
    coordinator: &'a Coordinator,
    key: DocumentKey,
}

impl Drop for SaveScope<'_> {
    fn drop(&mut self) {
        self.coordinator.unlock(&self.key);
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Mutual exclusion ──

    /// Wait for exclusive access to `key`. Waiters are served first come, first served.
    pub async fn acquire(&self, key: &DocumentKey) -> DocumentGuard {
        let mutex = {
            let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
            prune_idle(&mut documents);
            documents.entry(key.clone()).or_default().clone()
        };
        DocumentGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    // ── Lock flag ──

    pub fn lock(&self, key: &DocumentKey) {
        let mut ledger = self.ledger();
        let state = ledger.states.entry(key.clone()).or_default();
        if state.locked {
            warn!(document = %key, "already locked");
            return;
        }
        state.locked = true;
    }

    pub fn unlock(&self, key: &DocumentKey) {
        let mut ledger = self.ledger();
        match ledger.states.get_mut(key) {
            Some(state) if state.locked => state.locked = false,
            _ => warn!(document = %key, "not locked"),
        }
    }

    pub fn is_locked(&self, key: &DocumentKey) -> bool {
        self.ledger().states.get(key).is_some_and(|s| s.locked)
    }

    /// Lock `key` until the returned scope is dropped.
    pub fn suppress_saves(&self, key: &DocumentKey) -> SaveScope<'_> {
        self.lock(key);
        SaveScope {
            coordinator: self,
            key: key.clone(),
        }
    }

    // ── Ledger transitions ──

    /// A save the bridge did not cause. The host's native history has moved
    /// on without us, so everything tracked for the document is dropped.
    pub fn on_human_save(&self, key: &DocumentKey) {
        let mut ledger = self.ledger();
        if let Some(state) = ledger.states.get_mut(key) {
            if state.locked {
                debug!(document = %key, "save during bridge operation, ledger kept");
                return;
            }
            if state.undo_count > 0 || state.redo_count > 0 {
                debug!(document = %key, "user save, bridge history dropped");
            }
            state.clear_counts();
        }
        ledger.binary.remove(key);
    }

    /// Called after a bridge write was saved.
    pub fn on_bridge_write(&self, key: &DocumentKey) {
        self.ledger().states.entry(key.clone()).or_default().record_write();
    }

    /// Called after the content restored by a bridge undo/redo was saved.
    pub fn on_bridge_undo_redo_performed(&self, key: &DocumentKey, direction: Direction) {
        let moved = self
            .ledger()
            .states
            .entry(key.clone())
            .or_default()
            .record_step(direction);
        if !moved {
            error!(document = %key, %direction, "{direction} recorded with nothing to {direction}");
            debug_assert!(moved, "{direction} count would go negative for {key}");
        }
    }

    pub fn can_perform(&self, key: &DocumentKey, direction: Direction) -> bool {
        self.ledger()
            .states
            .get(key)
            .is_some_and(|s| s.count(direction) > 0)
    }

    /// Current `(undo_count, redo_count, locked)` for `key`; all zero if never written.
    pub fn state(&self, key: &DocumentKey) -> UndoState {
        self.ledger().states.get(key).copied().unwrap_or_default()
    }

    // ── Binary snapshots ──

    pub fn binary_history(&self, key: &DocumentKey) -> Option<BinaryHistory> {
        self.ledger().binary.get(key).cloned()
    }

    /// The snapshot an undo/redo of `key` would restore, if it is a binary step.
    pub fn peek_snapshot(&self, key: &DocumentKey, direction: Direction) -> Option<Snapshot> {
        self.ledger()
            .binary
            .get(key)
            .and_then(|h| h.peek_snapshot(direction))
            .cloned()
    }

    /// A binary write replaced `previous`.
    pub fn record_binary_write(&self, key: &DocumentKey, previous: Snapshot) {
        self.ledger()
            .binary
            .entry(key.clone())
            .or_default()
            .record_write(previous);
    }

    /// A binary undo/redo restored the top of its stack; `current` is what the
    /// file held just before.
    pub fn record_binary_restore(&self, key: &DocumentKey, direction: Direction, current: Snapshot) {
        let mut ledger = self.ledger();
        let restored = ledger
            .binary
            .get_mut(key)
            .and_then(|h| h.record_restore(direction, current));
        if restored.is_none() {
            error!(document = %key, %direction, "binary {direction} recorded on an empty stack");
        }
    }

    /// A text write to `key` went into the native history.
    pub fn record_native_write(&self, key: &DocumentKey) {
        if let Some(history) = self.ledger().binary.get_mut(key) {
            history.record_native_write();
        }
    }

    /// A native undo/redo of `key` was saved.
    pub fn record_native_step(&self, key: &DocumentKey, direction: Direction) {
        let mut ledger = self.ledger();
        let Some(history) = ledger.binary.get_mut(key) else {
            return;
        };
        if !history.record_native_step(direction) {
            error!(document = %key, %direction, "native {direction} recorded while a binary step was due");
        }
    }

    /// Forget everything. Locks held by in-flight operations are forgotten too.
    pub fn reset(&self) {
        let mut ledger = self.ledger();
        ledger.states.clear();
        ledger.binary.clear();
        drop(ledger);
        prune_idle(&mut self.documents.lock().unwrap_or_else(PoisonError::into_inner));
    }

    #[cfg(test)]
    fn document_slots(&self) -> usize {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Drop per-document mutexes nobody holds or waits on.
fn prune_idle(documents: &mut HashMap<DocumentKey, Arc<tokio::sync::Mutex<()>>>) {
    documents.retain(|_, mutex| Arc::strong_count(mutex) > 1);
}

impl SaveListener for Coordinator {
    fn document_saved(&self, path: &Path) {
        self.on_human_save(&DocumentKey::from_canonical(path));
    }
}
