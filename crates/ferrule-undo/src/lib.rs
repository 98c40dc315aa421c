//! Bookkeeping for bridge-attributable undo/redo.
//!
//! The [`Coordinator`] decides whether an undo or redo requested by the bridge
//! may proceed, and keeps manual snapshot stacks for binary files. It never
//! touches file content itself.

pub mod coordinator;
pub mod history;

pub use coordinator::{Coordinator, DocumentGuard, SaveScope};
pub use history::{BinaryHistory, HistoryStep, Snapshot, UndoState};
