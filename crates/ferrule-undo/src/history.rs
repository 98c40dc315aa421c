use ferrule_core::Direction;
use serde::Serialize;

/// Per-document ledger entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UndoState {
    /// Bridge edits that can currently be undone.
    pub undo_count: u32,
    /// Bridge edits that can currently be redone.
    pub redo_count: u32,
    /// Set while a bridge-initiated save is in flight.
    pub locked: bool,
}

impl UndoState {
    pub fn count(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Undo => self.undo_count,
            Direction::Redo => self.redo_count,
        }
    }

    fn count_mut(&mut self, direction: Direction) -> &mut u32 {
        match direction {
            Direction::Undo => &mut self.undo_count,
            Direction::Redo => &mut self.redo_count,
        }
    }

    pub(crate) fn record_write(&mut self) {
        self.undo_count += 1;
        self.redo_count = 0;
    }

    /// Move one step from `direction`'s count to the opposite one.
    /// Returns false (and changes nothing) if there was no step to move.
    pub(crate) fn record_step(&mut self, direction: Direction) -> bool {
        let source = self.count_mut(direction);
        if *source == 0 {
            return false;
        }
        *source -= 1;
        *self.count_mut(direction.opposite()) += 1;
        true
    }

    pub(crate) fn clear_counts(&mut self) {
        self.undo_count = 0;
        self.redo_count = 0;
    }
}

/// Content of a binary file at one point in time. `None` means the file did
/// not exist.
pub type Snapshot = Option<Vec<u8>>;

/// One entry on a document's step stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStep {
    /// Held by the host's native history; undone with a native undo/redo.
    Native,
    /// Restored by the bridge itself by writing the snapshot back.
    Binary(Snapshot),
}

/// Step stacks for a document that has seen at least one binary write,
/// most recent last.
///
/// Binary steps never enter the host's native history, so the stacks also
/// mark where native steps sit. That keeps undo and redo in order when text
/// and binary writes are mixed on one document. Native steps older than the
/// first binary write are not listed; an empty stack falls through to the
/// native history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryHistory {
    undo_stack: Vec<HistoryStep>,
    redo_stack: Vec<HistoryStep>,
}

impl BinaryHistory {
    pub fn undo_stack(&self) -> &[HistoryStep] {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &[HistoryStep] {
        &self.redo_stack
    }

    fn stack(&self, direction: Direction) -> &Vec<HistoryStep> {
        match direction {
            Direction::Undo => &self.undo_stack,
            Direction::Redo => &self.redo_stack,
        }
    }

    fn stack_mut(&mut self, direction: Direction) -> &mut Vec<HistoryStep> {
        match direction {
            Direction::Undo => &mut self.undo_stack,
            Direction::Redo => &mut self.redo_stack,
        }
    }

    /// The step an undo (or redo) would take.
    pub fn peek(&self, direction: Direction) -> Option<&HistoryStep> {
        self.stack(direction).last()
    }

    /// The snapshot an undo (or redo) would restore, if the next step is binary.
    pub fn peek_snapshot(&self, direction: Direction) -> Option<&Snapshot> {
        match self.peek(direction) {
            Some(HistoryStep::Binary(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    /// A binary write replaced `previous`: push it and drop the redo branch.
    pub(crate) fn record_write(&mut self, previous: Snapshot) {
        self.undo_stack.push(HistoryStep::Binary(previous));
        self.redo_stack.clear();
    }

    /// A text write went into the native history.
    pub(crate) fn record_native_write(&mut self) {
        self.undo_stack.push(HistoryStep::Native);
        self.redo_stack.clear();
    }

    /// An undo (or redo) restored the binary step on top of its stack while
    /// the file held `current`. Pops the restored snapshot and keeps `current`
    /// so the step can be reversed. `None` if the top is not a binary step.
    pub(crate) fn record_restore(&mut self, direction: Direction, current: Snapshot) -> Option<Snapshot> {
        let HistoryStep::Binary(_) = self.stack(direction).last()? else {
            return None;
        };
        let Some(HistoryStep::Binary(restored)) = self.stack_mut(direction).pop() else {
            return None;
        };
        self.stack_mut(direction.opposite()).push(HistoryStep::Binary(current));
        Some(restored)
    }

    /// A native undo (or redo) ran. Moves the native marker across, or adds
    /// one for a native step older than this history. False, with nothing
    /// changed, if a binary step was due instead.
    pub(crate) fn record_native_step(&mut self, direction: Direction) -> bool {
        match self.stack(direction).last() {
            Some(HistoryStep::Binary(_)) => false,
            Some(HistoryStep::Native) | None => {
                self.stack_mut(direction).pop();
                self.stack_mut(direction.opposite()).push(HistoryStep::Native);
                true
            }
        }
    }
}
