use crate::Checkpoint;

/// A snapshot of the undo/redo affordances a UI would render
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    /// Description of the command the next [`undo`](crate::UndoManager::undo) reverts
    pub undo_description: Option<String>,
    /// Description of the command the next [`redo`](crate::UndoManager::redo) replays
    pub redo_description: Option<String>,
    pub current_checkpoint: Checkpoint,
}
