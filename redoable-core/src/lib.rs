//! A history of asynchronous, reversible commands
//!
//! [`UndoManager`] records pairs of `redo`/`undo` actions as they are
//! performed and replays them on request. Actions are futures, typically
//! network round trips, and the value produced by a `redo` is handed back to
//! the matching `undo` so that server assigned identifiers can be compensated
//! correctly.
mod checkpoint;
pub use checkpoint::Checkpoint;
mod command;
mod group_id;
pub use group_id::GroupId;
mod history_state;
pub use history_state::HistoryState;
mod undo_manager;
pub use undo_manager::{UndoManager, UndoManagerBuilder};
mod unix_timestamp;
pub use unix_timestamp::UnixTimestamp;
