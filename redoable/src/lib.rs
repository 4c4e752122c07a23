//! Undoable edits to the blocks of a board
//!
//! A board is a tree of [`Block`]s (the board itself, its views, its cards
//! and their content) stored on a server. The [`Mutator`] turns every edit
//! into a write against a [`ServerApi`] and records how to reverse it in an
//! [`UndoManager`], so that edits can be undone and redone later, including
//! edits which created blocks the server assigned new ids to.
//!
//! ```rust,ignore
//! let mutator = Mutator::builder(api).with_publisher(publisher).build();
//!
//! mutator.change_title(&card.id, "Old", "New").await?;
//! mutator
//!     .perform_as_undo_group(|| async {
//!         mutator.delete_block(text.clone(), None, DeleteHooks::default()).await?;
//!         mutator.change_card_content_order(&card.id, &old_order, &new_order).await
//!     })
//!     .await?;
//!
//! mutator.undo().await?; // restores the text block and the old order
//! ```
mod block;
pub use block::{Block, BlockId, BlockType};
mod block_patch;
pub use block_patch::{BlockPatch, Patchable, create_patches};
pub mod board;
mod duplicate;
pub use duplicate::{DuplicatedTree, duplicate_block_tree};
mod error;
pub use error::MutatorError;
mod hook;
pub use hook::{DeleteHooks, Hook, InsertBlockHooks, InsertBlocksHooks, InsertHooks, hook};
mod mutator;
pub use mutator::{BlockChange, DuplicateOptions, GroupErrorPolicy, Mutator, MutatorBuilder};
pub use mutator::{property_value_change, view_card_order_change};
mod publisher;
pub use publisher::{ChangePublisher, NoopPublisher};
mod server_api;
pub use server_api::{ApiError, ServerApi};
pub mod view;

pub use redoable_core::{Checkpoint, GroupId, HistoryState, UndoManager, UndoManagerBuilder};
