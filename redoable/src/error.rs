use crate::{ApiError, BlockId};

#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("new and old blocks must have the same length, got {new} new and {old} old")]
    MismatchedBlockCount { new: usize, old: usize },
    #[error("cannot find property with id {0}")]
    PropertyNotFound(String),
    #[error("block {0} is not part of the fetched subtree")]
    BlockNotInTree(BlockId),
    #[error("malformed block fields: {0}")]
    InvalidFields(#[from] serde_json::Error),
    #[error("the server returned no blocks for an insert")]
    EmptyInsert,
    #[error("hook failed: {0}")]
    Hook(String),
}
