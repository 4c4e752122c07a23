use crate::{Block, BlockId, BlockPatch, BlockType, ChangePublisher};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with {status}: {message}")]
    Http { status: u16, message: String },
    #[error("block {0} not found")]
    NotFound(BlockId),
}

/// The block store on the other side of the wire
///
/// Every write receives the [`ChangePublisher`] of the caller and must
/// publish the blocks it changed once the server has accepted the write.
/// Implementations are cheap handles, the mutator clones one into every
/// recorded command.
pub trait ServerApi: Clone + Send + Sync + 'static {
    fn patch_block<P: ChangePublisher>(
        &self,
        block_id: &BlockId,
        patch: &BlockPatch,
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Apply `patches[i]` to `blocks[i]`
    fn patch_blocks<P: ChangePublisher>(
        &self,
        blocks: &[Block],
        patches: &[BlockPatch],
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Insert a block, returning the blocks as stored by the server
    ///
    /// The server may assign a new id, the first returned block is the
    /// inserted one.
    fn insert_block<P: ChangePublisher>(
        &self,
        block: &Block,
        publisher: &P,
    ) -> impl Future<Output = Result<Vec<Block>, ApiError>> + Send;

    fn insert_blocks<P: ChangePublisher>(
        &self,
        blocks: &[Block],
        publisher: &P,
    ) -> impl Future<Output = Result<Vec<Block>, ApiError>> + Send;

    fn delete_block<P: ChangePublisher>(
        &self,
        block_id: &BlockId,
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn delete_blocks<P: ChangePublisher>(
        &self,
        block_ids: &[BlockId],
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn follow_block(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        user_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn unfollow_block(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        user_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Fetch `root_id` and its descendants, `levels` deep
    fn get_subtree(
        &self,
        root_id: &BlockId,
        levels: u32,
    ) -> impl Future<Output = Result<Vec<Block>, ApiError>> + Send;
}
