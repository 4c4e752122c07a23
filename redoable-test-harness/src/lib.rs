//! An in-memory stand-in for the block server
//!
//! [`FakeServer`] behaves like the real server in the ways that matter to
//! undo and redo: inserted blocks always get a fresh id, writes to missing
//! blocks fail, and every write is published. Ids are drawn from a seeded RNG
//! so test runs are reproducible.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use futures::future::ready;
use rand::{Rng, SeedableRng, rngs::StdRng};
use redoable::{ApiError, Block, BlockId, BlockPatch, BlockType, ChangePublisher, ServerApi};

/// A call made to the [`FakeServer`], in the order they were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    PatchBlock(BlockId),
    PatchBlocks(Vec<BlockId>),
    InsertBlock(BlockId),
    InsertBlocks(Vec<BlockId>),
    DeleteBlock(BlockId),
    DeleteBlocks(Vec<BlockId>),
    FollowBlock(BlockId),
    UnfollowBlock(BlockId),
    GetSubtree(BlockId),
}

#[derive(Clone)]
pub struct FakeServer {
    inner: Arc<Mutex<State>>,
}

struct State {
    blocks: Vec<Block>,
    rng: StdRng,
    calls: Vec<ApiCall>,
    failures: VecDeque<ApiError>,
    following: HashSet<(BlockId, String)>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        FakeServer {
            inner: Arc::new(Mutex::new(State {
                blocks: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
                calls: Vec::new(),
                failures: VecDeque::new(),
                following: HashSet::new(),
            })),
        }
    }

    /// Store `blocks` with the ids they already have
    pub fn seed<I: IntoIterator<Item = Block>>(&self, blocks: I) {
        let mut state = self.inner.lock().unwrap();
        for block in blocks {
            state.blocks.retain(|b| b.id != block.id);
            state.blocks.push(block);
        }
    }

    pub fn block(&self, id: &BlockId) -> Option<Block> {
        self.inner.lock().unwrap().find(id).cloned()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.inner.lock().unwrap().blocks.clone()
    }

    pub fn blocks_of_type(&self, block_type: BlockType) -> Vec<Block> {
        self.inner
            .lock()
            .unwrap()
            .blocks
            .iter()
            .filter(|b| b.block_type == block_type)
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Make the next call, whatever it is, fail with `error` without effect
    pub fn fail_next(&self, error: ApiError) {
        self.inner.lock().unwrap().failures.push_back(error);
    }

    pub fn is_following(&self, block_id: &BlockId, user_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .following
            .contains(&(block_id.clone(), user_id.to_string()))
    }

    /// Record `call` and run `f` against the state unless a failure was queued
    fn call<T>(
        &self,
        call: ApiCall,
        f: impl FnOnce(&mut State) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut state = self.inner.lock().unwrap();
        tracing::trace!(?call, "fake server call");
        state.calls.push(call);
        if let Some(error) = state.failures.pop_front() {
            tracing::debug!(%error, "failing call as requested");
            return Err(error);
        }
        f(&mut *state)
    }
}

impl State {
    fn find(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    fn find_mut(&mut self, id: &BlockId) -> Result<&mut Block, ApiError> {
        self.blocks
            .iter_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| ApiError::NotFound(id.clone()))
    }

    fn fresh_id(&mut self) -> BlockId {
        BlockId::from(format!("block-{:016x}", self.rng.random::<u64>()))
    }

    fn patch(&mut self, id: &BlockId, patch: &BlockPatch) -> Result<Block, ApiError> {
        let block = self.find_mut(id)?;
        block.apply_patch(patch).map_err(|e| ApiError::Http {
            status: 400,
            message: e.to_string(),
        })?;
        Ok(block.clone())
    }

    /// Store copies of `blocks` under fresh ids, pointing parents and roots
    /// inside the batch at the new ids
    fn insert(&mut self, blocks: &[Block]) -> Vec<Block> {
        let ids: HashMap<BlockId, BlockId> = blocks
            .iter()
            .map(|b| (b.id.clone(), self.fresh_id()))
            .collect();
        let inserted: Vec<Block> = blocks
            .iter()
            .map(|block| {
                let mut stored = block.clone();
                stored.id = ids[&block.id].clone();
                if let Some(parent) = ids.get(&block.parent_id) {
                    stored.parent_id = parent.clone();
                }
                if let Some(root) = ids.get(&block.root_id) {
                    stored.root_id = root.clone();
                }
                stored
            })
            .collect();
        self.blocks.extend(inserted.iter().cloned());
        inserted
    }

    fn delete(&mut self, id: &BlockId) -> Result<Block, ApiError> {
        let index = self
            .blocks
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ApiError::NotFound(id.clone()))?;
        let mut removed = self.blocks.remove(index);
        removed.deleted_at = 1;
        Ok(removed)
    }
}

impl ServerApi for FakeServer {
    fn patch_block<P: ChangePublisher>(
        &self,
        block_id: &BlockId,
        patch: &BlockPatch,
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let result = self.call(ApiCall::PatchBlock(block_id.clone()), |state| {
            state.patch(block_id, patch)
        });
        ready(result.map(|block| publisher.publish(&[block])))
    }

    fn patch_blocks<P: ChangePublisher>(
        &self,
        blocks: &[Block],
        patches: &[BlockPatch],
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let ids: Vec<BlockId> = blocks.iter().map(|b| b.id.clone()).collect();
        let result = self.call(ApiCall::PatchBlocks(ids.clone()), |state| {
            if let Some(missing) = ids.iter().find(|id| state.find(id).is_none()) {
                return Err(ApiError::NotFound(missing.clone()));
            }
            ids.iter()
                .zip(patches)
                .map(|(id, patch)| state.patch(id, patch))
                .collect::<Result<Vec<_>, _>>()
        });
        ready(result.map(|patched| publisher.publish(&patched)))
    }

    fn insert_block<P: ChangePublisher>(
        &self,
        block: &Block,
        publisher: &P,
    ) -> impl Future<Output = Result<Vec<Block>, ApiError>> + Send {
        let result = self.call(ApiCall::InsertBlock(block.id.clone()), |state| {
            Ok(state.insert(std::slice::from_ref(block)))
        });
        if let Ok(inserted) = &result {
            publisher.publish(inserted);
        }
        ready(result)
    }

    fn insert_blocks<P: ChangePublisher>(
        &self,
        blocks: &[Block],
        publisher: &P,
    ) -> impl Future<Output = Result<Vec<Block>, ApiError>> + Send {
        let ids = blocks.iter().map(|b| b.id.clone()).collect();
        let result = self.call(ApiCall::InsertBlocks(ids), |state| Ok(state.insert(blocks)));
        if let Ok(inserted) = &result {
            publisher.publish(inserted);
        }
        ready(result)
    }

    fn delete_block<P: ChangePublisher>(
        &self,
        block_id: &BlockId,
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let result = self.call(ApiCall::DeleteBlock(block_id.clone()), |state| {
            state.delete(block_id)
        });
        ready(result.map(|removed| publisher.publish(&[removed])))
    }

    fn delete_blocks<P: ChangePublisher>(
        &self,
        block_ids: &[BlockId],
        publisher: &P,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let result = self.call(ApiCall::DeleteBlocks(block_ids.to_vec()), |state| {
            if let Some(missing) = block_ids.iter().find(|id| state.find(id).is_none()) {
                return Err(ApiError::NotFound(missing.clone()));
            }
            block_ids
                .iter()
                .map(|id| state.delete(id))
                .collect::<Result<Vec<_>, _>>()
        });
        ready(result.map(|removed| publisher.publish(&removed)))
    }

    fn follow_block(
        &self,
        block_id: &BlockId,
        _block_type: BlockType,
        user_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let result = self.call(ApiCall::FollowBlock(block_id.clone()), |state| {
            state
                .following
                .insert((block_id.clone(), user_id.to_string()));
            Ok(())
        });
        ready(result)
    }

    fn unfollow_block(
        &self,
        block_id: &BlockId,
        _block_type: BlockType,
        user_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let result = self.call(ApiCall::UnfollowBlock(block_id.clone()), |state| {
            state
                .following
                .remove(&(block_id.clone(), user_id.to_string()));
            Ok(())
        });
        ready(result)
    }

    fn get_subtree(
        &self,
        root_id: &BlockId,
        levels: u32,
    ) -> impl Future<Output = Result<Vec<Block>, ApiError>> + Send {
        let result = self.call(ApiCall::GetSubtree(root_id.clone()), |state| {
            let root = state
                .find(root_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(root_id.clone()))?;
            let mut subtree = vec![root];
            let mut frontier = vec![root_id.clone()];
            for _ in 1..levels {
                let children: Vec<Block> = state
                    .blocks
                    .iter()
                    .filter(|b| frontier.contains(&b.parent_id) && b.id != b.parent_id)
                    .cloned()
                    .collect();
                frontier = children.iter().map(|b| b.id.clone()).collect();
                subtree.extend(children);
            }
            Ok(subtree)
        });
        ready(result)
    }
}

/// A [`ChangePublisher`] which remembers everything it was given
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<Vec<Block>>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The batches of blocks published so far, oldest first
    pub fn published(&self) -> Vec<Vec<Block>> {
        self.published.lock().unwrap().clone()
    }
}

impl ChangePublisher for RecordingPublisher {
    fn publish(&self, blocks: &[Block]) {
        self.published.lock().unwrap().push(blocks.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use redoable::NoopPublisher;

    use super::*;

    #[test]
    fn inserted_blocks_get_fresh_ids_every_time() {
        let server = FakeServer::new();
        let block = Block::new(BlockType::Card).with_id("local");
        let first = block_on(server.insert_block(&block, &NoopPublisher)).unwrap();
        let second = block_on(server.insert_block(&block, &NoopPublisher)).unwrap();
        assert_ne!(first[0].id, block.id);
        assert_ne!(first[0].id, second[0].id);
        assert_eq!(server.blocks().len(), 2);
    }

    #[test]
    fn same_seed_same_ids() {
        let block = Block::new(BlockType::Card);
        let ids: Vec<BlockId> = (0..2)
            .map(|_| {
                let server = FakeServer::with_seed(7);
                block_on(server.insert_block(&block, &NoopPublisher)).unwrap()[0]
                    .id
                    .clone()
            })
            .collect();
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn batch_inserts_keep_the_tree_together() {
        let server = FakeServer::new();
        let card = Block::new(BlockType::Card)
            .with_id("card")
            .with_parent("board".into(), "board".into());
        let text = Block::new(BlockType::Text)
            .with_id("text")
            .with_parent("card".into(), "board".into());
        let inserted = block_on(server.insert_blocks(&[card, text], &NoopPublisher)).unwrap();
        assert_eq!(inserted[1].parent_id, inserted[0].id);
        assert_eq!(inserted[1].root_id, BlockId::from("board"));
    }

    #[test]
    fn subtree_respects_levels() {
        let server = FakeServer::new();
        server.seed([
            Block::new(BlockType::Board).with_id("board"),
            Block::new(BlockType::Card)
                .with_id("card")
                .with_parent("board".into(), "board".into()),
            Block::new(BlockType::Text)
                .with_id("text")
                .with_parent("card".into(), "board".into()),
        ]);
        let two = block_on(server.get_subtree(&"board".into(), 2)).unwrap();
        assert_eq!(two.len(), 2);
        let three = block_on(server.get_subtree(&"board".into(), 3)).unwrap();
        assert_eq!(three.len(), 3);
    }

    #[test]
    fn queued_failures_apply_to_the_next_call_only() {
        let server = FakeServer::new();
        server.seed([Block::new(BlockType::Card).with_id("card")]);
        server.fail_next(ApiError::Network("offline".into()));
        let patch = BlockPatch::field("icon", "x".into());
        let publisher = RecordingPublisher::new();

        let failed = block_on(server.patch_block(&"card".into(), &patch, &publisher));
        assert_eq!(failed, Err(ApiError::Network("offline".into())));
        assert!(publisher.published().is_empty());

        block_on(server.patch_block(&"card".into(), &patch, &publisher)).unwrap();
        assert_eq!(publisher.published().len(), 1);
        assert_eq!(
            server.block(&"card".into()).unwrap().fields["icon"],
            serde_json::json!("x")
        );
    }
}
