use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use redoable_core::{GroupId, UndoManager};
use serde_json::Value;

use crate::{
    Block, BlockId, BlockPatch, BlockType, ChangePublisher, DeleteHooks, InsertBlockHooks,
    InsertBlocksHooks, InsertHooks, MutatorError, NoopPublisher, ServerApi,
    board::ContentOrderEntry, create_patches, hook::run_hook,
};

mod builder;
pub use builder::MutatorBuilder;
mod duplicate;
pub use duplicate::DuplicateOptions;
mod properties;
pub use properties::property_value_change;
mod views;
pub use views::view_card_order_change;

/// What to do when the actions of an undo group fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupErrorPolicy {
    /// Log the error and return `Ok`
    ///
    /// Commands which completed before the failure stay in the history as a
    /// group, which may no longer describe a meaningful user action.
    #[default]
    LogAndContinue,
    /// Return the error to the caller
    Propagate,
}

/// A change computed without being sent to the server
///
/// Returned by the `*_change` variants of some mutations so that callers can
/// batch several of them into a single [`Mutator::update_blocks`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlockChange {
    pub block: Block,
    pub new_block: Block,
}

/// Makes every change to server state, recording each one in an undo history
///
/// Each mutation sends a write to the [`ServerApi`] and records how to
/// reverse it in the [`UndoManager`] returned by [`Mutator::history`]. Writes
/// are not applied locally: the server publishes the changed blocks through
/// the [`ChangePublisher`] given to the builder.
///
/// Mutations made inside [`Mutator::perform_as_undo_group`] share a
/// [`GroupId`] and are undone and redone as one step. Only one group can be
/// open at a time per mutator, including its clones.
#[derive(Clone)]
pub struct Mutator<A, P = NoopPublisher> {
    remote: Remote<A, P>,
    history: UndoManager<MutatorError>,
    undo_group: Arc<Mutex<Option<GroupId>>>,
    group_error_policy: GroupErrorPolicy,
}

impl<A: ServerApi> Mutator<A, NoopPublisher> {
    pub fn new(api: A) -> Self {
        Self::builder(api).build()
    }

    pub fn builder(api: A) -> MutatorBuilder<A, NoopPublisher> {
        MutatorBuilder::new(api)
    }
}

impl<A: ServerApi, P: ChangePublisher> Mutator<A, P> {
    pub fn history(&self) -> &UndoManager<MutatorError> {
        &self.history
    }

    pub fn api(&self) -> &A {
        &self.remote.api
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.history.redo_description()
    }

    pub async fn undo(&self) -> Result<(), MutatorError> {
        self.history.undo().await
    }

    pub async fn redo(&self) -> Result<(), MutatorError> {
        self.history.redo().await
    }

    /// The group new commands are currently recorded into
    pub fn current_group(&self) -> Option<GroupId> {
        *self.undo_group.lock().unwrap()
    }

    /// Open a new undo group
    ///
    /// Groups cannot be nested. If one is already open this logs an error and
    /// returns `None`, and commands keep going into the open group.
    pub fn begin_undo_group(&self) -> Option<GroupId> {
        let mut undo_group = self.undo_group.lock().unwrap();
        if let Some(open) = *undo_group {
            tracing::error!(open_group = %open, "undo groups cannot be nested");
            return None;
        }
        let group_id = GroupId::new();
        tracing::debug!(%group_id, "opened undo group");
        *undo_group = Some(group_id);
        Some(group_id)
    }

    /// Close the group opened by [`begin_undo_group`](Self::begin_undo_group)
    ///
    /// Logs an error and leaves the open group alone if `group_id` is not the
    /// open group.
    pub fn end_undo_group(&self, group_id: GroupId) {
        close_group(&self.undo_group, group_id);
    }

    /// Run `actions` with a fresh undo group open, using the configured
    /// [`GroupErrorPolicy`]
    pub async fn perform_as_undo_group<F, Fut>(&self, actions: F) -> Result<(), MutatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), MutatorError>>,
    {
        self.perform_as_undo_group_with(self.group_error_policy, actions)
            .await
    }

    /// Run `actions` with a fresh undo group open
    ///
    /// The group is closed however `actions` finishes, including when the
    /// returned future is dropped early.
    #[tracing::instrument(skip(self, actions))]
    pub async fn perform_as_undo_group_with<F, Fut>(
        &self,
        policy: GroupErrorPolicy,
        actions: F,
    ) -> Result<(), MutatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), MutatorError>>,
    {
        let scope = GroupScope {
            undo_group: &self.undo_group,
            group_id: self.begin_undo_group(),
        };
        let result = actions().await;
        drop(scope);
        match (result, policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), GroupErrorPolicy::LogAndContinue) => {
                tracing::error!(err = %e, "error in undo group");
                Ok(())
            }
            (Err(e), GroupErrorPolicy::Propagate) => Err(e),
        }
    }

    /// Record a command which applies `redo_patch` to `block_id` and reverts
    /// it with `undo_patch`
    pub(crate) async fn perform_patch(
        &self,
        block_id: &BlockId,
        redo_patch: BlockPatch,
        undo_patch: BlockPatch,
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let redo_id = block_id.clone();
        let undo_id = block_id.clone();
        self.history
            .perform(
                move || redo_remote.clone().patch_block(redo_id.clone(), redo_patch.clone()),
                move |()| undo_remote.clone().patch_block(undo_id.clone(), undo_patch.clone()),
                description,
                self.current_group(),
            )
            .await
    }

    /// Record a command which sets one entry of `fields`, restoring the old
    /// value on undo
    ///
    /// A value of `None` removes the entry.
    pub(crate) async fn perform_field_change(
        &self,
        block_id: &BlockId,
        key: &str,
        old_value: Option<Value>,
        new_value: Option<Value>,
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        self.perform_patch(
            block_id,
            field_patch(key, new_value),
            field_patch(key, old_value),
            description,
        )
        .await
    }

    pub async fn update_block(
        &self,
        new_block: &Block,
        old_block: &Block,
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        let (update_patch, undo_patch) = create_patches(new_block, old_block);
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let new_id = new_block.id.clone();
        let old_id = old_block.id.clone();
        self.history
            .perform(
                move || redo_remote.clone().patch_block(new_id.clone(), update_patch.clone()),
                move |()| undo_remote.clone().patch_block(old_id.clone(), undo_patch.clone()),
                description,
                self.current_group(),
            )
            .await
    }

    /// Update several blocks in one command, `new_blocks[i]` replacing
    /// `old_blocks[i]`
    ///
    /// Nothing is recorded when there are no blocks.
    pub async fn update_blocks(
        &self,
        new_blocks: &[Block],
        old_blocks: &[Block],
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        if new_blocks.len() != old_blocks.len() {
            return Err(MutatorError::MismatchedBlockCount {
                new: new_blocks.len(),
                old: old_blocks.len(),
            });
        }
        if new_blocks.is_empty() {
            tracing::trace!("no blocks to update");
            return Ok(());
        }

        let (update_patches, undo_patches): (Vec<_>, Vec<_>) = new_blocks
            .iter()
            .zip(old_blocks)
            .map(|(new_block, old_block)| create_patches(new_block, old_block))
            .unzip();
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let redo_blocks = new_blocks.to_vec();
        let undo_blocks = new_blocks.to_vec();
        self.history
            .perform(
                move || {
                    redo_remote
                        .clone()
                        .patch_blocks(redo_blocks.clone(), update_patches.clone())
                },
                move |()| {
                    undo_remote
                        .clone()
                        .patch_blocks(undo_blocks.clone(), undo_patches.clone())
                },
                description,
                self.current_group(),
            )
            .await
    }

    /// Insert `block`, returning it as stored by the server
    ///
    /// Undo deletes whatever the latest redo inserted, so the id the server
    /// assigns may change between replays.
    pub async fn insert_block(
        &self,
        block: Block,
        description: impl Into<String>,
        hooks: InsertBlockHooks,
    ) -> Result<Block, MutatorError> {
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let InsertHooks {
            after_redo,
            before_undo,
        } = hooks;
        self.history
            .perform(
                move || {
                    let remote = redo_remote.clone();
                    let block = block.clone();
                    let after_redo = after_redo.clone();
                    async move {
                        let inserted = remote.insert_block(block).await?;
                        run_hook(&after_redo, inserted.clone()).await?;
                        Ok(inserted)
                    }
                },
                move |inserted: Block| {
                    let remote = undo_remote.clone();
                    let before_undo = before_undo.clone();
                    async move {
                        run_hook(&before_undo, inserted.clone()).await?;
                        remote.delete_block(inserted.id).await
                    }
                },
                description,
                self.current_group(),
            )
            .await
    }

    pub async fn insert_blocks(
        &self,
        blocks: Vec<Block>,
        description: impl Into<String>,
        hooks: InsertBlocksHooks,
    ) -> Result<Vec<Block>, MutatorError> {
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let InsertHooks {
            after_redo,
            before_undo,
        } = hooks;
        self.history
            .perform(
                move || {
                    let remote = redo_remote.clone();
                    let blocks = blocks.clone();
                    let after_redo = after_redo.clone();
                    async move {
                        let inserted = remote.insert_blocks(blocks).await?;
                        run_hook(&after_redo, inserted.clone()).await?;
                        Ok(inserted)
                    }
                },
                move |inserted: Vec<Block>| {
                    let remote = undo_remote.clone();
                    let before_undo = before_undo.clone();
                    async move {
                        run_hook(&before_undo, inserted.clone()).await?;
                        try_join_all(
                            inserted
                                .into_iter()
                                .map(|block| remote.clone().delete_block(block.id)),
                        )
                        .await?;
                        Ok(())
                    }
                },
                description,
                self.current_group(),
            )
            .await
    }

    /// Delete `block`
    ///
    /// Undo inserts the block again. The server may give it a new id, which
    /// the next redo deletes. `description` defaults to "delete <type>".
    pub async fn delete_block(
        &self,
        block: Block,
        description: Option<String>,
        hooks: DeleteHooks,
    ) -> Result<(), MutatorError> {
        let description = description.unwrap_or_else(|| format!("delete {}", block.block_type));
        let current = Arc::new(Mutex::new(block));
        let redo_current = current.clone();
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let DeleteHooks {
            before_redo,
            after_undo,
        } = hooks;
        self.history
            .perform(
                move || {
                    let remote = redo_remote.clone();
                    let block_id = redo_current.lock().unwrap().id.clone();
                    let before_redo = before_redo.clone();
                    async move {
                        run_hook(&before_redo, ()).await?;
                        remote.delete_block(block_id).await
                    }
                },
                move |()| {
                    let remote = undo_remote.clone();
                    let current = current.clone();
                    let after_undo = after_undo.clone();
                    async move {
                        let block = current.lock().unwrap().clone();
                        let restored = remote.insert_block(block).await?;
                        *current.lock().unwrap() = restored;
                        run_hook(&after_undo, ()).await
                    }
                },
                description,
                self.current_group(),
            )
            .await
    }

    pub async fn delete_blocks(
        &self,
        blocks: Vec<Block>,
        description: impl Into<String>,
        hooks: DeleteHooks,
    ) -> Result<(), MutatorError> {
        let current = Arc::new(Mutex::new(blocks));
        let redo_current = current.clone();
        let redo_remote = self.remote.clone();
        let undo_remote = self.remote.clone();
        let DeleteHooks {
            before_redo,
            after_undo,
        } = hooks;
        self.history
            .perform(
                move || {
                    let remote = redo_remote.clone();
                    let block_ids: Vec<BlockId> = redo_current
                        .lock()
                        .unwrap()
                        .iter()
                        .map(|b| b.id.clone())
                        .collect();
                    let before_redo = before_redo.clone();
                    async move {
                        run_hook(&before_redo, ()).await?;
                        remote.delete_blocks(block_ids).await
                    }
                },
                move |()| {
                    let remote = undo_remote.clone();
                    let current = current.clone();
                    let after_undo = after_undo.clone();
                    async move {
                        let blocks = current.lock().unwrap().clone();
                        let restored = remote.insert_blocks(blocks).await?;
                        *current.lock().unwrap() = restored;
                        run_hook(&after_undo, ()).await
                    }
                },
                description,
                self.current_group(),
            )
            .await
    }

    pub async fn change_title(
        &self,
        block_id: &BlockId,
        old_title: &str,
        new_title: &str,
    ) -> Result<(), MutatorError> {
        self.perform_patch(
            block_id,
            BlockPatch::attribute("title", Value::from(new_title)),
            BlockPatch::attribute("title", Value::from(old_title)),
            "change title",
        )
        .await
    }

    pub async fn set_default_template(
        &self,
        block_id: &BlockId,
        old_template_id: &str,
        template_id: &str,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            block_id,
            "defaultTemplateId",
            Some(Value::from(old_template_id)),
            Some(Value::from(template_id)),
            "set default template",
        )
        .await
    }

    pub async fn clear_default_template(
        &self,
        block_id: &BlockId,
        old_template_id: &str,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            block_id,
            "defaultTemplateId",
            Some(Value::from(old_template_id)),
            Some(Value::from("")),
            "clear default template",
        )
        .await
    }

    pub async fn change_icon(
        &self,
        block_id: &BlockId,
        old_icon: Option<&str>,
        icon: &str,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            block_id,
            "icon",
            old_icon.map(Value::from),
            Some(Value::from(icon)),
            "change icon",
        )
        .await
    }

    pub async fn change_header_image(
        &self,
        block_id: &BlockId,
        old_header_image: Option<&str>,
        header_image: Option<&str>,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            block_id,
            "headerImage",
            old_header_image.map(Value::from),
            header_image.map(Value::from),
            "change cover",
        )
        .await
    }

    /// `description` is the rich text document shown under a board's title
    pub async fn change_description(
        &self,
        block_id: &BlockId,
        old_description: Option<Value>,
        description: Value,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            block_id,
            "description",
            old_description,
            Some(description),
            "change description",
        )
        .await
    }

    pub async fn show_description(
        &self,
        board_id: &BlockId,
        old_show_description: bool,
        show_description: bool,
    ) -> Result<(), MutatorError> {
        let description = if show_description {
            "show description"
        } else {
            "hide description"
        };
        self.perform_field_change(
            board_id,
            "showDescription",
            Some(Value::from(old_show_description)),
            Some(Value::from(show_description)),
            description,
        )
        .await
    }

    pub async fn change_card_content_order(
        &self,
        card_id: &BlockId,
        old_content_order: &[ContentOrderEntry],
        content_order: &[ContentOrderEntry],
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            card_id,
            "contentOrder",
            Some(serde_json::to_value(old_content_order)?),
            Some(serde_json::to_value(content_order)?),
            "reorder",
        )
        .await
    }

    pub async fn follow_block(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        user_id: &str,
    ) -> Result<(), MutatorError> {
        let follow = Follow::new(&self.remote, block_id, block_type, user_id);
        let unfollow = follow.clone();
        self.history
            .perform(
                move || follow.clone().follow(),
                move |()| unfollow.clone().unfollow(),
                "follow block",
                self.current_group(),
            )
            .await
    }

    pub async fn unfollow_block(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        user_id: &str,
    ) -> Result<(), MutatorError> {
        let unfollow = Follow::new(&self.remote, block_id, block_type, user_id);
        let follow = unfollow.clone();
        self.history
            .perform(
                move || unfollow.clone().unfollow(),
                move |()| follow.clone().follow(),
                "unfollow block",
                self.current_group(),
            )
            .await
    }
}

/// A patch which sets `key` in `fields`, or deletes it for `None`
fn field_patch(key: &str, value: Option<Value>) -> BlockPatch {
    match value {
        Some(value) => BlockPatch::field(key, value),
        None => BlockPatch {
            deleted_fields: vec![key.to_string()],
            ..Default::default()
        },
    }
}

fn close_group(undo_group: &Mutex<Option<GroupId>>, group_id: GroupId) {
    let mut undo_group = undo_group.lock().unwrap();
    if *undo_group != Some(group_id) {
        tracing::error!(
            %group_id,
            open_group = ?*undo_group,
            "mismatched undo group, groups cannot be nested"
        );
        return;
    }
    tracing::debug!(%group_id, "closed undo group");
    *undo_group = None;
}

/// Closes the group opened by `perform_as_undo_group_with` when dropped
struct GroupScope<'a> {
    undo_group: &'a Mutex<Option<GroupId>>,
    group_id: Option<GroupId>,
}

impl Drop for GroupScope<'_> {
    fn drop(&mut self) {
        if let Some(group_id) = self.group_id {
            close_group(self.undo_group, group_id);
        }
    }
}

/// The server API along with the publisher every write is announced through
#[derive(Clone)]
pub(crate) struct Remote<A, P> {
    pub(crate) api: A,
    pub(crate) publisher: P,
}

impl<A: ServerApi, P: ChangePublisher> Remote<A, P> {
    pub(crate) async fn patch_block(
        self,
        block_id: BlockId,
        patch: BlockPatch,
    ) -> Result<(), MutatorError> {
        self.api
            .patch_block(&block_id, &patch, &self.publisher)
            .await?;
        Ok(())
    }

    async fn patch_blocks(
        self,
        blocks: Vec<Block>,
        patches: Vec<BlockPatch>,
    ) -> Result<(), MutatorError> {
        self.api
            .patch_blocks(&blocks, &patches, &self.publisher)
            .await?;
        Ok(())
    }

    async fn insert_block(self, block: Block) -> Result<Block, MutatorError> {
        let inserted = self.api.insert_block(&block, &self.publisher).await?;
        inserted.into_iter().next().ok_or(MutatorError::EmptyInsert)
    }

    async fn insert_blocks(self, blocks: Vec<Block>) -> Result<Vec<Block>, MutatorError> {
        Ok(self.api.insert_blocks(&blocks, &self.publisher).await?)
    }

    async fn delete_block(self, block_id: BlockId) -> Result<(), MutatorError> {
        self.api.delete_block(&block_id, &self.publisher).await?;
        Ok(())
    }

    async fn delete_blocks(self, block_ids: Vec<BlockId>) -> Result<(), MutatorError> {
        self.api.delete_blocks(&block_ids, &self.publisher).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct Follow<A> {
    api: A,
    block_id: BlockId,
    block_type: BlockType,
    user_id: String,
}

impl<A: ServerApi> Follow<A> {
    fn new<P>(remote: &Remote<A, P>, block_id: &BlockId, block_type: BlockType, user_id: &str) -> Self {
        Follow {
            api: remote.api.clone(),
            block_id: block_id.clone(),
            block_type,
            user_id: user_id.to_string(),
        }
    }

    async fn follow(self) -> Result<(), MutatorError> {
        self.api
            .follow_block(&self.block_id, self.block_type, &self.user_id)
            .await?;
        Ok(())
    }

    async fn unfollow(self) -> Result<(), MutatorError> {
        self.api
            .unfollow_block(&self.block_id, self.block_type, &self.user_id)
            .await?;
        Ok(())
    }
}
