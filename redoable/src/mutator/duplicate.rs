use serde_json::Value;

use crate::{
    Block, BlockId, BlockType, ChangePublisher, DuplicatedTree, Hook, InsertHooks, Mutator,
    MutatorError, ServerApi, duplicate_block_tree, hook::run_hook,
};

/// How deep below a card its content is fetched when duplicating it
const CARD_SUBTREE_LEVELS: u32 = 2;
/// How deep below a board its views, cards and content are fetched
const BOARD_SUBTREE_LEVELS: u32 = 3;

/// Options for [`Mutator::duplicate_card`] and [`Mutator::duplicate_board`]
#[derive(Clone, Default)]
pub struct DuplicateOptions {
    description: Option<String>,
    as_template: bool,
    after_redo: Option<Hook<BlockId>>,
    before_undo: Option<Hook<()>>,
}

impl DuplicateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Make the copy a template, or a regular block when it was a template
    pub fn as_template(mut self, as_template: bool) -> Self {
        self.as_template = as_template;
        self
    }

    /// Run after every insert of the copy with the id the server gave it
    pub fn after_redo(mut self, hook: Hook<BlockId>) -> Self {
        self.after_redo = Some(hook);
        self
    }

    pub fn before_undo(mut self, hook: Hook<()>) -> Self {
        self.before_undo = Some(hook);
        self
    }
}

impl<A: ServerApi, P: ChangePublisher> Mutator<A, P> {
    /// Copy a card and its content into `board`
    ///
    /// Comments are not copied. Returns the blocks as first stored by the
    /// server and the id of the new card.
    pub async fn duplicate_card(
        &self,
        card: &Block,
        board: &Block,
        options: DuplicateOptions,
    ) -> Result<(Vec<Block>, BlockId), MutatorError> {
        let blocks = self
            .api()
            .get_subtree(&card.id, CARD_SUBTREE_LEVELS)
            .await?;
        let mut tree = duplicate_block_tree(&blocks, &card.id)
            .ok_or_else(|| MutatorError::BlockNotInTree(card.id.clone()))?;

        let new_card = tree
            .root_mut()
            .ok_or_else(|| MutatorError::BlockNotInTree(card.id.clone()))?;
        new_card.title = if options.as_template == card.is_template() {
            format!("{} copy", card.title)
        } else if options.as_template {
            "New card template".to_string()
        } else {
            String::new()
        };
        new_card
            .fields
            .insert("isTemplate".to_string(), Value::Bool(options.as_template));
        new_card.parent_id = board.id.clone();
        new_card.root_id = board.id.clone();

        let description = options
            .description
            .clone()
            .unwrap_or_else(|| "duplicate card".to_string());
        self.insert_duplicate(tree, description, options).await
    }

    /// Copy a board with its views, cards and their content
    ///
    /// Comments are not copied. Returns the blocks as first stored by the
    /// server and the id of the new board.
    pub async fn duplicate_board(
        &self,
        board_id: &BlockId,
        options: DuplicateOptions,
    ) -> Result<(Vec<Block>, BlockId), MutatorError> {
        let blocks = self
            .api()
            .get_subtree(board_id, BOARD_SUBTREE_LEVELS)
            .await?;
        let mut tree = duplicate_block_tree(&blocks, board_id)
            .ok_or_else(|| MutatorError::BlockNotInTree(board_id.clone()))?;

        let new_board = tree
            .root_mut()
            .ok_or_else(|| MutatorError::BlockNotInTree(board_id.clone()))?;
        if options.as_template == new_board.is_template() {
            new_board.title = format!("{} copy", new_board.title);
        } else if options.as_template {
            new_board.title = "New board template".to_string();
        }
        new_board
            .fields
            .insert("isTemplate".to_string(), Value::Bool(options.as_template));

        let description = options
            .description
            .clone()
            .unwrap_or_else(|| "duplicate board".to_string());
        self.insert_duplicate(tree, description, options).await
    }

    async fn insert_duplicate(
        &self,
        tree: DuplicatedTree,
        description: String,
        options: DuplicateOptions,
    ) -> Result<(Vec<Block>, BlockId), MutatorError> {
        let blocks: Vec<Block> = tree
            .blocks
            .into_iter()
            .filter(|b| b.block_type != BlockType::Comment)
            .collect();
        let root_index = blocks
            .iter()
            .position(|b| b.id == tree.root_id)
            .ok_or_else(|| MutatorError::BlockNotInTree(tree.root_id.clone()))?;
        tracing::debug!(blocks = blocks.len(), %description, "duplicating blocks");

        let DuplicateOptions {
            after_redo,
            before_undo,
            ..
        } = options;
        let hooks = InsertHooks::none()
            .after_redo(crate::hook(move |inserted: Vec<Block>| {
                let after_redo = after_redo.clone();
                async move {
                    match inserted.get(root_index) {
                        Some(root) => run_hook(&after_redo, root.id.clone()).await,
                        None => {
                            tracing::error!("duplicated block not found in the server response");
                            Ok(())
                        }
                    }
                }
            }))
            .before_undo(crate::hook(move |_: Vec<Block>| {
                let before_undo = before_undo.clone();
                async move { run_hook(&before_undo, ()).await }
            }));

        let inserted = self.insert_blocks(blocks, description, hooks).await?;
        let root_id = inserted
            .get(root_index)
            .map(|b| b.id.clone())
            .ok_or(MutatorError::EmptyInsert)?;
        Ok((inserted, root_id))
    }
}
