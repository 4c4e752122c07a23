use std::collections::HashMap;

use serde_json::Value;

use crate::{Block, BlockId, BlockType};

/// The result of [`duplicate_block_tree`]
#[derive(Debug, Clone)]
pub struct DuplicatedTree {
    /// Copies of every block, in the order they were given
    pub blocks: Vec<Block>,
    /// The new id of the block the copy was made from
    pub root_id: BlockId,
    /// Old id to new id
    pub id_map: HashMap<BlockId, BlockId>,
}

impl DuplicatedTree {
    pub fn root(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == self.root_id)
    }

    pub fn root_mut(&mut self) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == self.root_id)
    }
}

/// Copy a subtree, giving every block a fresh id
///
/// References between blocks of the tree (`parentId`, `rootId`, a card's
/// `contentOrder`, a board's `viewIds` and a view's `cardOrder`) are rewritten
/// to point at the copies. References to blocks outside the tree are kept.
/// The copy of `source_id` keeps its original parent. If `source_id` was its
/// own root then the copies are rooted at the new id, otherwise they stay
/// under the original root.
///
/// Returns `None` if `source_id` is not one of `blocks`.
pub fn duplicate_block_tree(blocks: &[Block], source_id: &BlockId) -> Option<DuplicatedTree> {
    let source = blocks.iter().find(|b| &b.id == source_id)?;
    let now = i64::from(redoable_core::UnixTimestamp::now());

    let id_map: HashMap<BlockId, BlockId> = blocks
        .iter()
        .map(|b| (b.id.clone(), BlockId::new()))
        .collect();
    let new_source_id = id_map.get(source_id)?.clone();
    let new_root_id = if source.root_id == source.id {
        new_source_id.clone()
    } else {
        source.root_id.clone()
    };
    let remap = |id: &BlockId| id_map.get(id).cloned().unwrap_or_else(|| id.clone());

    let copies = blocks
        .iter()
        .map(|block| {
            let mut copy = block.clone();
            copy.id = remap(&block.id);
            if &block.id != source_id {
                copy.parent_id = remap(&block.parent_id);
            }
            copy.root_id = new_root_id.clone();
            copy.created_at = now;
            copy.updated_at = now;

            let referencing_keys: &[&str] = match block.block_type {
                BlockType::Card => &["contentOrder"],
                BlockType::Board => &["viewIds"],
                BlockType::View => &["cardOrder"],
                _ => &[],
            };
            for key in referencing_keys {
                if let Some(value) = copy.fields.get_mut(*key) {
                    remap_ids_in(value, &id_map);
                }
            }
            copy
        })
        .collect();

    Some(DuplicatedTree {
        blocks: copies,
        root_id: new_source_id,
        id_map,
    })
}

/// Rewrite every string in `value`, at any depth of nested arrays, which is a
/// key of `id_map`
fn remap_ids_in(value: &mut Value, id_map: &HashMap<BlockId, BlockId>) {
    match value {
        Value::String(id) => {
            if let Some(new_id) = id_map.get(&BlockId::from(id.as_str())) {
                *id = new_id.to_string();
            }
        }
        Value::Array(items) => {
            for item in items {
                remap_ids_in(item, id_map);
            }
        }
        _ => {}
    }
}
