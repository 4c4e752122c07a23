use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::BlockPatch;

/// The identifier of a block
///
/// Identifiers are assigned by the server when a block is inserted, so the id
/// of a block which is deleted and inserted again may change.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// A fresh random id for a block which has not been sent to the server yet
    pub fn new() -> Self {
        BlockId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        BlockId(id)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        BlockId(id.to_string())
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The kind of a block
///
/// Types this crate has no special handling for are kept verbatim in
/// [`BlockType::Other`] so they are written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Board,
    View,
    Card,
    Text,
    Image,
    Divider,
    Checkbox,
    Comment,
    Other(String),
}

impl BlockType {
    pub fn as_str(&self) -> &str {
        match self {
            BlockType::Board => "board",
            BlockType::View => "view",
            BlockType::Card => "card",
            BlockType::Text => "text",
            BlockType::Image => "image",
            BlockType::Divider => "divider",
            BlockType::Checkbox => "checkbox",
            BlockType::Comment => "comment",
            BlockType::Other(name) => name,
        }
    }
}

impl From<String> for BlockType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "board" => BlockType::Board,
            "view" => BlockType::View,
            "card" => BlockType::Card,
            "text" => BlockType::Text,
            "image" => BlockType::Image,
            "divider" => BlockType::Divider,
            "checkbox" => BlockType::Checkbox,
            "comment" => BlockType::Comment,
            _ => BlockType::Other(name),
        }
    }
}

impl From<&str> for BlockType {
    fn from(name: &str) -> Self {
        BlockType::from(name.to_string())
    }
}

impl From<BlockType> for String {
    fn from(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single node of a board: the board itself, one of its views, a card, or
/// a piece of card content
///
/// Everything type specific lives in `fields`, which the server treats as an
/// opaque JSON object. The typed accessors in [`crate::board`] and
/// [`crate::view`] read the well known entries. Top level attributes other
/// than the ones below are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub parent_id: BlockId,
    #[serde(default)]
    pub root_id: BlockId,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_by: String,
    #[serde(default = "default_schema")]
    pub schema: i64,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub deleted_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema() -> i64 {
    1
}

impl Block {
    pub fn new(block_type: BlockType) -> Self {
        Block {
            id: BlockId::new(),
            parent_id: BlockId::default(),
            root_id: BlockId::default(),
            created_by: String::new(),
            updated_by: String::new(),
            schema: default_schema(),
            block_type,
            title: String::new(),
            fields: Map::new(),
            created_at: 0,
            updated_at: 0,
            deleted_at: 0,
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_parent(mut self, parent_id: BlockId, root_id: BlockId) -> Self {
        self.parent_id = parent_id;
        self.root_id = root_id;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Read an entry of `fields`, `None` if it is absent or null
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some),
        }
    }

    pub fn set_field<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), serde_json::Error> {
        self.fields
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Apply a patch produced by [`crate::create_patches`] to this block
    ///
    /// Attributes without a field of their own go to `extra`. The id of a
    /// block cannot be changed by a patch.
    pub fn apply_patch(&mut self, patch: &BlockPatch) -> Result<(), serde_json::Error> {
        for (key, value) in &patch.updated_data {
            let value = value.clone();
            match key.as_str() {
                "parentId" => self.parent_id = serde_json::from_value(value)?,
                "rootId" => self.root_id = serde_json::from_value(value)?,
                "createdBy" => self.created_by = serde_json::from_value(value)?,
                "updatedBy" => self.updated_by = serde_json::from_value(value)?,
                "schema" => self.schema = serde_json::from_value(value)?,
                "type" => self.block_type = serde_json::from_value(value)?,
                "title" => self.title = serde_json::from_value(value)?,
                "createdAt" => self.created_at = serde_json::from_value(value)?,
                "updatedAt" => self.updated_at = serde_json::from_value(value)?,
                "deletedAt" => self.deleted_at = serde_json::from_value(value)?,
                "id" => tracing::warn!(block_id = %self.id, "ignoring id in patch"),
                other => {
                    self.extra.insert(other.to_string(), value);
                }
            }
        }
        for (key, value) in &patch.updated_fields {
            self.fields.insert(key.clone(), value.clone());
        }
        for key in &patch.deleted_fields {
            self.fields.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_server_json() {
        let block: Block = serde_json::from_value(json!({
            "id": "card-1",
            "parentId": "board-1",
            "rootId": "board-1",
            "type": "card",
            "title": "Write docs",
            "fields": {"icon": "📝", "properties": {"status": "done"}},
            "createdAt": 10,
            "updatedAt": 20,
        }))
        .unwrap();

        assert_eq!(block.id, BlockId::from("card-1"));
        assert_eq!(block.block_type, BlockType::Card);
        assert_eq!(block.schema, 1);
        assert_eq!(block.deleted_at, 0);
        assert_eq!(block.field::<String>("icon").unwrap().as_deref(), Some("📝"));
    }

    #[test]
    fn unknown_types_and_attributes_survive_a_round_trip() {
        let json = json!({
            "id": "pg",
            "parentId": "space-root",
            "rootId": "space-root",
            "createdBy": "u1",
            "updatedBy": "u1",
            "schema": 1,
            "type": "page",
            "title": "Notes",
            "fields": {"icon": "📄"},
            "createdAt": 10,
            "updatedAt": 20,
            "deletedAt": 0,
            "spaceId": "space-1",
            "pageId": "page-7",
        });
        let block: Block = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(block.block_type, BlockType::Other("page".to_string()));
        assert_eq!(block.extra.get("spaceId"), Some(&json!("space-1")));
        assert_eq!(serde_json::to_value(&block).unwrap(), json);
    }

    #[test]
    fn apply_patch_keeps_extra_attributes() {
        let mut block = Block::new(BlockType::from("proposal"));
        block.extra.insert("spaceId".to_string(), json!("space-1"));
        let patch = BlockPatch {
            updated_data: Map::from_iter([
                ("spaceId".to_string(), json!("space-2")),
                ("id".to_string(), json!("hijacked")),
            ]),
            ..Default::default()
        };

        block.apply_patch(&patch).unwrap();

        assert_eq!(block.extra.get("spaceId"), Some(&json!("space-2")));
        assert_eq!(block.extra.get("id"), None);
        assert_ne!(block.id, BlockId::from("hijacked"));
        assert_eq!(block.block_type.to_string(), "proposal");
    }

    #[test]
    fn apply_patch_updates_attributes_and_fields() {
        let mut block = Block::new(BlockType::Card)
            .with_title("before")
            .with_field("a", json!(1))
            .with_field("b", json!(2));
        let patch = BlockPatch {
            updated_data: Map::from_iter([("title".to_string(), json!("after"))]),
            updated_fields: Map::from_iter([("b".to_string(), json!(3))]),
            deleted_fields: vec!["a".to_string()],
        };

        block.apply_patch(&patch).unwrap();

        assert_eq!(block.title, "after");
        assert_eq!(block.fields.get("a"), None);
        assert_eq!(block.fields.get("b"), Some(&json!(3)));
    }

    #[test]
    fn apply_patch_rejects_badly_typed_attributes() {
        let mut block = Block::new(BlockType::Card);
        let patch = BlockPatch {
            updated_data: Map::from_iter([("createdAt".to_string(), json!("yesterday"))]),
            ..Default::default()
        };
        assert!(block.apply_patch(&patch).is_err());
    }
}
