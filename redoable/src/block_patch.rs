use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Block;

/// A minimal change to a block, as sent to the server
///
/// `updated_data` holds top level attributes (`title`, `parentId`, ...),
/// `updated_fields` the entries of `fields` to set and `deleted_fields` the
/// entries of `fields` to remove.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    #[serde(flatten)]
    pub updated_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub updated_fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_fields: Vec<String>,
}

impl BlockPatch {
    /// A patch which sets a single entry of `fields`
    pub fn field(key: impl Into<String>, value: Value) -> Self {
        let mut updated_fields = Map::new();
        updated_fields.insert(key.into(), value);
        BlockPatch {
            updated_fields,
            ..Default::default()
        }
    }

    /// A patch which sets a single top level attribute
    pub fn attribute(key: impl Into<String>, value: Value) -> Self {
        let mut updated_data = Map::new();
        updated_data.insert(key.into(), value);
        BlockPatch {
            updated_data,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updated_data.is_empty()
            && self.updated_fields.is_empty()
            && self.deleted_fields.is_empty()
    }
}

/// Something with a set of top level attributes and a `fields` map, which
/// can therefore be diffed into a [`BlockPatch`]
pub trait Patchable {
    /// The nested map of type specific entries
    fn fields(&self) -> &Map<String, Value>;

    /// Every top level attribute except `fields`, keyed by its wire name
    fn attributes(&self) -> Map<String, Value>;
}

impl Patchable for Block {
    fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("parentId".into(), Value::from(self.parent_id.as_str()));
        attributes.insert("rootId".into(), Value::from(self.root_id.as_str()));
        attributes.insert("createdBy".into(), Value::from(self.created_by.as_str()));
        attributes.insert("updatedBy".into(), Value::from(self.updated_by.as_str()));
        attributes.insert("schema".into(), Value::from(self.schema));
        attributes.insert("type".into(), Value::from(self.block_type.as_str()));
        attributes.insert("title".into(), Value::from(self.title.as_str()));
        attributes.insert("createdAt".into(), Value::from(self.created_at));
        attributes.insert("updatedAt".into(), Value::from(self.updated_at));
        attributes.insert("deletedAt".into(), Value::from(self.deleted_at));
        for (key, value) in &self.extra {
            if !attributes.contains_key(key) {
                attributes.insert(key.clone(), value.clone());
            }
        }
        attributes
    }
}

/// Compute the patch which turns `old` into `new` and the patch which turns
/// it back again
///
/// Returns `(forward, inverse)`. Values are compared structurally.
pub fn create_patches<B: Patchable>(new: &B, old: &B) -> (BlockPatch, BlockPatch) {
    let new_attributes = new.attributes();
    let old_attributes = old.attributes();

    let forward = BlockPatch {
        updated_data: changed_entries(&new_attributes, &old_attributes),
        updated_fields: changed_entries(new.fields(), old.fields()),
        deleted_fields: missing_keys(old.fields(), new.fields()),
    };
    let inverse = BlockPatch {
        updated_data: changed_entries(&old_attributes, &new_attributes),
        updated_fields: changed_entries(old.fields(), new.fields()),
        deleted_fields: missing_keys(new.fields(), old.fields()),
    };
    (forward, inverse)
}

/// Entries of `from` whose value is different, or absent, in `other`
fn changed_entries(from: &Map<String, Value>, other: &Map<String, Value>) -> Map<String, Value> {
    from.iter()
        .filter(|(key, value)| other.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Keys of `from` which are absent in `other`
fn missing_keys(from: &Map<String, Value>, other: &Map<String, Value>) -> Vec<String> {
    from.keys()
        .filter(|key| !other.contains_key(key.as_str()))
        .cloned()
        .collect()
}
