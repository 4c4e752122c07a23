//! Typed access to the `fields` of board views
use serde::{Deserialize, Serialize};

use crate::Block;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOption {
    pub property_id: String,
    pub reversed: bool,
}

impl Block {
    /// `board`, `table`, `gallery`, `calendar`, ...
    pub fn view_type(&self) -> Option<&str> {
        self.fields.get("viewType").and_then(|v| v.as_str())
    }

    pub fn is_table_view(&self) -> bool {
        self.view_type() == Some("table")
    }

    pub fn visible_property_ids(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(self.field("visiblePropertyIds")?.unwrap_or_default())
    }

    pub fn visible_option_ids(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(self.field("visibleOptionIds")?.unwrap_or_default())
    }

    pub fn hidden_option_ids(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(self.field("hiddenOptionIds")?.unwrap_or_default())
    }

    pub fn card_order(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(self.field("cardOrder")?.unwrap_or_default())
    }

    pub fn sort_options(&self) -> Result<Vec<SortOption>, serde_json::Error> {
        Ok(self.field("sortOptions")?.unwrap_or_default())
    }
}

/// Move the element at `from` so that it ends up at `to`
///
/// Out of range indices are clamped rather than panicking.
pub(crate) fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() {
        return;
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}
