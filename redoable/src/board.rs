//! Typed access to the `fields` of boards and cards
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Block, BlockId};

/// The id of the pseudo property which displays a card's title
pub const TITLE_COLUMN_ID: &str = "__title";

/// The color given to select options created while converting a property
pub const DEFAULT_OPTION_COLOR: &str = "propColorDefault";

/// The type of a property
///
/// Types without special handling are kept verbatim in
/// [`PropertyType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Person,
    Checkbox,
    Url,
    Email,
    Phone,
    CreatedTime,
    CreatedBy,
    UpdatedTime,
    UpdatedBy,
    Relation,
    Other(String),
}

const PROPERTY_TYPE_NAMES: [(PropertyType, &str); 15] = [
    (PropertyType::Text, "text"),
    (PropertyType::Number, "number"),
    (PropertyType::Select, "select"),
    (PropertyType::MultiSelect, "multiSelect"),
    (PropertyType::Date, "date"),
    (PropertyType::Person, "person"),
    (PropertyType::Checkbox, "checkbox"),
    (PropertyType::Url, "url"),
    (PropertyType::Email, "email"),
    (PropertyType::Phone, "phone"),
    (PropertyType::CreatedTime, "createdTime"),
    (PropertyType::CreatedBy, "createdBy"),
    (PropertyType::UpdatedTime, "updatedTime"),
    (PropertyType::UpdatedBy, "updatedBy"),
    (PropertyType::Relation, "relation"),
];

impl PropertyType {
    pub fn is_select(&self) -> bool {
        matches!(self, PropertyType::Select | PropertyType::MultiSelect)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PropertyType::Other(name) => name,
            known => PROPERTY_TYPE_NAMES
                .iter()
                .find(|(property_type, _)| property_type == known)
                .map(|(_, name)| *name)
                .unwrap_or_default(),
        }
    }
}

impl From<String> for PropertyType {
    fn from(name: String) -> Self {
        PROPERTY_TYPE_NAMES
            .iter()
            .find(|(_, known)| *known == name)
            .map(|(property_type, _)| property_type.clone())
            .unwrap_or(PropertyType::Other(name))
    }
}

impl From<PropertyType> for String {
    fn from(property_type: PropertyType) -> Self {
        match property_type {
            PropertyType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOption {
    pub id: String,
    pub value: String,
    pub color: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A column of a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub options: Vec<PropertyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_data: Option<Value>,
    /// Entries this crate does not interpret, written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PropertyTemplate {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        PropertyTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            property_type,
            options: Vec::new(),
            relation_data: None,
            extra: Map::new(),
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&PropertyOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// An entry of a card's `contentOrder`: a single content block, or a row of
/// blocks displayed side by side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentOrderEntry {
    Single(BlockId),
    Row(Vec<BlockId>),
}

impl Block {
    pub fn card_properties(&self) -> Result<Vec<PropertyTemplate>, serde_json::Error> {
        Ok(self.field("cardProperties")?.unwrap_or_default())
    }

    pub fn set_card_properties(
        &mut self,
        templates: &[PropertyTemplate],
    ) -> Result<(), serde_json::Error> {
        self.set_field("cardProperties", templates)
    }

    pub fn view_ids(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(self.field("viewIds")?.unwrap_or_default())
    }

    pub fn is_template(&self) -> bool {
        matches!(self.fields.get("isTemplate"), Some(Value::Bool(true)))
    }

    pub fn content_order(&self) -> Result<Vec<ContentOrderEntry>, serde_json::Error> {
        Ok(self.field("contentOrder")?.unwrap_or_default())
    }

    /// The values of a card's properties, keyed by property id
    pub fn card_property_values(&self) -> Map<String, Value> {
        match self.fields.get("properties") {
            Some(Value::Object(values)) => values.clone(),
            _ => Map::new(),
        }
    }

    pub fn card_property_value(&self, property_id: &str) -> Option<&Value> {
        match self.fields.get("properties") {
            Some(Value::Object(values)) => values.get(property_id),
            _ => None,
        }
    }

    /// Set or, when `value` is `None`, remove the value of a card property
    pub fn set_card_property_value(&mut self, property_id: &str, value: Option<Value>) {
        let mut values = self.card_property_values();
        match value {
            Some(value) => {
                values.insert(property_id.to_string(), value);
            }
            None => {
                values.remove(property_id);
            }
        }
        self.fields
            .insert("properties".to_string(), Value::Object(values));
    }
}

/// Whether a property value counts as "no value"
///
/// Missing values, null, empty strings, zero and `false` are all treated as
/// empty, matching how cards are displayed.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}
