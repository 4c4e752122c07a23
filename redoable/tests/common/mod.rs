#![allow(dead_code)]

use redoable::{
    Block, BlockType,
    board::{PropertyOption, PropertyTemplate, PropertyType},
};
use serde_json::json;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn status_property() -> PropertyTemplate {
    PropertyTemplate {
        id: "status".to_string(),
        name: "Status".to_string(),
        property_type: PropertyType::Select,
        options: vec![
            PropertyOption {
                id: "todo".to_string(),
                value: "To do".to_string(),
                color: "propColorRed".to_string(),
                extra: Default::default(),
            },
            PropertyOption {
                id: "done".to_string(),
                value: "Done".to_string(),
                color: "propColorGreen".to_string(),
                extra: Default::default(),
            },
        ],
        relation_data: None,
        extra: Default::default(),
    }
}

pub fn board() -> Block {
    let mut board = Block::new(BlockType::Board)
        .with_id("board")
        .with_title("Roadmap")
        .with_parent("board".into(), "board".into())
        .with_field("viewIds", json!(["table", "kanban"]));
    board
        .set_card_properties(&[status_property()])
        .expect("properties serialize");
    board
}

pub fn table_view() -> Block {
    Block::new(BlockType::View)
        .with_id("table")
        .with_title("Table")
        .with_parent("board".into(), "board".into())
        .with_field("viewType", json!("table"))
        .with_field("visiblePropertyIds", json!(["__title", "status"]))
}

pub fn kanban_view() -> Block {
    Block::new(BlockType::View)
        .with_id("kanban")
        .with_title("Kanban")
        .with_parent("board".into(), "board".into())
        .with_field("viewType", json!("board"))
        .with_field("visibleOptionIds", json!(["todo", "done"]))
        .with_field("hiddenOptionIds", json!([]))
}

pub fn card(id: &str, status: Option<&str>) -> Block {
    let mut card = Block::new(BlockType::Card)
        .with_id(id)
        .with_title(format!("Card {id}"))
        .with_parent("board".into(), "board".into());
    card.set_card_property_value("status", status.map(|s| json!(s)));
    card
}
