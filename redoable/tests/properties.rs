use redoable::{
    Block, BlockId, BlockType, Mutator, MutatorError,
    board::{PropertyOption, PropertyTemplate, PropertyType},
};
use redoable_test_harness::FakeServer;
use serde_json::json;

mod common;
use common::{board, card, init_logging, kanban_view, status_property, table_view};

fn notes_property() -> PropertyTemplate {
    PropertyTemplate {
        id: "notes".to_string(),
        ..PropertyTemplate::new("Notes", PropertyType::Text)
    }
}

#[tokio::test]
async fn insert_property_adds_a_table_column() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    server.seed([board(), table_view()]);
    let mutator = Mutator::new(server.clone());

    let property_id = mutator
        .insert_property_template(&board(), Some(&table_view()), None, None)
        .await?;
    assert_eq!(mutator.undo_description().as_deref(), Some("add column"));

    let templates = server.block(&"board".into()).unwrap().card_properties()?;
    assert_eq!(templates.len(), 2);
    assert_eq!(templates[1].id, property_id);
    assert_eq!(templates[1].name, "New Property");
    assert_eq!(
        server.block(&"table".into()).unwrap().visible_property_ids()?,
        vec!["__title".to_string(), "status".to_string(), property_id]
    );

    mutator.undo().await?;
    assert_eq!(server.block(&"board".into()).unwrap().card_properties()?.len(), 1);
    assert_eq!(
        server.block(&"table".into()).unwrap().visible_property_ids()?,
        vec!["__title", "status"]
    );
    Ok(())
}

#[tokio::test]
async fn insert_property_outside_a_table_only_touches_the_board() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    server.seed([board(), kanban_view()]);
    let mutator = Mutator::new(server.clone());

    mutator
        .insert_property_template(&board(), Some(&kanban_view()), Some(0), Some(notes_property()))
        .await?;
    assert_eq!(mutator.undo_description().as_deref(), Some("add property"));
    assert_eq!(server.block(&"kanban".into()).unwrap(), kanban_view());
    Ok(())
}

#[tokio::test]
async fn duplicate_property_needs_a_view() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    server.seed([board(), table_view()]);
    let mutator = Mutator::new(server.clone());

    assert_eq!(mutator.duplicate_property_template(&board(), None, "status").await?, None);
    assert_eq!(
        mutator
            .duplicate_property_template(&board(), Some(&table_view()), "missing")
            .await?,
        None
    );
    assert!(mutator.history().is_empty());

    let copy_id = mutator
        .duplicate_property_template(&board(), Some(&table_view()), "status")
        .await?
        .unwrap();
    let templates = server.block(&"board".into()).unwrap().card_properties()?;
    assert_eq!(templates[1].id, copy_id);
    assert_eq!(templates[1].name, "Status copy");
    assert_eq!(templates[1].options, status_property().options);
    assert_eq!(mutator.undo_description().as_deref(), Some("duplicate column"));
    Ok(())
}

#[tokio::test]
async fn delete_property_clears_views_and_cards() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    let (done, empty) = (card("a", Some("done")), card("b", None));
    server.seed([board(), table_view(), kanban_view(), done.clone(), empty.clone()]);
    let mutator = Mutator::new(server.clone());

    mutator
        .delete_property(
            &board(),
            &[table_view(), kanban_view()],
            &[done.clone(), empty.clone()],
            "status",
        )
        .await?;

    assert!(server.block(&"board".into()).unwrap().card_properties()?.is_empty());
    assert_eq!(
        server.block(&"table".into()).unwrap().visible_property_ids()?,
        vec!["__title"]
    );
    assert_eq!(server.block(&done.id).unwrap().card_property_value("status"), None);

    mutator.undo().await?;
    assert_eq!(server.block(&"board".into()).unwrap(), board());
    assert_eq!(server.block(&"table".into()).unwrap(), table_view());
    assert_eq!(server.block(&done.id).unwrap(), done);
    Ok(())
}

#[tokio::test]
async fn options_can_be_reordered_renamed_and_deleted() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    server.seed([board()]);
    let mutator = Mutator::new(server.clone());
    let stored_status = || -> eyre::Result<PropertyTemplate> {
        Ok(server.block(&"board".into()).unwrap().card_properties()?.remove(0))
    };

    mutator
        .change_property_option_order(&board(), "status", "done", 0)
        .await?;
    assert_eq!(stored_status()?.options[0].id, "done");
    mutator.undo().await?;

    let changed = mutator
        .change_property_option_value(&board(), "status", "todo", "Backlog")
        .await?;
    assert_eq!(changed.len(), 1);
    assert_eq!(stored_status()?.options[0].value, "Backlog");
    assert_eq!(mutator.undo_description().as_deref(), Some("rename option"));
    mutator.undo().await?;

    mutator
        .change_property_option_color(&board(), "status", "todo", "propColorBlue")
        .await?;
    assert_eq!(stored_status()?.options[0].color, "propColorBlue");
    mutator.undo().await?;

    mutator.delete_property_option(&board(), "status", "todo").await?;
    assert_eq!(stored_status()?.options.len(), 1);
    mutator.undo().await?;
    assert_eq!(stored_status()?, status_property());
    Ok(())
}

#[tokio::test]
async fn missing_properties_are_errors() {
    init_logging();
    let mutator = Mutator::new(FakeServer::new());
    let result = mutator
        .update_property(&board(), "missing", notes_property())
        .await;
    assert!(matches!(result, Err(MutatorError::PropertyNotFound(id)) if id == "missing"));
    let result = mutator
        .change_property_template_order(&board(), "missing", 0)
        .await;
    assert!(matches!(result, Err(MutatorError::PropertyNotFound(_))));
}

#[tokio::test]
async fn property_values_skip_unchanged_cards() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    let (todo, done) = (card("a", Some("todo")), card("b", Some("done")));
    server.seed([todo.clone(), done.clone()]);
    let mutator = Mutator::new(server.clone());

    mutator
        .change_property_value(&todo, "status", Some(json!("todo")), "set status")
        .await?;
    assert!(mutator.history().is_empty());

    mutator
        .change_property_values(&[todo.clone(), done.clone()], "status", Some(json!("done")), "set status")
        .await?;
    assert_eq!(mutator.history().len(), 1);
    assert_eq!(
        server.block(&todo.id).unwrap().card_property_value("status"),
        Some(&json!("done"))
    );

    mutator
        .change_property_value(&done, "status", Some(json!("")), "clear status")
        .await?;
    assert_eq!(server.block(&done.id).unwrap().card_property_value("status"), None);
    Ok(())
}

#[tokio::test]
async fn text_to_select_creates_options() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    let mut board = board();
    board.set_card_properties(&[status_property(), notes_property()])?;
    let cards: Vec<_> = [("a", "red"), ("b", "red"), ("c", "blue")]
        .into_iter()
        .map(|(id, note)| {
            let mut card = card(id, None);
            card.set_card_property_value("notes", Some(json!(note)));
            card
        })
        .collect();
    let view = table_view().with_field(
        "filter",
        json!({"operation": "and", "filters": [
            {"propertyId": "notes", "condition": "includes", "values": ["red"]},
            {"propertyId": "status", "condition": "includes", "values": ["todo"]},
        ]}),
    );
    server.seed([board.clone(), view.clone()]);
    server.seed(cards.clone());
    let mutator = Mutator::new(server.clone());

    mutator
        .change_property_type_and_name(
            &board,
            &cards,
            &notes_property(),
            PropertyType::Select,
            "Colour",
            &[view.clone()],
            None,
        )
        .await?;

    let notes = server.block(&board.id).unwrap().card_properties()?.remove(1);
    assert_eq!(notes.name, "Colour");
    assert_eq!(notes.property_type, PropertyType::Select);
    let values: Vec<_> = notes.options.iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, vec!["red", "blue"]);
    assert!(notes.options.iter().all(|o| o.color == "propColorDefault"));

    let red = &notes.options[0].id;
    for id in ["a", "b"] {
        let stored = server.block(&BlockId::from(id)).unwrap();
        assert_eq!(stored.card_property_value("notes"), Some(&json!(red)));
    }

    let filters = server.block(&view.id).unwrap().fields["filter"]["filters"].clone();
    assert_eq!(filters.as_array().map(Vec::len), Some(1));
    assert_eq!(filters[0]["propertyId"], json!("status"));
    Ok(())
}

#[tokio::test]
async fn select_to_text_keeps_option_text() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    let (todo, bogus) = (card("a", Some("todo")), card("b", Some("not-an-option")));
    server.seed([board(), todo.clone(), bogus.clone()]);
    let mutator = Mutator::new(server.clone());

    mutator
        .change_property_type_and_name(
            &board(),
            &[todo.clone(), bogus.clone()],
            &status_property(),
            PropertyType::Text,
            "Status",
            &[],
            None,
        )
        .await?;

    let status = server.block(&"board".into()).unwrap().card_properties()?.remove(0);
    assert_eq!(status.property_type, PropertyType::Text);
    assert!(status.options.is_empty());
    assert_eq!(
        server.block(&todo.id).unwrap().card_property_value("status"),
        Some(&json!("To do"))
    );
    assert_eq!(server.block(&bogus.id).unwrap().card_property_value("status"), None);

    mutator.undo().await?;
    assert_eq!(server.block(&"board".into()).unwrap(), board());
    assert_eq!(server.block(&todo.id).unwrap(), todo);
    Ok(())
}

#[tokio::test]
async fn renaming_the_title_column_creates_its_template() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    server.seed([board()]);
    let mutator = Mutator::new(server.clone());
    let title = PropertyTemplate {
        id: "__title".to_string(),
        ..PropertyTemplate::new("Title", PropertyType::Text)
    };

    mutator
        .change_property_type_and_name(&board(), &[], &title, PropertyType::Text, "Name", &[], None)
        .await?;
    let templates = server.block(&"board".into()).unwrap().card_properties()?;
    assert_eq!(templates[0].id, "__title");
    assert_eq!(templates[0].name, "Name");
    assert_eq!(templates.len(), 2);
    Ok(())
}

#[tokio::test]
async fn option_edits_leave_other_templates_untouched() -> eyre::Result<()> {
    init_logging();
    let server = FakeServer::new();
    let proposal_status = json!({
        "id": "p",
        "name": "Status",
        "type": "proposalStatus",
        "options": [{"id": "draft", "value": "Draft", "color": "gray", "index": 0}],
        "formFieldId": "ff",
        "private": true,
    });
    let board = Block::new(BlockType::Board)
        .with_id("board")
        .with_field(
            "cardProperties",
            json!([proposal_status, {"id": "s", "name": "Stage", "type": "select", "options": [], "description": "where it is"}]),
        );
    server.seed([board.clone()]);
    let mutator = Mutator::new(server.clone());

    let option = PropertyOption {
        id: "new".to_string(),
        value: "Shipped".to_string(),
        color: "propColorBlue".to_string(),
        extra: Default::default(),
    };
    mutator
        .insert_property_option(&board, "s", option, "add option")
        .await?;

    let stored = server.block(&board.id).unwrap();
    assert_eq!(stored.fields["cardProperties"][0], proposal_status);
    assert_eq!(stored.fields["cardProperties"][1]["description"], json!("where it is"));
    assert_eq!(stored.fields["cardProperties"][1]["options"][0]["id"], json!("new"));

    mutator.undo().await?;
    assert_eq!(server.block(&board.id).unwrap(), board);
    Ok(())
}
