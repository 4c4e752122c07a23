use serde_json::{Map, Value, json};

use crate::{
    Block, BlockChange, ChangePublisher, Mutator, MutatorError, ServerApi,
    board::{
        DEFAULT_OPTION_COLOR, PropertyOption, PropertyTemplate, PropertyType, TITLE_COLUMN_ID,
        is_empty_value,
    },
    view::move_item,
};

impl<A: ServerApi, P: ChangePublisher> Mutator<A, P> {
    /// Add a property to `board`, returning its id
    ///
    /// Without a `template` a text property called "New Property" is added.
    /// When `active_view` is a table the property also becomes a visible
    /// column, at `index` or at the end.
    pub async fn insert_property_template(
        &self,
        board: &Block,
        active_view: Option<&Block>,
        index: Option<usize>,
        template: Option<PropertyTemplate>,
    ) -> Result<String, MutatorError> {
        let template =
            template.unwrap_or_else(|| PropertyTemplate::new("New Property", PropertyType::Text));
        let template_id = template.id.clone();

        let mut new_board = board.clone();
        let mut templates = board.card_properties()?;
        templates.push(template);
        new_board.set_card_properties(&templates)?;

        let mut old_blocks = vec![board.clone()];
        let mut new_blocks = vec![new_board];
        let mut description = "add property";

        if let Some(view) = active_view
            && view.is_table_view()
        {
            let mut visible = view.visible_property_ids()?;
            if !visible.iter().any(|id| id == TITLE_COLUMN_ID) {
                visible.insert(0, TITLE_COLUMN_ID.to_string());
            }
            let index = index.unwrap_or(visible.len()).min(visible.len());
            visible.insert(index, template_id.clone());

            let mut new_view = view.clone();
            new_view.set_field("visiblePropertyIds", &visible)?;
            old_blocks.push(view.clone());
            new_blocks.push(new_view);
            description = "add column";
        }

        self.update_blocks(&new_blocks, &old_blocks, description)
            .await?;
        Ok(template_id)
    }

    /// Copy a property, inserting the copy right after the original
    ///
    /// Returns the id of the copy, or `None` if there is no active view or no
    /// such property. Both cases are logged as errors.
    pub async fn duplicate_property_template(
        &self,
        board: &Block,
        active_view: Option<&Block>,
        property_id: &str,
    ) -> Result<Option<String>, MutatorError> {
        let Some(view) = active_view else {
            tracing::error!("duplicate_property_template: no active view");
            return Ok(None);
        };
        let mut templates = board.card_properties()?;
        let Some(index) = templates.iter().position(|t| t.id == property_id) else {
            tracing::error!(property_id, "cannot find property template to duplicate");
            return Ok(None);
        };
        let source = &templates[index];
        let copy = PropertyTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("{} copy", source.name),
            ..source.clone()
        };
        let copy_id = copy.id.clone();
        templates.insert(index + 1, copy);

        let mut new_board = board.clone();
        new_board.set_card_properties(&templates)?;
        let mut old_blocks = vec![board.clone()];
        let mut new_blocks = vec![new_board];
        let mut description = "duplicate property";

        if view.is_table_view() {
            let mut visible = view.visible_property_ids()?;
            visible.push(copy_id.clone());
            let mut new_view = view.clone();
            new_view.set_field("visiblePropertyIds", &visible)?;
            old_blocks.push(view.clone());
            new_blocks.push(new_view);
            description = "duplicate column";
        }

        self.update_blocks(&new_blocks, &old_blocks, description)
            .await?;
        Ok(Some(copy_id))
    }

    pub async fn change_property_template_order(
        &self,
        board: &Block,
        property_id: &str,
        dest_index: usize,
    ) -> Result<(), MutatorError> {
        let mut templates = board.card_properties()?;
        let src_index = find_template(&templates, property_id)?;
        tracing::debug!(src_index, dest_index, "reordering properties");
        move_item(&mut templates, src_index, dest_index);

        let mut new_board = board.clone();
        new_board.set_card_properties(&templates)?;
        self.update_block(&new_board, board, "reorder properties")
            .await
    }

    /// Remove a property from the board, from the visible columns of every
    /// view and from every card which has a value for it
    pub async fn delete_property(
        &self,
        board: &Block,
        views: &[Block],
        cards: &[Block],
        property_id: &str,
    ) -> Result<(), MutatorError> {
        let mut new_board = board.clone();
        let templates: Vec<_> = board
            .card_properties()?
            .into_iter()
            .filter(|t| t.id != property_id)
            .collect();
        new_board.set_card_properties(&templates)?;
        let mut old_blocks = vec![board.clone()];
        let mut new_blocks = vec![new_board];

        for view in views {
            let visible = view.visible_property_ids()?;
            if visible.iter().any(|id| id == property_id) {
                let remaining: Vec<_> = visible.into_iter().filter(|id| id != property_id).collect();
                let mut new_view = view.clone();
                new_view.set_field("visiblePropertyIds", &remaining)?;
                old_blocks.push(view.clone());
                new_blocks.push(new_view);
            }
        }
        for card in cards {
            if !is_empty_value(card.card_property_value(property_id)) {
                let mut new_card = card.clone();
                new_card.set_card_property_value(property_id, None);
                old_blocks.push(card.clone());
                new_blocks.push(new_card);
            }
        }

        self.update_blocks(&new_blocks, &old_blocks, "delete property")
            .await
    }

    pub async fn insert_property_option(
        &self,
        board: &Block,
        template_id: &str,
        option: PropertyOption,
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        let new_board = with_template(board, template_id, |t| t.options.push(option))?;
        self.update_block(&new_board, board, description).await
    }

    pub async fn delete_property_option(
        &self,
        board: &Block,
        template_id: &str,
        option_id: &str,
    ) -> Result<(), MutatorError> {
        let new_board = with_template(board, template_id, |t| {
            t.options.retain(|o| o.id != option_id)
        })?;
        self.update_block(&new_board, board, "delete option").await
    }

    pub async fn change_property_option_order(
        &self,
        board: &Block,
        template_id: &str,
        option_id: &str,
        dest_index: usize,
    ) -> Result<(), MutatorError> {
        let new_board = with_template(board, template_id, |t| {
            match t.options.iter().position(|o| o.id == option_id) {
                Some(src_index) => move_item(&mut t.options, src_index, dest_index),
                None => tracing::warn!(option_id, "cannot find option to reorder"),
            }
        })?;
        self.update_block(&new_board, board, "reorder options")
            .await
    }

    /// Rename an option, returning the changed board
    pub async fn change_property_option_value(
        &self,
        board: &Block,
        template_id: &str,
        option_id: &str,
        value: &str,
    ) -> Result<Vec<Block>, MutatorError> {
        let new_board = with_option(board, template_id, option_id, |o| {
            o.value = value.to_string()
        })?;
        let changed = vec![new_board];
        self.update_blocks(&changed, std::slice::from_ref(board), "rename option")
            .await?;
        Ok(changed)
    }

    pub async fn change_property_option_color(
        &self,
        board: &Block,
        template_id: &str,
        option_id: &str,
        color: &str,
    ) -> Result<(), MutatorError> {
        let new_board = with_option(board, template_id, option_id, |o| {
            o.color = color.to_string()
        })?;
        self.update_block(&new_board, board, "change option color")
            .await
    }

    /// Replace the value and color of an option in one step
    pub async fn change_property_option(
        &self,
        board: &Block,
        template_id: &str,
        updated_option: &PropertyOption,
    ) -> Result<(), MutatorError> {
        let new_board = with_option(board, template_id, &updated_option.id, |o| {
            o.value = updated_option.value.clone();
            o.color = updated_option.color.clone();
        })?;
        self.update_block(&new_board, board, "change property option")
            .await
    }

    /// Set the value of one property of a card, `None` clearing it
    ///
    /// Nothing is recorded if the value does not change. Empty values (see
    /// [`is_empty_value`]) clear the property.
    pub async fn change_property_value(
        &self,
        card: &Block,
        property_id: &str,
        value: Option<Value>,
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        match property_value_change(card, property_id, value) {
            Some(change) => {
                self.update_block(&change.new_block, &change.block, description)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Set the value of one property on several cards in one command
    pub async fn change_property_values(
        &self,
        cards: &[Block],
        property_id: &str,
        value: Option<Value>,
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        let (old_blocks, new_blocks): (Vec<_>, Vec<_>) = cards
            .iter()
            .filter_map(|card| property_value_change(card, property_id, value.clone()))
            .map(|change| (change.block, change.new_block))
            .unzip();
        self.update_blocks(&new_blocks, &old_blocks, description)
            .await
    }

    /// Replace a property template wholesale
    pub async fn update_property(
        &self,
        board: &Block,
        property_id: &str,
        updated: PropertyTemplate,
    ) -> Result<(), MutatorError> {
        let mut templates = board.card_properties()?;
        let index = find_template(&templates, property_id)?;
        templates[index] = updated;

        let mut new_board = board.clone();
        new_board.set_card_properties(&templates)?;
        self.update_block(&new_board, board, "changed property")
            .await
    }

    /// Rename a property and change its type, converting card values
    ///
    /// Converting away from a select keeps values that are valid options,
    /// as option ids for another select or as the option's text otherwise.
    /// Converting a text-like property to a select creates an option for
    /// every distinct value. Filters on the property are removed from every
    /// view in `views`, each as its own command.
    ///
    /// The title column has no template until it is first renamed, in which
    /// case one is created at the front of the board's properties.
    #[allow(clippy::too_many_arguments)]
    pub async fn change_property_type_and_name(
        &self,
        board: &Block,
        cards: &[Block],
        template: &PropertyTemplate,
        new_type: PropertyType,
        new_name: &str,
        views: &[Block],
        relation_data: Option<Value>,
    ) -> Result<(), MutatorError> {
        if template.property_type == new_type && template.name == new_name {
            return Ok(());
        }

        let mut templates = board.card_properties()?;
        let index = match templates.iter().position(|t| t.id == template.id) {
            Some(index) => index,
            None if template.id == TITLE_COLUMN_ID => {
                templates.insert(0, title_template());
                0
            }
            None => {
                tracing::error!(property_id = %template.id, "cannot find property to change");
                return Ok(());
            }
        };

        let type_changed = template.property_type != new_type;
        let mut new_template = templates[index].clone();
        if type_changed {
            new_template.options.clear();
        }
        new_template.property_type = new_type.clone();
        new_template.name = new_name.to_string();
        if new_type == PropertyType::Relation && relation_data.is_some() {
            new_template.relation_data = relation_data;
        }

        let mut old_blocks = vec![board.clone()];
        let mut new_cards = Vec::new();

        if type_changed && template.property_type.is_select() {
            if new_type.is_select() {
                new_template.options = template.options.clone();
            }
            for card in cards {
                let old_value = match card.card_property_value(&template.id) {
                    Some(Value::Array(values)) => values.first(),
                    other => other,
                };
                if is_empty_value(old_value) {
                    continue;
                }
                let option = old_value
                    .and_then(Value::as_str)
                    .and_then(|id| template.option(id));
                let new_value = option.map(|o| {
                    if new_type.is_select() {
                        o.id.clone()
                    } else {
                        o.value.clone()
                    }
                });

                let mut new_card = card.clone();
                // Values which were not valid options are dropped
                new_card.set_card_property_value(
                    &template.id,
                    new_value.map(|v| select_value(&new_type, v)),
                );
                old_blocks.push(card.clone());
                new_cards.push(new_card);
            }
        } else if type_changed && new_type.is_select() {
            for card in cards {
                let old_value = card.card_property_value(&template.id);
                if is_empty_value(old_value) {
                    continue;
                }
                let text = old_value.map(value_as_text).unwrap_or_default();
                let option_id = match new_template.options.iter().find(|o| o.value == text) {
                    Some(option) => option.id.clone(),
                    None => {
                        let option = PropertyOption {
                            id: uuid::Uuid::new_v4().to_string(),
                            value: text,
                            color: DEFAULT_OPTION_COLOR.to_string(),
                            extra: Map::new(),
                        };
                        let id = option.id.clone();
                        new_template.options.push(option);
                        id
                    }
                };

                let mut new_card = card.clone();
                new_card.set_card_property_value(&template.id, Some(select_value(&new_type, option_id)));
                old_blocks.push(card.clone());
                new_cards.push(new_card);
            }
        }

        templates[index] = new_template;
        let mut new_board = board.clone();
        new_board.set_card_properties(&templates)?;
        let mut new_blocks = vec![new_board];
        new_blocks.extend(new_cards);

        self.update_blocks(&new_blocks, &old_blocks, "change property type and name")
            .await?;

        for view in views {
            let Some(filter) = view.fields.get("filter") else {
                continue;
            };
            let Some(filters) = filter.get("filters").and_then(Value::as_array) else {
                continue;
            };
            let remaining: Vec<Value> = filters
                .iter()
                .filter(|f| f.get("propertyId").and_then(Value::as_str) != Some(template.id.as_str()))
                .cloned()
                .collect();
            if remaining.len() != filters.len() {
                let new_filter = json!({"operation": "and", "filters": remaining});
                self.change_view_filter(&view.id, filter, &new_filter)
                    .await?;
            }
        }
        Ok(())
    }
}

/// The change which sets a card property, or `None` if nothing would change
///
/// Use this to combine several property changes into one
/// [`Mutator::update_blocks`].
pub fn property_value_change(
    card: &Block,
    property_id: &str,
    value: Option<Value>,
) -> Option<BlockChange> {
    let old_value = card.card_property_value(property_id);
    if old_value == value.as_ref() {
        return None;
    }
    if is_empty_value(old_value) && is_empty_value(value.as_ref()) {
        return None;
    }
    let mut new_card = card.clone();
    let value = value.filter(|v| !is_empty_value(Some(v)));
    new_card.set_card_property_value(property_id, value);
    Some(BlockChange {
        block: card.clone(),
        new_block: new_card,
    })
}

fn find_template(templates: &[PropertyTemplate], property_id: &str) -> Result<usize, MutatorError> {
    templates
        .iter()
        .position(|t| t.id == property_id)
        .ok_or_else(|| MutatorError::PropertyNotFound(property_id.to_string()))
}

/// A copy of `board` with `change` applied to one of its property templates
fn with_template(
    board: &Block,
    template_id: &str,
    change: impl FnOnce(&mut PropertyTemplate),
) -> Result<Block, MutatorError> {
    let mut templates = board.card_properties()?;
    let index = find_template(&templates, template_id)?;
    change(&mut templates[index]);
    let mut new_board = board.clone();
    new_board.set_card_properties(&templates)?;
    Ok(new_board)
}

fn with_option(
    board: &Block,
    template_id: &str,
    option_id: &str,
    change: impl FnOnce(&mut PropertyOption),
) -> Result<Block, MutatorError> {
    let mut found = false;
    let new_board = with_template(board, template_id, |t| {
        if let Some(option) = t.options.iter_mut().find(|o| o.id == option_id) {
            change(option);
            found = true;
        }
    })?;
    if !found {
        tracing::warn!(template_id, option_id, "cannot find option to change");
    }
    Ok(new_board)
}

fn title_template() -> PropertyTemplate {
    PropertyTemplate {
        id: TITLE_COLUMN_ID.to_string(),
        name: "Title".to_string(),
        property_type: PropertyType::Text,
        options: Vec::new(),
        relation_data: None,
        extra: Map::new(),
    }
}

fn select_value(property_type: &PropertyType, option: String) -> Value {
    if *property_type == PropertyType::MultiSelect {
        json!([option])
    } else {
        Value::String(option)
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
