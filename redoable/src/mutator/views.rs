use serde_json::Value;

use crate::{
    Block, BlockChange, BlockId, BlockPatch, ChangePublisher, Mutator, MutatorError,
    NoopPublisher, ServerApi,
    board::PropertyTemplate,
    view::{SortOption, move_item},
};

impl<A: ServerApi, P: ChangePublisher> Mutator<A, P> {
    pub async fn change_view_sort_options(
        &self,
        view_id: &BlockId,
        old_sort_options: &[SortOption],
        sort_options: &[SortOption],
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "sortOptions",
            Some(serde_json::to_value(old_sort_options)?),
            Some(serde_json::to_value(sort_options)?),
            "sort",
        )
        .await
    }

    /// `filter` is a filter group document, `{"operation": .., "filters": [..]}`
    pub async fn change_view_filter(
        &self,
        view_id: &BlockId,
        old_filter: &Value,
        filter: &Value,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "filter",
            Some(old_filter.clone()),
            Some(filter.clone()),
            "filter",
        )
        .await
    }

    pub async fn change_view_group_by_id(
        &self,
        view_id: &BlockId,
        old_group_by_id: Option<&str>,
        group_by_id: &str,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "groupById",
            old_group_by_id.map(Value::from),
            Some(Value::from(group_by_id)),
            "group by",
        )
        .await
    }

    pub async fn change_view_date_display_property_id(
        &self,
        view_id: &BlockId,
        old_date_display_property_id: Option<&str>,
        date_display_property_id: &str,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "dateDisplayPropertyId",
            old_date_display_property_id.map(Value::from),
            Some(Value::from(date_display_property_id)),
            "display by",
        )
        .await
    }

    /// Move `dropped_view_id` to where `dropzone_view_id` is in the board's
    /// list of views
    pub async fn change_board_views_order(
        &self,
        board_id: &BlockId,
        current_view_ids: &[String],
        dropped_view_id: &str,
        dropzone_view_id: &str,
    ) -> Result<(), MutatorError> {
        let mut view_ids = current_view_ids.to_vec();
        let (Some(dropped), Some(dropzone)) = (
            view_ids.iter().position(|id| id == dropped_view_id),
            view_ids.iter().position(|id| id == dropzone_view_id),
        ) else {
            tracing::warn!(dropped_view_id, dropzone_view_id, "cannot reorder views which are not on the board");
            return Ok(());
        };
        move_item(&mut view_ids, dropped, dropzone);

        self.perform_field_change(
            board_id,
            "viewIds",
            Some(Value::from(current_view_ids.to_vec())),
            Some(Value::from(view_ids)),
            "change board's views order",
        )
        .await
    }

    /// Move the column of `property_id` to `dest_index` among the visible
    /// columns of a view
    pub async fn change_view_visible_properties_order(
        &self,
        view_id: &BlockId,
        visible_property_ids: &[String],
        property_id: &str,
        dest_index: usize,
    ) -> Result<(), MutatorError> {
        let mut new_order = visible_property_ids.to_vec();
        let Some(src_index) = new_order.iter().position(|id| id == property_id) else {
            tracing::warn!(property_id, "cannot reorder a column which is not visible");
            return Ok(());
        };
        tracing::debug!(src_index, dest_index, "reordering visible properties");
        move_item(&mut new_order, src_index, dest_index);

        self.perform_field_change(
            view_id,
            "visiblePropertyIds",
            Some(Value::from(visible_property_ids.to_vec())),
            Some(Value::from(new_order)),
            "change property order",
        )
        .await
    }

    pub async fn change_view_visible_properties(
        &self,
        view_id: &BlockId,
        old_visible_property_ids: &[String],
        visible_property_ids: &[String],
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "visiblePropertyIds",
            Some(Value::from(old_visible_property_ids.to_vec())),
            Some(Value::from(visible_property_ids.to_vec())),
            "show / hide property",
        )
        .await
    }

    pub async fn change_view_visible_option_ids(
        &self,
        view_id: &BlockId,
        old_visible_option_ids: &[String],
        visible_option_ids: &[String],
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "visibleOptionIds",
            Some(Value::from(old_visible_option_ids.to_vec())),
            Some(Value::from(visible_option_ids.to_vec())),
            "reorder",
        )
        .await
    }

    pub async fn change_view_hidden_option_ids(
        &self,
        view_id: &BlockId,
        old_hidden_option_ids: &[String],
        hidden_option_ids: &[String],
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "hiddenOptionIds",
            Some(Value::from(old_hidden_option_ids.to_vec())),
            Some(Value::from(hidden_option_ids.to_vec())),
            "reorder",
        )
        .await
    }

    /// `calculations` maps a column to the calculation shown under it
    pub async fn change_view_kanban_calculations(
        &self,
        view_id: &BlockId,
        old_calculations: &Value,
        calculations: &Value,
    ) -> Result<(), MutatorError> {
        self.perform_field_change(
            view_id,
            "kanbanCalculations",
            Some(old_calculations.clone()),
            Some(calculations.clone()),
            "updated kanban calculations",
        )
        .await
    }

    /// Toggle whether the text of a table column wraps
    pub async fn toggle_column_wrap(
        &self,
        view_id: &BlockId,
        template_id: &str,
        current_wrapped_ids: &[String],
    ) -> Result<(), MutatorError> {
        let wrapped = if current_wrapped_ids.iter().any(|id| id == template_id) {
            current_wrapped_ids
                .iter()
                .filter(|id| *id != template_id)
                .cloned()
                .collect()
        } else {
            let mut wrapped = current_wrapped_ids.to_vec();
            wrapped.push(template_id.to_string());
            wrapped
        };
        self.perform_field_change(
            view_id,
            "columnWrappedIds",
            Some(Value::from(current_wrapped_ids.to_vec())),
            Some(Value::from(wrapped)),
            "toggle column wrap",
        )
        .await
    }

    /// Hide the board column of a select option. Does nothing if it is
    /// already hidden.
    pub async fn hide_view_column(
        &self,
        view: &Block,
        option_id: &str,
    ) -> Result<(), MutatorError> {
        let mut hidden = view.hidden_option_ids()?;
        if hidden.iter().any(|id| id == option_id) {
            return Ok(());
        }
        let visible: Vec<_> = view
            .visible_option_ids()?
            .into_iter()
            .filter(|id| id != option_id)
            .collect();
        hidden.push(option_id.to_string());

        let mut new_view = view.clone();
        new_view.set_field("visibleOptionIds", &visible)?;
        new_view.set_field("hiddenOptionIds", &hidden)?;
        self.update_block(&new_view, view, "hide column").await
    }

    /// Show a hidden board column again, as the last visible column. Does
    /// nothing if it is not hidden.
    pub async fn unhide_view_column(
        &self,
        view: &Block,
        option_id: &str,
    ) -> Result<(), MutatorError> {
        let hidden = view.hidden_option_ids()?;
        if !hidden.iter().any(|id| id == option_id) {
            return Ok(());
        }
        let hidden: Vec<_> = hidden.into_iter().filter(|id| id != option_id).collect();
        let mut visible: Vec<_> = view
            .visible_option_ids()?
            .into_iter()
            .filter(|id| id != option_id)
            .collect();
        visible.push(option_id.to_string());

        let mut new_view = view.clone();
        new_view.set_field("hiddenOptionIds", &hidden)?;
        new_view.set_field("visibleOptionIds", &visible)?;
        self.update_block(&new_view, view, "show column").await
    }

    pub async fn change_view_card_order(
        &self,
        view: &Block,
        card_order: &[String],
        description: impl Into<String>,
    ) -> Result<(), MutatorError> {
        let change = view_card_order_change(view, card_order)?;
        self.update_block(&change.new_block, &change.block, description)
            .await
    }

    /// Write a board's property templates without recording anything or
    /// publishing the change
    ///
    /// Used while dragging columns, where the caller already shows the new
    /// order and only the final one is worth an undo step.
    pub async fn reorder_properties(
        &self,
        board_id: &BlockId,
        card_properties: &[PropertyTemplate],
    ) -> Result<(), MutatorError> {
        let patch = BlockPatch::field("cardProperties", serde_json::to_value(card_properties)?);
        self.api()
            .patch_block(board_id, &patch, &NoopPublisher)
            .await?;
        Ok(())
    }
}

/// The change which sets the card order of a view
pub fn view_card_order_change(
    view: &Block,
    card_order: &[String],
) -> Result<BlockChange, MutatorError> {
    let mut new_view = view.clone();
    new_view.set_field("cardOrder", card_order)?;
    Ok(BlockChange {
        block: view.clone(),
        new_block: new_view,
    })
}
