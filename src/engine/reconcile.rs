use std::collections::BTreeSet;

use super::{FrontendEngine, document_options};
use crate::error::{FormError, FormResult};
use crate::fields::reconcile;
use crate::form::{read_lock, write_lock};
use crate::id::FieldId;
use crate::registry::Selection;
use crate::schema::{FormDocument, OptionItem};

use super::visibility::SchemaState;

impl FrontendEngine {
    /// Swaps in a new document. Mounted fields keep their values where the
    /// new tree still shows them; choice fields whose options changed by
    /// value are pruned.
    pub fn set_document(&self, document: FormDocument) -> FormResult<()> {
        if self.options_override.is_none() {
            self.controller.set_options(document_options(&document))?;
        }
        let next = SchemaState::build(document, &self.registry);
        let previous_options = {
            let mut schema = write_lock(&self.schema, "replacing form document")?;
            let mounted = std::mem::take(&mut schema.mounted);
            let previous = std::mem::replace(&mut *schema, next);
            schema.mounted = mounted;
            previous.options
        };

        self.refresh_all()?;

        let stale = {
            let schema = read_lock(&self.schema, "collecting changed option lists")?;
            schema
                .options
                .iter()
                .filter(|(id, _)| schema.mounted.contains_key(*id))
                .filter(|(id, options)| previous_options.get(*id) != Some(*options))
                .map(|(id, _)| id.clone())
                .collect::<Vec<_>>()
        };
        let mut changed = BTreeSet::new();
        for id in stale {
            if self.reconcile_field(&id)? {
                changed.insert(id);
            }
        }
        self.sync_visibility(changed)?;
        self.notify_change()
    }

    /// Replaces the option list of one mounted choice field. Nothing happens
    /// when the new list equals the current one by value.
    pub fn set_field_options(
        &self,
        id: impl Into<FieldId>,
        options: Vec<OptionItem>,
    ) -> FormResult<()> {
        let id = id.into();
        {
            let mut schema = write_lock(&self.schema, "updating field options")?;
            let Some(field) = schema.mounted.get(&id) else {
                return Err(FormError::FieldNotMounted(id.to_string()));
            };
            if field.field_type.selection() == Selection::None {
                tracing::warn!(field = %id, "options ignored on a field without choices");
                return Ok(());
            }
            if schema.options.get(&id) == Some(&options) {
                return Ok(());
            }
            schema.options.insert(id.clone(), options);
        }

        if self.reconcile_field(&id)? {
            self.sync_visibility(BTreeSet::from([id]))?;
            self.notify_change()?;
        }
        Ok(())
    }

    pub fn field_options(&self, id: &FieldId) -> FormResult<Vec<OptionItem>> {
        Ok(read_lock(&self.schema, "reading field options")?
            .options
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    /// Prunes the stored selection of `id` against its live options.
    /// Returns whether the value changed.
    pub(super) fn reconcile_field(&self, id: &FieldId) -> FormResult<bool> {
        let (selection, options) = {
            let schema = read_lock(&self.schema, "reading options for reconciliation")?;
            let Some(field) = schema.mounted.get(id) else {
                return Ok(false);
            };
            let selection = field.field_type.selection();
            if selection == Selection::None {
                return Ok(false);
            }
            (
                selection,
                schema.options.get(id).cloned().unwrap_or_default(),
            )
        };

        let current = self.controller.value(id)?;
        let Some(next) = reconcile(selection, current.as_ref(), &options) else {
            return Ok(false);
        };
        tracing::debug!(field = %id, ?current, pruned = %next, "selection pruned to options");
        self.controller.set_silent(id, next)?;
        Ok(true)
    }
}
