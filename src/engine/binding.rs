use serde::Deserialize;
use serde_json::Value;

use super::FrontendEngine;
use crate::error::{FormError, FormResult};
use crate::fields::toggle_checkbox;
use crate::form::{FieldState, SubmitState};
use crate::id::FieldId;
use crate::registry::{FieldKind, FieldType, Selection};

/// `{ target: { value } }`, the shape widgets report edits in.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChangeEvent {
    pub target: ChangeTarget,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChangeTarget {
    pub value: Value,
}

impl ChangeEvent {
    pub fn new(value: Value) -> Self {
        Self {
            target: ChangeTarget { value },
        }
    }
}

/// Controlled binding between one mounted field widget and the store.
#[derive(Clone)]
pub struct FieldBinding {
    engine: FrontendEngine,
    id: FieldId,
    field_type: FieldType,
    state: FieldState,
}

impl FieldBinding {
    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn value(&self) -> Option<&Value> {
        self.state.value.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.state.warning.as_deref()
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn on_change(&self, event: ChangeEvent) -> FormResult<()> {
        self.engine.change(self.id.clone(), event.target.value)
    }

    pub fn on_blur(&self) -> FormResult<()> {
        self.engine.blur(self.id.clone())
    }

    /// Presses a `submit` or `reset` button. Other fields ignore it.
    pub fn activate(&self) -> FormResult<Option<SubmitState>> {
        match self.field_type.kind() {
            Some(FieldKind::Submit) => Ok(Some(self.engine.submit())),
            Some(FieldKind::Reset) => {
                self.engine.reset()?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

impl FrontendEngine {
    pub fn bind(&self, id: impl Into<FieldId>) -> FormResult<FieldBinding> {
        let id = id.into();
        let Some(field) = self.mounted_field(&id)? else {
            return Err(FormError::FieldNotMounted(id.to_string()));
        };
        let state = self.controller.field_state(&id)?;
        Ok(FieldBinding {
            engine: self.clone(),
            id,
            field_type: field.field_type,
            state,
        })
    }

    /// Picks an option the way the field's widget would: single choice
    /// replaces the value, multi choice toggles it.
    pub fn toggle_option(&self, id: impl Into<FieldId>, option: &str) -> FormResult<()> {
        let id = id.into();
        let Some(field) = self.mounted_field(&id)? else {
            return Err(FormError::FieldNotMounted(id.to_string()));
        };
        let next = match field.field_type.selection() {
            Selection::Single => Value::String(option.to_string()),
            Selection::Multi => {
                let current = self.controller.value(&id)?;
                toggle_checkbox(current.as_ref(), option, &self.field_options(&id)?)
            }
            Selection::None => {
                tracing::warn!(field = %id, "option toggled on a field without choices");
                return Ok(());
            }
        };
        self.change(id, next)
    }
}
