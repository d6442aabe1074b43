use serde_json::Value;

use super::controller::{FormController, read_lock};
use crate::error::FormResult;
use crate::id::FieldId;

/// Controlled-input view of one field: what a widget needs to draw itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldState {
    pub value: Option<Value>,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub touched: bool,
    pub dirty: bool,
    pub validating: bool,
}

impl FormController {
    pub fn field_state(&self, id: &FieldId) -> FormResult<FieldState> {
        let state = read_lock(&self.state, "reading field state for binding")?;
        let meta = state.field_meta.get(id);
        Ok(FieldState {
            value: state.values.get(id).cloned(),
            error: meta.and_then(|meta| meta.errors.first().cloned()),
            warning: state.warnings.get(id).cloned(),
            touched: meta.is_some_and(|meta| meta.touched),
            dirty: meta.is_some_and(|meta| meta.dirty),
            validating: meta.is_some_and(|meta| meta.validating),
        })
    }
}
