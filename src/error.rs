use thiserror::Error;

use crate::form::SubmitState;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),

    #[error("invalid submit state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: SubmitState, to: SubmitState },

    #[error("form submit is already in progress")]
    AlreadySubmitting,

    #[error("field `{0}` is not mounted")]
    FieldNotMounted(String),

    #[error("unknown value type `{0}`")]
    UnknownValueType(String),

    #[error("malformed form document: {0}")]
    MalformedDocument(String),
}

impl From<serde_json::Error> for FormError {
    fn from(error: serde_json::Error) -> Self {
        FormError::MalformedDocument(error.to_string())
    }
}

pub type FormResult<T> = Result<T, FormError>;
