pub use crate::engine::{
    ChangeEvent, ChangeTarget, EngineBuilder, ErrorMessage, FieldBinding, FrontendEngine,
};
pub use crate::error::{FormError, FormResult};
pub use crate::events::{
    DispatchOutcome, FieldEvent, FieldEventBus, FieldEventListener, ListenerOptions, RetryHandle,
};
pub use crate::fields::{AddOutcome, ImageFile, ImageStatus, ReviewStep, UploadConfig};
pub use crate::form::{
    FieldState, FormController, FormOptions, FormValues, RevalidateMode, SubmitState,
    ValidationMode,
};
pub use crate::id::FieldId;
pub use crate::messages::Locale;
pub use crate::registry::{ComponentRegistry, FieldKind, Selection};
pub use crate::render::{FieldView, FormView, RenderNode};
pub use crate::schema::{FormDocument, OptionItem, SchemaNode};
pub use crate::validation::{RuleDescriptor, ValueType};
