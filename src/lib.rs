pub mod conditional;
pub mod engine;
pub mod error;
pub mod events;
pub mod fields;
pub mod form;
pub mod id;
pub mod messages;
pub mod prelude;
pub mod registry;
pub mod render;
pub mod schema;
pub mod validation;
pub mod wrapper;

pub use engine::{EngineBuilder, ErrorMessage, FieldBinding, FrontendEngine};
pub use error::{FormError, FormResult};
pub use form::{FormController, FormOptions, FormValues, SubmitState};
pub use id::FieldId;
pub use schema::FormDocument;
