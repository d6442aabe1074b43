mod binding;
mod controller;
mod validation;

#[cfg(test)]
mod tests;

pub use binding::FieldState;
pub use controller::{
    BoxedValidationFuture, FieldMeta, FormController, FormOptions, FormSnapshot, FormValues,
    RevalidateMode, SubmitState, ValidationMode, ValidationPhase, ValidationTicket,
};
pub(crate) use controller::{read_lock, write_lock};
pub use validation::Trigger;
