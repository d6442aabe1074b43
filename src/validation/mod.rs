mod custom;
mod engine;
mod rule;

pub use custom::{CustomPredicate, CustomRules};
pub use engine::{FieldValidation, Validator};
pub use rule::{Rule, RuleDescriptor, ValueType};

pub(crate) use rule::as_decimal;
