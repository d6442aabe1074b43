use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::rule::ValueType;

/// `(value, argument) -> passes`. The argument is whatever the schema wrote
/// next to the rule name, e.g. `true` for `{ "mustBeHello": true }`.
pub type CustomPredicate = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Extension vocabulary added through `add_custom_validation`. Owned by one
/// engine instance and handed explicitly to its validator.
#[derive(Clone, Default)]
pub struct CustomRules {
    rules: Arc<RwLock<HashMap<(ValueType, String), CustomPredicate>>>,
}

impl CustomRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, value_type: ValueType, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(%value_type, rule = %name, "registering custom validation rule");
        let mut rules = match self.rules.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rules.insert((value_type, name), Arc::new(predicate));
    }

    /// Type-specific rules shadow `mixed` ones of the same name.
    pub fn get(&self, value_type: ValueType, name: &str) -> Option<CustomPredicate> {
        let rules = match self.rules.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rules
            .get(&(value_type, name.to_string()))
            .or_else(|| rules.get(&(ValueType::Mixed, name.to_string())))
            .cloned()
    }

    pub fn len(&self) -> usize {
        match self.rules.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
