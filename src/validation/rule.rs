use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::FormError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Mixed,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Mixed => "mixed",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number() || as_decimal(value).is_some(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Array => value.is_array(),
            ValueType::Object => value.is_object(),
            ValueType::Mixed => true,
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = FormError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "boolean" => Ok(ValueType::Boolean),
            "array" => Ok(ValueType::Array),
            "object" => Ok(ValueType::Object),
            "mixed" => Ok(ValueType::Mixed),
            other => Err(FormError::UnknownValueType(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Required(bool),
    Min(Decimal),
    Max(Decimal),
    Length(Decimal),
    Matches(String),
    Email(bool),
    Url(bool),
    Uuid(bool),
    Integer(bool),
    Positive(bool),
    Negative(bool),
    LessThan(Decimal),
    MoreThan(Decimal),
    Equals(Value),
    NotEquals(Value),
    OneOf(Vec<Value>),
    Includes(Value),
    Excludes(Value),
    Filled(bool),
    Empty(bool),
    /// Anything not in the built-in vocabulary, resolved against the custom
    /// rule registry when the field is validated.
    Custom { name: String, argument: Value },
}

impl Rule {
    pub fn parse(name: &str, argument: Value) -> Self {
        let decimal = || as_decimal(&argument);
        let flag = || argument.as_bool();
        let parsed = match name {
            "required" => flag().map(Rule::Required),
            "min" => decimal().map(Rule::Min),
            "max" => decimal().map(Rule::Max),
            "length" => decimal().map(Rule::Length),
            "matches" => argument.as_str().map(|pattern| Rule::Matches(pattern.to_string())),
            "email" => flag().map(Rule::Email),
            "url" => flag().map(Rule::Url),
            "uuid" => flag().map(Rule::Uuid),
            "integer" => flag().map(Rule::Integer),
            "positive" => flag().map(Rule::Positive),
            "negative" => flag().map(Rule::Negative),
            "lessThan" => decimal().map(Rule::LessThan),
            "moreThan" => decimal().map(Rule::MoreThan),
            "equals" => Some(Rule::Equals(argument.clone())),
            "notEquals" => Some(Rule::NotEquals(argument.clone())),
            "oneOf" => argument.as_array().cloned().map(Rule::OneOf),
            "includes" => Some(Rule::Includes(argument.clone())),
            "excludes" => Some(Rule::Excludes(argument.clone())),
            "filled" => flag().map(Rule::Filled),
            "empty" => flag().map(Rule::Empty),
            _ => None,
        };
        parsed.unwrap_or_else(|| Rule::Custom {
            name: name.to_string(),
            argument,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Rule::Required(_) => "required",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Length(_) => "length",
            Rule::Matches(_) => "matches",
            Rule::Email(_) => "email",
            Rule::Url(_) => "url",
            Rule::Uuid(_) => "uuid",
            Rule::Integer(_) => "integer",
            Rule::Positive(_) => "positive",
            Rule::Negative(_) => "negative",
            Rule::LessThan(_) => "lessThan",
            Rule::MoreThan(_) => "moreThan",
            Rule::Equals(_) => "equals",
            Rule::NotEquals(_) => "notEquals",
            Rule::OneOf(_) => "oneOf",
            Rule::Includes(_) => "includes",
            Rule::Excludes(_) => "excludes",
            Rule::Filled(_) => "filled",
            Rule::Empty(_) => "empty",
            Rule::Custom { name, .. } => name,
        }
    }

    /// Rules that still run when the value is absent.
    pub(crate) fn checks_absent_values(&self) -> bool {
        matches!(
            self,
            Rule::Required(_) | Rule::Filled(_) | Rule::Empty(_) | Rule::Custom { .. }
        )
    }
}

/// A single entry of a node's `validation` (or a `showIf` entry): one rule key
/// plus an optional `errorMessage` override.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleDescriptor {
    pub rule: Rule,
    pub error_message: Option<String>,
}

impl RuleDescriptor {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            error_message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.rule.name() == name
    }

    pub fn custom_argument(&self, name: &str) -> Option<&Value> {
        match &self.rule {
            Rule::Custom {
                name: rule_name,
                argument,
            } if rule_name == name => Some(argument),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for RuleDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut entries = Map::<String, Value>::deserialize(deserializer)?;
        let error_message = match entries.remove("errorMessage") {
            Some(Value::String(message)) => Some(message),
            _ => None,
        };
        let mut entries = entries.into_iter();
        let Some((name, argument)) = entries.next() else {
            return Err(D::Error::custom("validation rule declares no rule key"));
        };
        for (extra, _) in entries {
            tracing::warn!(rule = %name, extra = %extra, "ignoring extra key in validation rule");
        }
        Ok(Self {
            rule: Rule::parse(&name, argument),
            error_message,
        })
    }
}

pub(crate) fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => {
            let text = number.to_string();
            Decimal::from_str(&text)
                .ok()
                .or_else(|| Decimal::from_scientific(&text).ok())
        }
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Decimal::from_str(text).ok()
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_parses_rule_and_message() {
        let descriptor: RuleDescriptor =
            serde_json::from_value(json!({ "min": 2, "errorMessage": "too short" }))
                .expect("rule parses");
        assert_eq!(descriptor.rule, Rule::Min(Decimal::from(2)));
        assert_eq!(descriptor.error_message.as_deref(), Some("too short"));
    }

    #[test]
    fn unknown_or_malformed_keys_become_custom_rules() {
        let custom: RuleDescriptor =
            serde_json::from_value(json!({ "mustBeHello": true })).expect("rule parses");
        assert_eq!(custom.rule.name(), "mustBeHello");
        assert_eq!(custom.custom_argument("mustBeHello"), Some(&json!(true)));

        let malformed: RuleDescriptor =
            serde_json::from_value(json!({ "min": "abc" })).expect("rule parses");
        assert!(matches!(malformed.rule, Rule::Custom { .. }));
    }

    #[test]
    fn descriptor_without_rule_key_is_rejected() {
        let parsed = serde_json::from_value::<RuleDescriptor>(json!({ "errorMessage": "x" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn value_type_parses_case_insensitively() {
        assert_eq!("String".parse::<ValueType>(), Ok(ValueType::String));
        assert!("text".parse::<ValueType>().is_err());
    }

    #[test]
    fn numeric_strings_count_as_numbers() {
        assert!(ValueType::Number.accepts(&json!("12.5")));
        assert!(!ValueType::Number.accepts(&json!("twelve")));
        assert_eq!(as_decimal(&json!(1.5)), Some(Decimal::new(15, 1)));
    }
}
