use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use super::custom::CustomRules;
use super::rule::{Rule, RuleDescriptor, ValueType, as_decimal};
use crate::messages::{self, Messages};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)https?://[^\s/$.?#][^\s]*$").expect("url pattern is valid")
});
static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid pattern is valid")
});

/// Validation shape a field registers under its id: the declared value type
/// plus its ordered rule list.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValidation {
    pub value_type: ValueType,
    pub rules: Vec<RuleDescriptor>,
}

impl FieldValidation {
    pub fn new(value_type: ValueType, rules: Vec<RuleDescriptor>) -> Self {
        Self { value_type, rules }
    }
}

#[derive(Clone, Default)]
pub struct Validator {
    custom: CustomRules,
    messages: Messages,
}

impl Validator {
    pub fn new(custom: CustomRules, messages: Messages) -> Self {
        Self { custom, messages }
    }

    pub fn custom_rules(&self) -> &CustomRules {
        &self.custom
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn add_custom_validation<F>(&self, value_type: ValueType, name: &str, predicate: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.custom.add(value_type, name, predicate);
    }

    /// Runs every rule and returns the failure messages in rule order.
    pub fn validate(
        &self,
        validation: &FieldValidation,
        value: Option<&Value>,
        first_error_only: bool,
    ) -> Vec<String> {
        let value = value.filter(|value| !is_absent(validation.value_type, value));
        if value.is_some_and(|present| !validation.value_type.accepts(present)) {
            return vec![self.messages.t_with(
                messages::TYPE_MISMATCH,
                &[("type", validation.value_type.as_str())],
            )];
        }

        let mut errors = Vec::new();
        for descriptor in &validation.rules {
            if let Err(error) = self.check(validation.value_type, descriptor, value) {
                errors.push(error);
                if first_error_only {
                    break;
                }
            }
        }
        errors
    }

    /// Boolean form used by render rules; type mismatches simply fail.
    ///
    /// Unlike field validation, an absent source value does not skip rules:
    /// equality and membership rules compare it as `null`, and comparison or
    /// format rules fail since there is nothing to compare.
    pub fn passes(
        &self,
        value_type: ValueType,
        rules: &[RuleDescriptor],
        value: Option<&Value>,
    ) -> bool {
        match value.filter(|value| !is_absent(value_type, value)) {
            Some(present) => {
                let validation = FieldValidation::new(value_type, rules.to_vec());
                self.validate(&validation, Some(present), true).is_empty()
            }
            None => rules
                .iter()
                .all(|descriptor| self.passes_absent(value_type, descriptor)),
        }
    }

    fn passes_absent(&self, value_type: ValueType, descriptor: &RuleDescriptor) -> bool {
        match &descriptor.rule {
            Rule::Min(_)
            | Rule::Max(_)
            | Rule::Length(_)
            | Rule::Matches(_)
            | Rule::LessThan(_)
            | Rule::MoreThan(_) => false,
            Rule::Email(enabled)
            | Rule::Url(enabled)
            | Rule::Uuid(enabled)
            | Rule::Integer(enabled)
            | Rule::Positive(enabled)
            | Rule::Negative(enabled) => !*enabled,
            _ => self
                .check_present(value_type, descriptor, &Value::Null)
                .is_ok(),
        }
    }

    fn check(
        &self,
        value_type: ValueType,
        descriptor: &RuleDescriptor,
        value: Option<&Value>,
    ) -> Result<(), String> {
        let rule = &descriptor.rule;
        let Some(value) = value else {
            if !rule.checks_absent_values() {
                return Ok(());
            }
            return self.check_present(value_type, descriptor, &Value::Null);
        };
        self.check_present(value_type, descriptor, value)
    }

    fn check_present(
        &self,
        value_type: ValueType,
        descriptor: &RuleDescriptor,
        value: &Value,
    ) -> Result<(), String> {
        let fail = |key: &str, params: &[(&str, &str)]| -> Result<(), String> {
            Err(descriptor
                .error_message
                .clone()
                .unwrap_or_else(|| self.messages.t_with(key, params)))
        };

        match &descriptor.rule {
            Rule::Required(false) => Ok(()),
            Rule::Required(true) => match value {
                Value::Null => fail(required_key(value_type), &[]),
                Value::String(text) if text.is_empty() => fail(messages::REQUIRED, &[]),
                Value::Array(items) if items.is_empty() => fail(messages::REQUIRED_OPTION, &[]),
                _ => Ok(()),
            },
            Rule::Min(min) => {
                let text = min.to_string();
                match measure(value_type, value) {
                    Measure::Length(length) if length < *min => {
                        fail(messages::MIN_LENGTH, &[("min", &text)])
                    }
                    Measure::Items(count) if count < *min => {
                        fail(messages::MIN_ITEMS, &[("min", &text)])
                    }
                    Measure::Number(number) if number < *min => {
                        fail(messages::MIN_VALUE, &[("min", &text)])
                    }
                    _ => Ok(()),
                }
            }
            Rule::Max(max) => {
                let text = max.to_string();
                match measure(value_type, value) {
                    Measure::Length(length) if length > *max => {
                        fail(messages::MAX_LENGTH, &[("max", &text)])
                    }
                    Measure::Items(count) if count > *max => {
                        fail(messages::MAX_ITEMS, &[("max", &text)])
                    }
                    Measure::Number(number) if number > *max => {
                        fail(messages::MAX_VALUE, &[("max", &text)])
                    }
                    _ => Ok(()),
                }
            }
            Rule::Length(length) => match measure(value_type, value) {
                Measure::Length(actual) | Measure::Items(actual) if actual != *length => {
                    fail(messages::EXACT_LENGTH, &[("length", &length.to_string())])
                }
                _ => Ok(()),
            },
            Rule::Matches(pattern) => {
                let Some(text) = value.as_str() else {
                    return Ok(());
                };
                match compile_pattern(pattern) {
                    Some(regex) if !regex.is_match(text) => fail(messages::INVALID, &[]),
                    _ => Ok(()),
                }
            }
            Rule::Email(true) if !match_text(value, &EMAIL_PATTERN) => fail(messages::EMAIL, &[]),
            Rule::Url(true) if !match_text(value, &URL_PATTERN) => fail(messages::URL, &[]),
            Rule::Uuid(true) if !match_text(value, &UUID_PATTERN) => fail(messages::INVALID, &[]),
            Rule::Email(_) | Rule::Url(_) | Rule::Uuid(_) => Ok(()),
            Rule::Integer(enabled) => match as_decimal(value) {
                Some(number) if *enabled && !number.fract().is_zero() => {
                    fail(messages::INTEGER, &[])
                }
                _ => Ok(()),
            },
            Rule::Positive(enabled) => match as_decimal(value) {
                Some(number) if *enabled && number <= Decimal::ZERO => {
                    fail(messages::POSITIVE, &[])
                }
                _ => Ok(()),
            },
            Rule::Negative(enabled) => match as_decimal(value) {
                Some(number) if *enabled && number >= Decimal::ZERO => {
                    fail(messages::NEGATIVE, &[])
                }
                _ => Ok(()),
            },
            Rule::LessThan(limit) => match as_decimal(value) {
                Some(number) if number >= *limit => {
                    fail(messages::LESS_THAN, &[("value", &limit.to_string())])
                }
                _ => Ok(()),
            },
            Rule::MoreThan(limit) => match as_decimal(value) {
                Some(number) if number <= *limit => {
                    fail(messages::MORE_THAN, &[("value", &limit.to_string())])
                }
                _ => Ok(()),
            },
            Rule::Equals(expected) => {
                if values_equal(value, expected) {
                    Ok(())
                } else {
                    fail(messages::INVALID, &[])
                }
            }
            Rule::NotEquals(expected) => {
                if values_equal(value, expected) {
                    fail(messages::INVALID, &[])
                } else {
                    Ok(())
                }
            }
            Rule::OneOf(candidates) => {
                if candidates.iter().any(|candidate| values_equal(value, candidate)) {
                    Ok(())
                } else {
                    fail(messages::INVALID, &[])
                }
            }
            Rule::Includes(needle) => {
                if contains(value, needle) {
                    Ok(())
                } else {
                    fail(messages::INVALID, &[])
                }
            }
            Rule::Excludes(needle) => {
                if contains(value, needle) {
                    fail(messages::INVALID, &[])
                } else {
                    Ok(())
                }
            }
            Rule::Filled(expected) => {
                if is_empty(value) == *expected {
                    fail(messages::REQUIRED, &[])
                } else {
                    Ok(())
                }
            }
            Rule::Empty(expected) => {
                if is_empty(value) == *expected {
                    Ok(())
                } else {
                    fail(messages::INVALID, &[])
                }
            }
            Rule::Custom { name, argument } => {
                let Some(predicate) = self.custom.get(value_type, name) else {
                    tracing::warn!(rule = %name, %value_type, "skipping unknown validation rule");
                    return Ok(());
                };
                if predicate(value, argument) {
                    Ok(())
                } else {
                    fail(messages::INVALID, &[])
                }
            }
        }
    }
}

enum Measure {
    Length(Decimal),
    Items(Decimal),
    Number(Decimal),
    Unmeasurable,
}

fn measure(value_type: ValueType, value: &Value) -> Measure {
    match value {
        Value::Array(items) => Measure::Items(Decimal::from(items.len())),
        Value::String(text) if value_type != ValueType::Number => {
            Measure::Length(Decimal::from(text.chars().count()))
        }
        _ => as_decimal(value).map_or(Measure::Unmeasurable, Measure::Number),
    }
}

/// `null` is always absent. An empty string is absent for every type that
/// cannot hold text, which is what cleared numeric and choice widgets write.
fn is_absent(value_type: ValueType, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => {
            text.is_empty() && !matches!(value_type, ValueType::String | ValueType::Mixed)
        }
        _ => false,
    }
}

fn required_key(value_type: ValueType) -> &'static str {
    if value_type == ValueType::Array {
        messages::REQUIRED_OPTION
    } else {
        messages::REQUIRED
    }
}

fn match_text(value: &Value, pattern: &Regex) -> bool {
    value.as_str().is_none_or(|text| pattern.is_match(text))
}

/// Accepts both `"^\\d+$"` and the `/^\\d+$/i` literal form schemas copy
/// from JavaScript.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    let source = match pattern.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
        Some((body, flags)) if flags.chars().all(|flag| "imsux".contains(flag)) => {
            if flags.is_empty() {
                body.to_string()
            } else {
                format!("(?{flags}){body}")
            }
        }
        _ => pattern.to_string(),
    };
    match Regex::new(&source) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::warn!(%pattern, %error, "ignoring invalid `matches` pattern");
            None
        }
    }
}

pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if left.is_number() || right.is_number() {
        return matches!((as_decimal(left), as_decimal(right)), (Some(a), Some(b)) if a == b);
    }
    false
}

fn contains(value: &Value, needle: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(text) => needle.as_str().is_some_and(|needle| text.contains(needle)),
        _ => false,
    }
}
