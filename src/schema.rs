//! Data model of the JSON form document.
//!
//! Nodes are parsed leniently: `children` stays raw JSON until the schema
//! walker classifies it, so one malformed child never invalidates its
//! siblings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FormResult;
use crate::form::{RevalidateMode, ValidationMode};
use crate::id::FieldId;
use crate::validation::RuleDescriptor;

/// One `showIf` entry: every listed field must satisfy its rules.
pub type RenderRuleGroup = BTreeMap<FieldId, Vec<RuleDescriptor>>;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default)]
    pub ui_type: Option<String>,
    #[serde(default)]
    pub reference_key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub validation: Vec<RuleDescriptor>,
    #[serde(default)]
    pub show_if: Vec<RenderRuleGroup>,
    #[serde(default)]
    pub children: Option<Value>,
    #[serde(default)]
    pub options: Option<Vec<OptionItem>>,
    #[serde(default)]
    pub custom_options: Option<Map<String, Value>>,
    /// Type-specific configuration (`editImage`, `maxFiles`, `placeholder`...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SchemaNode {
    pub fn from_value(value: Value) -> FormResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn bool_attribute(&self, key: &str) -> bool {
        self.attribute(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn u64_attribute(&self, key: &str) -> Option<u64> {
        self.attribute(key).and_then(Value::as_u64)
    }

    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(Value::as_str)
    }

    pub fn custom_option(&self, key: &str) -> Option<&Value> {
        self.custom_options.as_ref().and_then(|options| options.get(key))
    }

    pub fn options(&self) -> &[OptionItem] {
        self.options.as_deref().unwrap_or_default()
    }

    pub fn has_render_rules(&self) -> bool {
        !self.show_if.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionItem {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    /// Marks the exclusive "none of the above" option of a checkbox group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_src: Option<String>,
}

impl OptionItem {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn is_none_option(&self) -> bool {
        self.none.unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub default_values: Map<String, Value>,
    #[serde(default)]
    pub validation_mode: Option<ValidationMode>,
    #[serde(default)]
    pub revalidation_mode: Option<RevalidateMode>,
    /// Section id to wrapper node, kept raw and in document order.
    #[serde(default)]
    pub sections: Map<String, Value>,
}

impl FormDocument {
    pub fn from_json(json: &str) -> FormResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> FormResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn default_value(&self, id: &str) -> Option<&Value> {
        self.default_values.get(id).filter(|value| !value.is_null())
    }
}
