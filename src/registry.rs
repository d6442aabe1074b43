//! Type tag to implementation lookup.
//!
//! Built-in tags live in process-wide tables built once on first use. Custom
//! components are keyed by `referenceKey` and owned by a [`ComponentRegistry`]
//! value handed to the engine, so two engines never share extensions.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::schema::SchemaNode;
use crate::validation::{Rule, RuleDescriptor, ValueType};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Selection {
    None,
    Single,
    Multi,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldKind {
    Checkbox,
    Chips,
    ContactField,
    DateField,
    EmailField,
    ImageUpload,
    MultiSelect,
    RangeSelect,
    NumericField,
    Radio,
    Reset,
    Select,
    Submit,
    Switch,
    Textarea,
    TextField,
    TimeField,
    UnitNumberField,
}

impl FieldKind {
    pub const ALL: [FieldKind; 18] = [
        FieldKind::Checkbox,
        FieldKind::Chips,
        FieldKind::ContactField,
        FieldKind::DateField,
        FieldKind::EmailField,
        FieldKind::ImageUpload,
        FieldKind::MultiSelect,
        FieldKind::RangeSelect,
        FieldKind::NumericField,
        FieldKind::Radio,
        FieldKind::Reset,
        FieldKind::Select,
        FieldKind::Submit,
        FieldKind::Switch,
        FieldKind::Textarea,
        FieldKind::TextField,
        FieldKind::TimeField,
        FieldKind::UnitNumberField,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            FieldKind::Checkbox => "checkbox",
            FieldKind::Chips => "chips",
            FieldKind::ContactField => "contact-field",
            FieldKind::DateField => "date-field",
            FieldKind::EmailField => "email-field",
            FieldKind::ImageUpload => "image-upload",
            FieldKind::MultiSelect => "multi-select",
            FieldKind::RangeSelect => "range-select",
            FieldKind::NumericField => "numeric-field",
            FieldKind::Radio => "radio",
            FieldKind::Reset => "reset",
            FieldKind::Select => "select",
            FieldKind::Submit => "submit",
            FieldKind::Switch => "switch",
            FieldKind::Textarea => "textarea",
            FieldKind::TextField => "text-field",
            FieldKind::TimeField => "time-field",
            FieldKind::UnitNumberField => "unit-number-field",
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            FieldKind::Checkbox | FieldKind::Chips | FieldKind::MultiSelect => ValueType::Array,
            FieldKind::ImageUpload => ValueType::Array,
            FieldKind::NumericField | FieldKind::UnitNumberField => ValueType::Number,
            FieldKind::Switch => ValueType::Boolean,
            FieldKind::RangeSelect => ValueType::Object,
            FieldKind::Reset | FieldKind::Submit => ValueType::Mixed,
            FieldKind::ContactField
            | FieldKind::DateField
            | FieldKind::EmailField
            | FieldKind::Radio
            | FieldKind::Select
            | FieldKind::Textarea
            | FieldKind::TextField
            | FieldKind::TimeField => ValueType::String,
        }
    }

    pub fn selection(self) -> Selection {
        match self {
            FieldKind::Checkbox | FieldKind::Chips | FieldKind::MultiSelect => Selection::Multi,
            FieldKind::Radio | FieldKind::Select => Selection::Single,
            _ => Selection::None,
        }
    }

    /// Buttons are mounted like fields but never hold a value.
    pub fn is_button(self) -> bool {
        matches!(self, FieldKind::Reset | FieldKind::Submit)
    }

    pub(crate) fn implicit_rules(self) -> Vec<RuleDescriptor> {
        match self {
            FieldKind::EmailField => vec![RuleDescriptor::new(Rule::Email(true))],
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CustomField {
    pub reference_key: String,
    pub value_type: ValueType,
    pub selection: Selection,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    Builtin(FieldKind),
    Custom(CustomField),
}

impl FieldType {
    pub fn name(&self) -> &str {
        match self {
            FieldType::Builtin(kind) => kind.tag(),
            FieldType::Custom(custom) => &custom.reference_key,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            FieldType::Builtin(kind) => kind.value_type(),
            FieldType::Custom(custom) => custom.value_type,
        }
    }

    pub fn selection(&self) -> Selection {
        match self {
            FieldType::Builtin(kind) => kind.selection(),
            FieldType::Custom(custom) => custom.selection,
        }
    }

    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            FieldType::Builtin(kind) => Some(*kind),
            FieldType::Custom(_) => None,
        }
    }

    pub fn holds_value(&self) -> bool {
        !self.kind().is_some_and(FieldKind::is_button)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ElementKind {
    Alert,
    /// Typography element; carries the text variant (`d1`, `body`...).
    Text(&'static str),
    /// Generic container rendered as the given tag (`div`, `h1`, `section`...).
    Wrapper(&'static str),
}

impl ElementKind {
    pub fn tag(self) -> String {
        match self {
            ElementKind::Alert => "alert".to_string(),
            ElementKind::Text(variant) => format!("text-{variant}"),
            ElementKind::Wrapper(tag) => tag.to_string(),
        }
    }

    /// Alerts and text may omit `children`; wrappers need something to walk.
    pub fn requires_children(self) -> bool {
        matches!(self, ElementKind::Wrapper(_))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CustomElement {
    pub reference_key: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ElementType {
    Builtin(ElementKind),
    Custom(CustomElement),
}

impl ElementType {
    pub fn name(&self) -> String {
        match self {
            ElementType::Builtin(kind) => kind.tag(),
            ElementType::Custom(custom) => custom.reference_key.clone(),
        }
    }

    pub fn requires_children(&self) -> bool {
        match self {
            ElementType::Builtin(kind) => kind.requires_children(),
            ElementType::Custom(_) => false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Component {
    Field(FieldType),
    Element(ElementType),
    Unsupported,
}

const TEXT_VARIANTS: [&str; 12] = [
    "d1", "d2", "dbody", "h1", "h2", "h3", "h4", "h5", "h6", "body", "bodysmall", "xsmall",
];
const WRAPPER_TAGS: [&str; 12] = [
    "div", "span", "header", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "p", "section",
];

static FIELD_TAGS: LazyLock<HashMap<&'static str, FieldKind>> =
    LazyLock::new(|| FieldKind::ALL.iter().map(|kind| (kind.tag(), *kind)).collect());

static ELEMENT_TAGS: LazyLock<HashMap<String, ElementKind>> = LazyLock::new(|| {
    let mut tags = HashMap::new();
    tags.insert("alert".to_string(), ElementKind::Alert);
    for variant in TEXT_VARIANTS {
        tags.insert(format!("text-{variant}"), ElementKind::Text(variant));
    }
    for tag in WRAPPER_TAGS {
        tags.insert(tag.to_string(), ElementKind::Wrapper(tag));
    }
    tags
});

/// Custom component table, cheap to clone and immutable once built.
#[derive(Clone, Debug)]
pub struct ComponentRegistry {
    inner: Arc<RegistryTables>,
}

#[derive(Debug, Default)]
struct RegistryTables {
    fields: HashMap<String, CustomField>,
    elements: HashMap<String, CustomElement>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ComponentRegistry {
    /// Starts from the bundled filter components.
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
            .custom_element("filter")
            .custom_element("filter-item")
            .custom_field("filter-checkbox", ValueType::Array, Selection::Multi)
    }

    pub fn empty() -> Self {
        ComponentRegistryBuilder::default().build()
    }

    pub fn field(tag: &str) -> Option<FieldKind> {
        FIELD_TAGS.get(tag.trim().to_ascii_lowercase().as_str()).copied()
    }

    pub fn element(tag: &str) -> Option<ElementKind> {
        ELEMENT_TAGS.get(&tag.trim().to_ascii_lowercase()).copied()
    }

    pub fn custom_field(&self, reference_key: &str) -> Option<&CustomField> {
        self.inner
            .fields
            .get(&reference_key.trim().to_ascii_lowercase())
    }

    pub fn custom_element(&self, reference_key: &str) -> Option<&CustomElement> {
        self.inner
            .elements
            .get(&reference_key.trim().to_ascii_lowercase())
    }

    /// Classifies a node. A `referenceKey` wins over `uiType` and only
    /// consults the custom tables.
    pub fn resolve(&self, node: &SchemaNode) -> Component {
        if let Some(reference_key) = node.reference_key.as_deref() {
            if node.ui_type.is_some() {
                tracing::warn!(%reference_key, "node declares both referenceKey and uiType");
            }
            if let Some(field) = self.custom_field(reference_key) {
                return Component::Field(FieldType::Custom(field.clone()));
            }
            if let Some(element) = self.custom_element(reference_key) {
                return Component::Element(ElementType::Custom(element.clone()));
            }
            return Component::Unsupported;
        }

        let Some(ui_type) = node.ui_type.as_deref() else {
            return Component::Unsupported;
        };
        if let Some(kind) = Self::field(ui_type) {
            return Component::Field(FieldType::Builtin(kind));
        }
        if let Some(kind) = Self::element(ui_type) {
            return Component::Element(ElementType::Builtin(kind));
        }
        Component::Unsupported
    }
}

#[derive(Debug, Default)]
pub struct ComponentRegistryBuilder {
    tables: RegistryTables,
}

impl ComponentRegistryBuilder {
    pub fn custom_field(
        mut self,
        reference_key: impl Into<String>,
        value_type: ValueType,
        selection: Selection,
    ) -> Self {
        let reference_key = reference_key.into().to_ascii_lowercase();
        self.tables.elements.remove(&reference_key);
        self.tables.fields.insert(
            reference_key.clone(),
            CustomField {
                reference_key,
                value_type,
                selection,
            },
        );
        self
    }

    pub fn custom_element(mut self, reference_key: impl Into<String>) -> Self {
        let reference_key = reference_key.into().to_ascii_lowercase();
        self.tables.fields.remove(&reference_key);
        self.tables
            .elements
            .insert(reference_key.clone(), CustomElement { reference_key });
        self
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            inner: Arc::new(self.tables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> SchemaNode {
        SchemaNode::from_value(value).expect("node parses")
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = ComponentRegistry::default();
        assert_eq!(
            registry.resolve(&node(json!({ "uiType": "TEXT-Field" }))),
            Component::Field(FieldType::Builtin(FieldKind::TextField))
        );
        assert_eq!(
            registry.resolve(&node(json!({ "uiType": "Text-H3" }))),
            Component::Element(ElementType::Builtin(ElementKind::Text("h3")))
        );
        assert_eq!(
            registry.resolve(&node(json!({ "uiType": "DIV" }))),
            Component::Element(ElementType::Builtin(ElementKind::Wrapper("div")))
        );
    }

    #[test]
    fn unknown_tags_are_unsupported() {
        let registry = ComponentRegistry::default();
        assert_eq!(
            registry.resolve(&node(json!({ "uiType": "hologram" }))),
            Component::Unsupported
        );
        assert_eq!(registry.resolve(&node(json!({}))), Component::Unsupported);
    }

    #[test]
    fn reference_key_takes_precedence_and_uses_custom_table() {
        let registry = ComponentRegistry::default();
        assert!(matches!(
            registry.resolve(&node(json!({ "referenceKey": "FILTER-CHECKBOX", "uiType": "div" }))),
            Component::Field(FieldType::Custom(_))
        ));
        // built-in tags are not reachable through referenceKey
        assert_eq!(
            registry.resolve(&node(json!({ "referenceKey": "text-field" }))),
            Component::Unsupported
        );
    }

    #[test]
    fn builder_adds_host_components() {
        let registry = ComponentRegistry::builder()
            .custom_field("signature", ValueType::String, Selection::None)
            .custom_element("banner")
            .build();
        let Component::Field(field) = registry.resolve(&node(json!({ "referenceKey": "signature" })))
        else {
            panic!("signature should resolve to a field");
        };
        assert_eq!(field.value_type(), ValueType::String);
        assert!(matches!(
            registry.resolve(&node(json!({ "referenceKey": "Banner" }))),
            Component::Element(ElementType::Custom(_))
        ));
        assert!(ComponentRegistry::empty().custom_element("filter").is_none());
    }

    #[test]
    fn field_kinds_declare_value_shape() {
        assert_eq!(FieldKind::Checkbox.selection(), Selection::Multi);
        assert_eq!(FieldKind::Radio.value_type(), ValueType::String);
        assert!(!FieldType::Builtin(FieldKind::Submit).holds_value());
        assert_eq!(FieldKind::EmailField.implicit_rules().len(), 1);
    }
}
