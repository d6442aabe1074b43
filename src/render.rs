//! View tree handed to the host widget layer.
//!
//! Every mounted node appears once, in document order. Hidden subtrees are
//! simply absent.

use std::sync::Arc;

use serde_json::Value;

use crate::id::FieldId;
use crate::registry::{ElementType, FieldType};
use crate::schema::{OptionItem, SchemaNode};

#[derive(Clone, Debug, PartialEq)]
pub struct FormView {
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub test_id: String,
    pub children: Vec<RenderNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderNode {
    Field(FieldView),
    Element(ElementView),
    Text(String),
    Unsupported(UnsupportedView),
}

/// What a field widget needs: the controlled value, the first validation
/// error, and a host warning when one was injected.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldView {
    pub id: FieldId,
    pub field_type: FieldType,
    pub label: Option<String>,
    pub schema: Arc<SchemaNode>,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub warning: Option<String>,
    /// Current option list for choice fields.
    pub options: Vec<OptionItem>,
    /// Field-local alert, e.g. a rejected upload.
    pub alert: Option<String>,
    pub test_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElementView {
    pub id: FieldId,
    pub element_type: ElementType,
    pub schema: Arc<SchemaNode>,
    pub test_id: String,
    pub children: Vec<RenderNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnsupportedView {
    pub id: Option<FieldId>,
    pub message: String,
}

impl FormView {
    /// Every field view, depth first.
    pub fn fields(&self) -> Vec<&FieldView> {
        fn collect<'a>(nodes: &'a [RenderNode], fields: &mut Vec<&'a FieldView>) {
            for node in nodes {
                match node {
                    RenderNode::Field(field) => fields.push(field),
                    RenderNode::Element(element) => collect(&element.children, fields),
                    RenderNode::Text(_) | RenderNode::Unsupported(_) => {}
                }
            }
        }
        let mut fields = Vec::new();
        collect(&self.children, &mut fields);
        fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldView> {
        self.fields().into_iter().find(|field| field.id.as_str() == id)
    }

    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    pub fn unsupported(&self) -> Vec<&UnsupportedView> {
        fn collect<'a>(nodes: &'a [RenderNode], found: &mut Vec<&'a UnsupportedView>) {
            for node in nodes {
                match node {
                    RenderNode::Unsupported(view) => found.push(view),
                    RenderNode::Element(element) => collect(&element.children, found),
                    RenderNode::Field(_) | RenderNode::Text(_) => {}
                }
            }
        }
        let mut found = Vec::new();
        collect(&self.children, &mut found);
        found
    }
}
