//! Schema walker: turns a node's raw `children` into classified tree nodes.
//!
//! Authoring errors never fail the walk. Bad entries are skipped or become
//! [`TreeNode::Unsupported`] placeholders in place.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::id::FieldId;
use crate::registry::{Component, ComponentRegistry, ElementType, FieldType};
use crate::schema::{FormDocument, SchemaNode};

#[derive(Clone, Debug, PartialEq)]
pub struct FieldNode {
    pub id: FieldId,
    pub field_type: FieldType,
    pub schema: Arc<SchemaNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElementNode {
    pub id: FieldId,
    pub element_type: ElementType,
    pub schema: Arc<SchemaNode>,
    pub children: Vec<TreeNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TreeNode {
    Field(FieldNode),
    Element(ElementNode),
    /// Literal copy from a string `children`.
    Text(String),
    Unsupported { id: Option<FieldId> },
}

impl TreeNode {
    pub fn id(&self) -> Option<&FieldId> {
        match self {
            TreeNode::Field(field) => Some(&field.id),
            TreeNode::Element(element) => Some(&element.id),
            TreeNode::Text(_) => None,
            TreeNode::Unsupported { id } => id.as_ref(),
        }
    }

    pub fn schema(&self) -> Option<&Arc<SchemaNode>> {
        match self {
            TreeNode::Field(field) => Some(&field.schema),
            TreeNode::Element(element) => Some(&element.schema),
            _ => None,
        }
    }
}

/// Classified form document: one wrapper per section, in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaTree {
    pub sections: Vec<TreeNode>,
}

impl SchemaTree {
    pub fn build(document: &FormDocument, registry: &ComponentRegistry) -> Self {
        Self {
            sections: walk_entries(&document.sections, registry),
        }
    }

    /// Depth-first pre-order visit of every node, with the id of the closest
    /// element ancestor.
    pub fn visit<'a>(&'a self, mut visitor: impl FnMut(&'a TreeNode, Option<&'a FieldId>)) {
        fn walk<'a>(
            nodes: &'a [TreeNode],
            parent: Option<&'a FieldId>,
            visitor: &mut impl FnMut(&'a TreeNode, Option<&'a FieldId>),
        ) {
            for node in nodes {
                visitor(node, parent);
                if let TreeNode::Element(element) = node {
                    walk(&element.children, Some(&element.id), visitor);
                }
            }
        }
        walk(&self.sections, None, &mut visitor);
    }

    pub fn fields(&self) -> Vec<&FieldNode> {
        let mut fields = Vec::new();
        self.visit(|node, _| {
            if let TreeNode::Field(field) = node {
                fields.push(field);
            }
        });
        fields
    }

    pub fn field(&self, id: &FieldId) -> Option<&FieldNode> {
        self.fields().into_iter().find(|field| &field.id == id)
    }
}

/// Walks a `children` value: maps are classified entry by entry, strings are
/// kept verbatim, anything else is a single unsupported placeholder.
pub fn walk_children(children: Option<&Value>, registry: &ComponentRegistry) -> Vec<TreeNode> {
    match children {
        Some(Value::Object(entries)) => walk_entries(entries, registry),
        Some(Value::String(text)) => vec![TreeNode::Text(text.clone())],
        other => {
            tracing::warn!(children = ?other, "unsupported children value");
            vec![TreeNode::Unsupported { id: None }]
        }
    }
}

fn walk_entries(entries: &Map<String, Value>, registry: &ComponentRegistry) -> Vec<TreeNode> {
    entries
        .iter()
        .filter_map(|(id, child)| classify(FieldId::from(id), child, registry))
        .collect()
}

fn classify(id: FieldId, child: &Value, registry: &ComponentRegistry) -> Option<TreeNode> {
    match child {
        Value::Object(entries) if !entries.is_empty() => {}
        _ => {
            tracing::debug!(node = %id, "skipping empty or non-object child");
            return None;
        }
    }

    let schema = match SchemaNode::from_value(child.clone()) {
        Ok(schema) => Arc::new(schema),
        Err(error) => {
            tracing::warn!(node = %id, %error, "malformed schema node");
            return Some(TreeNode::Unsupported { id: Some(id) });
        }
    };

    match registry.resolve(&schema) {
        Component::Field(field_type) => Some(TreeNode::Field(FieldNode {
            id,
            field_type,
            schema,
        })),
        Component::Element(element_type) => {
            if schema.label.is_some() || !schema.validation.is_empty() {
                tracing::warn!(
                    node = %id,
                    "elements do not take label or validation; ignoring them"
                );
            }
            let children = match schema.children.as_ref() {
                None if !element_type.requires_children() => Vec::new(),
                children => walk_children(children, registry),
            };
            Some(TreeNode::Element(ElementNode {
                id,
                element_type,
                schema,
                children,
            }))
        }
        Component::Unsupported => {
            tracing::warn!(
                node = %id,
                ui_type = ?schema.ui_type,
                reference_key = ?schema.reference_key,
                "unsupported node type"
            );
            Some(TreeNode::Unsupported { id: Some(id) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ElementKind, FieldKind};
    use serde_json::json;

    fn tree(document: Value) -> SchemaTree {
        let document = FormDocument::from_value(document).expect("document parses");
        SchemaTree::build(&document, &ComponentRegistry::default())
    }

    #[test]
    fn classifies_fields_elements_and_unsupported_nodes() {
        let tree = tree(json!({
            "sections": {
                "main": {
                    "uiType": "section",
                    "children": {
                        "name": { "uiType": "text-field", "label": "Name" },
                        "intro": { "uiType": "text-body", "children": "Welcome" },
                        "mystery": { "uiType": "hologram" },
                        "empty": {},
                        "junk": 42,
                        "box": {
                            "uiType": "div",
                            "children": { "age": { "uiType": "numeric-field" } }
                        }
                    }
                }
            }
        }));

        let TreeNode::Element(section) = &tree.sections[0] else {
            panic!("section should be an element");
        };
        assert_eq!(
            section.element_type,
            ElementType::Builtin(ElementKind::Wrapper("section"))
        );
        let ids = section
            .children
            .iter()
            .map(|node| node.id().map(FieldId::as_str))
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![Some("name"), Some("intro"), Some("mystery"), Some("box")]
        );
        assert!(matches!(
            &section.children[2],
            TreeNode::Unsupported { id: Some(id) } if id.as_str() == "mystery"
        ));

        let fields = tree.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(
            fields[1].field_type,
            FieldType::Builtin(FieldKind::NumericField)
        );
    }

    #[test]
    fn string_children_render_verbatim() {
        let nodes = walk_children(Some(&json!("Plain copy")), &ComponentRegistry::default());
        assert_eq!(nodes, vec![TreeNode::Text("Plain copy".to_string())]);
    }

    #[test]
    fn non_object_children_become_placeholder() {
        let registry = ComponentRegistry::default();
        assert_eq!(
            walk_children(Some(&json!([1, 2])), &registry),
            vec![TreeNode::Unsupported { id: None }]
        );
        assert_eq!(
            walk_children(None, &registry),
            vec![TreeNode::Unsupported { id: None }]
        );
    }

    #[test]
    fn text_elements_may_omit_children() {
        let tree = tree(json!({
            "sections": {
                "main": {
                    "uiType": "section",
                    "children": { "note": { "uiType": "alert" } }
                }
            }
        }));
        let TreeNode::Element(section) = &tree.sections[0] else {
            panic!("section should be an element");
        };
        let TreeNode::Element(alert) = &section.children[0] else {
            panic!("alert should be an element");
        };
        assert!(alert.children.is_empty());
    }

    #[test]
    fn malformed_node_is_reported_in_place() {
        let tree = tree(json!({
            "sections": {
                "main": {
                    "uiType": "section",
                    "children": {
                        "broken": { "uiType": "text-field", "validation": "required" }
                    }
                }
            }
        }));
        let TreeNode::Element(section) = &tree.sections[0] else {
            panic!("section should be an element");
        };
        assert!(matches!(
            &section.children[0],
            TreeNode::Unsupported { id: Some(id) } if id.as_str() == "broken"
        ));
    }

    #[test]
    fn custom_components_nest() {
        let tree = tree(json!({
            "sections": {
                "main": {
                    "uiType": "section",
                    "children": {
                        "filters": {
                            "referenceKey": "filter",
                            "children": {
                                "colour": {
                                    "referenceKey": "filter-item",
                                    "children": {
                                        "colours": {
                                            "referenceKey": "filter-checkbox",
                                            "options": [{ "label": "Red", "value": "red" }]
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }));
        let fields = tree.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id.as_str(), "colours");
        assert!(tree.field(&FieldId::new("colours")).is_some());
    }
}
