use std::collections::BTreeMap;

use super::FrontendEngine;
use super::visibility::SchemaState;
use crate::error::FormResult;
use crate::fields::{ImageUploadState, UploadConfig};
use crate::form::{FormSnapshot, read_lock};
use crate::id::{FieldId, test_id};
use crate::messages::{self, Messages};
use crate::render::{ElementView, FieldView, FormView, RenderNode, UnsupportedView};
use crate::wrapper::{FieldNode, TreeNode};

const ROOT_TEST_ID: &str = "frontend-engine";

struct RenderContext<'a> {
    schema: &'a SchemaState,
    snapshot: &'a FormSnapshot,
    uploads: &'a BTreeMap<FieldId, ImageUploadState>,
    messages: &'a Messages,
}

impl RenderContext<'_> {
    fn nodes(&self, nodes: &[TreeNode]) -> Vec<RenderNode> {
        nodes.iter().filter_map(|node| self.node(node)).collect()
    }

    fn node(&self, node: &TreeNode) -> Option<RenderNode> {
        match node {
            TreeNode::Field(field) => self
                .schema
                .is_mounted(field)
                .then(|| RenderNode::Field(self.field(field))),
            TreeNode::Element(element) => {
                if !self.schema.is_shown(&element.id) {
                    return None;
                }
                Some(RenderNode::Element(ElementView {
                    id: element.id.clone(),
                    test_id: test_id(element.id.as_str(), Some(&element.element_type.name())),
                    element_type: element.element_type.clone(),
                    schema: element.schema.clone(),
                    children: self.nodes(&element.children),
                }))
            }
            TreeNode::Text(text) => Some(RenderNode::Text(text.clone())),
            TreeNode::Unsupported { id } => Some(RenderNode::Unsupported(UnsupportedView {
                id: id.clone(),
                message: self.messages.t(messages::UNSUPPORTED),
            })),
        }
    }

    fn field(&self, field: &FieldNode) -> FieldView {
        let id = &field.id;
        let alert = self.uploads.get(id).and_then(|state| {
            state.alert(&UploadConfig::from_schema(&field.schema), self.messages)
        });
        FieldView {
            id: id.clone(),
            field_type: field.field_type.clone(),
            label: field.schema.label.clone(),
            schema: field.schema.clone(),
            value: self.snapshot.values.get(id).cloned(),
            error: self
                .snapshot
                .field_meta
                .get(id)
                .and_then(|meta| meta.errors.first().cloned()),
            warning: self.snapshot.warnings.get(id).cloned(),
            options: self.schema.options.get(id).cloned().unwrap_or_default(),
            alert,
            test_id: test_id(id.as_str(), Some(field.field_type.name())),
        }
    }
}

impl FrontendEngine {
    /// Builds the view tree for the current state.
    pub fn render(&self) -> FormResult<FormView> {
        let snapshot = self.controller.snapshot()?;
        let schema = read_lock(&self.schema, "rendering form")?;
        let uploads = read_lock(&self.uploads, "rendering upload fields")?;
        let context = RenderContext {
            schema: &schema,
            snapshot: &snapshot,
            uploads: &uploads,
            messages: self.controller.validator().messages(),
        };
        let document = &schema.document;
        Ok(FormView {
            id: document.id.clone(),
            class_name: document.class_name.clone(),
            test_id: test_id(document.id.as_deref().unwrap_or(ROOT_TEST_ID), None),
            children: context.nodes(&schema.tree.sections),
        })
    }
}
