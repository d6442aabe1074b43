use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use super::FrontendEngine;
use crate::conditional::{DependencyGraph, is_visible};
use crate::error::FormResult;
use crate::fields::{ImageUploadState, UploadConfig, event};
use crate::form::{FormValues, read_lock, write_lock};
use crate::id::FieldId;
use crate::registry::{ComponentRegistry, FieldKind, Selection};
use crate::schema::{FormDocument, OptionItem, RenderRuleGroup};
use crate::validation::{FieldValidation, Validator, ValueType};
use crate::wrapper::{FieldNode, SchemaTree, TreeNode};

/// Mount changes can flip other rules; stop after this many rounds.
const MAX_VISIBILITY_PASSES: usize = 64;

pub(super) struct SchemaState {
    pub(super) document: FormDocument,
    pub(super) tree: SchemaTree,
    graph: DependencyGraph,
    rules: BTreeMap<FieldId, Vec<RenderRuleGroup>>,
    own_visible: BTreeMap<FieldId, bool>,
    value_types: BTreeMap<FieldId, ValueType>,
    /// Fields currently mounted, buttons included.
    pub(super) mounted: BTreeMap<FieldId, FieldNode>,
    /// Live option list per choice field.
    pub(super) options: BTreeMap<FieldId, Vec<OptionItem>>,
}

impl SchemaState {
    pub(super) fn build(document: FormDocument, registry: &ComponentRegistry) -> Self {
        let tree = SchemaTree::build(&document, registry);
        let mut graph = DependencyGraph::new();
        let mut rules = BTreeMap::new();
        let mut value_types = BTreeMap::new();
        let mut options = BTreeMap::new();

        tree.visit(|node, _| {
            let (Some(id), Some(schema)) = (node.id(), node.schema()) else {
                return;
            };
            if schema.has_render_rules() && !rules.contains_key(id) {
                graph.insert(id, &schema.show_if);
                rules.insert(id.clone(), schema.show_if.clone());
            }
            if let TreeNode::Field(field) = node {
                value_types
                    .entry(id.clone())
                    .or_insert_with(|| field.field_type.value_type());
                if field.field_type.selection() != Selection::None {
                    options
                        .entry(id.clone())
                        .or_insert_with(|| schema.options().to_vec());
                }
            }
        });

        Self {
            document,
            tree,
            graph,
            rules,
            own_visible: BTreeMap::new(),
            value_types,
            mounted: BTreeMap::new(),
            options,
        }
    }

    /// Own `showIf` result of a node; nodes without rules are always shown.
    pub(super) fn is_shown(&self, id: &FieldId) -> bool {
        self.own_visible.get(id).copied().unwrap_or(true)
    }

    /// Re-evaluates the rules of `ids`. Returns whether any result flipped.
    fn evaluate(&mut self, ids: &BTreeSet<FieldId>, values: &FormValues, validator: &Validator) -> bool {
        let mut toggled = false;
        for id in ids {
            let Some(groups) = self.rules.get(id) else {
                continue;
            };
            let visible = is_visible(
                groups,
                values,
                |field| self.value_types.get(field).copied(),
                validator,
            );
            if self.own_visible.insert(id.clone(), visible) != Some(visible) {
                tracing::debug!(node = %id, visible, "visibility toggled");
                toggled = true;
            }
        }
        toggled
    }

    fn evaluate_all(&mut self, values: &FormValues, validator: &Validator) {
        let ids = self.rules.keys().cloned().collect::<BTreeSet<_>>();
        self.evaluate(&ids, values, validator);
    }

    /// Fields whose whole ancestor chain is shown. The first field with a
    /// given id wins; later duplicates are never mounted.
    fn visible_fields(&self) -> BTreeMap<FieldId, FieldNode> {
        fn walk(
            nodes: &[TreeNode],
            state: &SchemaState,
            visible: &mut BTreeMap<FieldId, FieldNode>,
        ) {
            for node in nodes {
                match node {
                    TreeNode::Field(field) if state.is_shown(&field.id) => {
                        if visible.contains_key(&field.id) {
                            tracing::debug!(field = %field.id, "duplicate field id ignored");
                        } else {
                            visible.insert(field.id.clone(), field.clone());
                        }
                    }
                    TreeNode::Element(element) if state.is_shown(&element.id) => {
                        walk(&element.children, state, visible);
                    }
                    _ => {}
                }
            }
        }
        let mut visible = BTreeMap::new();
        walk(&self.tree.sections, self, &mut visible);
        visible
    }

    pub(super) fn is_mounted(&self, field: &FieldNode) -> bool {
        self.mounted
            .get(&field.id)
            .is_some_and(|mounted| Arc::ptr_eq(&mounted.schema, &field.schema))
    }
}

/// Value type plus rule list a field registers with the controller.
pub(super) fn field_validation(field: &FieldNode) -> FieldValidation {
    let kind = field.field_type.kind();
    let mut rules = kind.map(FieldKind::implicit_rules).unwrap_or_default();
    if kind == Some(FieldKind::ImageUpload) {
        rules.extend(UploadConfig::value_rules(&field.schema));
    } else {
        rules.extend(field.schema.validation.iter().cloned());
    }
    FieldValidation::new(field.field_type.value_type(), rules)
}

struct MountPlan {
    unmount: Vec<FieldNode>,
    mount: Vec<(FieldNode, Option<Value>)>,
    refresh: Vec<(FieldNode, Option<Value>)>,
}

impl FrontendEngine {
    /// Evaluates every rule from scratch and settles the mounted set.
    pub(super) fn refresh_all(&self) -> FormResult<()> {
        let values = self.controller.values()?;
        write_lock(&self.schema, "evaluating all render rules")?
            .evaluate_all(&values, self.controller.validator());
        let changed = self.apply_mounts()?;
        self.sync_visibility(changed)
    }

    /// Re-evaluates the nodes depending on `changed` and follows mount
    /// changes until the visible set stops moving.
    pub(super) fn sync_visibility(&self, mut changed: BTreeSet<FieldId>) -> FormResult<()> {
        for _ in 0..MAX_VISIBILITY_PASSES {
            if changed.is_empty() {
                return Ok(());
            }
            let values = self.controller.values()?;
            let toggled = {
                let mut schema = write_lock(&self.schema, "re-evaluating render rules")?;
                let affected = schema.graph.dependents_of(&changed);
                schema.evaluate(&affected, &values, self.controller.validator())
            };
            if !toggled {
                return Ok(());
            }
            changed = self.apply_mounts()?;
        }
        tracing::warn!("render rules did not settle; leaving the last mounted set");
        Ok(())
    }

    /// Brings the mounted set in line with the visible set. Returns the ids
    /// whose stored value appeared or disappeared.
    pub(super) fn apply_mounts(&self) -> FormResult<BTreeSet<FieldId>> {
        let plan = {
            let mut schema = write_lock(&self.schema, "diffing mounted fields")?;
            let visible = schema.visible_fields();
            let mut plan = MountPlan {
                unmount: Vec::new(),
                mount: Vec::new(),
                refresh: Vec::new(),
            };
            for (id, mounted) in &schema.mounted {
                match visible.get(id) {
                    Some(node) if node.field_type == mounted.field_type => {
                        if !Arc::ptr_eq(&node.schema, &mounted.schema) {
                            let default = schema.document.default_value(id.as_str()).cloned();
                            plan.refresh.push((node.clone(), default));
                        }
                    }
                    _ => plan.unmount.push(mounted.clone()),
                }
            }
            for (id, node) in &visible {
                let remounted = plan.unmount.iter().any(|field| &field.id == id);
                if remounted || !schema.mounted.contains_key(id) {
                    let default = schema.document.default_value(id.as_str()).cloned();
                    plan.mount.push((node.clone(), default));
                }
            }
            schema.mounted = visible;
            plan
        };

        let mut changed = BTreeSet::new();
        for field in &plan.unmount {
            self.unmount_field(field)?;
            changed.insert(field.id.clone());
        }
        for (field, default) in plan.refresh {
            if field.field_type.holds_value() {
                self.controller
                    .register_field(field.id.clone(), field_validation(&field), default)?;
            }
        }
        for (field, default) in plan.mount {
            self.mount_field(&field, default)?;
            changed.insert(field.id.clone());
        }
        Ok(changed)
    }

    fn mount_field(&self, field: &FieldNode, default: Option<Value>) -> FormResult<()> {
        tracing::debug!(field = %field.id, field_type = field.field_type.name(), "mounting field");
        if !field.field_type.holds_value() {
            return Ok(());
        }
        self.controller
            .register_field(field.id.clone(), field_validation(field), default)?;
        self.reconcile_field(&field.id)?;

        if field.field_type.kind() == Some(FieldKind::ImageUpload) {
            let value = self.controller.value(&field.id)?;
            write_lock(&self.uploads, "mounting upload state")?.insert(
                field.id.clone(),
                ImageUploadState::from_value(value.as_ref()),
            );
            self.events.dispatch(event::MOUNT, &field.id, Value::Null)?;
        }
        Ok(())
    }

    fn unmount_field(&self, field: &FieldNode) -> FormResult<()> {
        tracing::debug!(field = %field.id, "unmounting field");
        if field.field_type.holds_value() {
            self.controller.unregister_field(&field.id)?;
        }
        write_lock(&self.uploads, "unmounting upload state")?.remove(&field.id);
        self.events.discard_pending(&field.id)?;
        Ok(())
    }

    pub(super) fn mounted_field(&self, id: &FieldId) -> FormResult<Option<FieldNode>> {
        Ok(read_lock(&self.schema, "reading mounted field")?
            .mounted
            .get(id)
            .cloned())
    }
}
