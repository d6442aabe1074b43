//! `showIf` evaluation and the field dependency graph built from it.

use std::collections::{BTreeMap, BTreeSet};

use crate::form::FormValues;
use crate::id::FieldId;
use crate::schema::RenderRuleGroup;
use crate::validation::{Validator, ValueType};

/// OR across groups, AND within a group. No groups means always visible.
pub fn is_visible<F>(
    groups: &[RenderRuleGroup],
    values: &FormValues,
    value_type_of: F,
    validator: &Validator,
) -> bool
where
    F: Fn(&FieldId) -> Option<ValueType>,
{
    if groups.is_empty() {
        return true;
    }
    groups.iter().any(|group| {
        group.iter().all(|(field, rules)| {
            let value_type = value_type_of(field).unwrap_or(ValueType::Mixed);
            validator.passes(value_type, rules, values.get(field))
        })
    })
}

/// Field ids a rule list reads.
pub fn dependencies(groups: &[RenderRuleGroup]) -> BTreeSet<FieldId> {
    groups
        .iter()
        .flat_map(|group| group.keys().cloned())
        .collect()
}

/// Source field id to the conditional nodes whose visibility reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    dependents: BTreeMap<FieldId, BTreeSet<FieldId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: &FieldId, groups: &[RenderRuleGroup]) {
        for source in dependencies(groups) {
            self.dependents
                .entry(source)
                .or_default()
                .insert(node.clone());
        }
    }

    /// Conditional nodes affected by a change to any of `changed`.
    pub fn dependents_of<'a, I>(&self, changed: I) -> BTreeSet<FieldId>
    where
        I: IntoIterator<Item = &'a FieldId>,
    {
        changed
            .into_iter()
            .filter_map(|source| self.dependents.get(source))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn groups(value: Value) -> Vec<RenderRuleGroup> {
        serde_json::from_value(value).expect("render rules parse")
    }

    fn values(value: Value) -> FormValues {
        serde_json::from_value(value).expect("values parse")
    }

    #[test]
    fn empty_rules_are_always_visible() {
        assert!(is_visible(&[], &FormValues::new(), |_| None, &Validator::default()));
    }

    #[test]
    fn groups_or_together_and_entries_and_together() {
        let rules = groups(json!([
            { "country": [{ "equals": "SG" }], "age": [{ "min": 18 }] },
            { "override": [{ "equals": true }] }
        ]));
        let validator = Validator::default();
        let type_of = |id: &FieldId| match id.as_str() {
            "age" => Some(ValueType::Number),
            _ => None,
        };

        assert!(is_visible(
            &rules,
            &values(json!({ "country": "SG", "age": 21 })),
            type_of,
            &validator
        ));
        assert!(!is_visible(
            &rules,
            &values(json!({ "country": "SG", "age": 12 })),
            type_of,
            &validator
        ));
        assert!(is_visible(
            &rules,
            &values(json!({ "age": 12, "override": true })),
            type_of,
            &validator
        ));
    }

    #[test]
    fn empty_source_fails_equality_and_comparisons() {
        let validator = Validator::default();
        let equals = groups(json!([{ "country": [{ "equals": "SG" }] }]));
        assert!(!is_visible(&equals, &FormValues::new(), |_| None, &validator));
        assert!(!is_visible(
            &equals,
            &values(json!({ "country": null })),
            |_| None,
            &validator
        ));

        let not_equals = groups(json!([{ "country": [{ "notEquals": "SG" }] }]));
        assert!(is_visible(&not_equals, &FormValues::new(), |_| None, &validator));

        let at_least = groups(json!([{ "age": [{ "min": 18 }] }]));
        let number = |_: &FieldId| Some(ValueType::Number);
        assert!(!is_visible(&at_least, &values(json!({ "age": "" })), number, &validator));
        assert!(is_visible(&at_least, &values(json!({ "age": 30 })), number, &validator));
    }

    #[test]
    fn filled_rule_hides_until_source_has_value() {
        let rules = groups(json!([{ "toggle": [{ "filled": true }] }]));
        let validator = Validator::default();
        assert!(!is_visible(&rules, &FormValues::new(), |_| None, &validator));
        assert!(is_visible(
            &rules,
            &values(json!({ "toggle": "yes" })),
            |_| None,
            &validator
        ));
    }

    #[test]
    fn graph_maps_sources_to_dependent_nodes() {
        let mut graph = DependencyGraph::new();
        graph.insert(
            &FieldId::new("details"),
            &groups(json!([{ "toggle": [{ "filled": true }] }])),
        );
        graph.insert(
            &FieldId::new("extra"),
            &groups(json!([{ "toggle": [{ "equals": "x" }], "other": [{ "empty": true }] }])),
        );

        let affected = graph.dependents_of([&FieldId::new("toggle")]);
        assert_eq!(
            affected.into_iter().collect::<Vec<_>>(),
            vec![FieldId::new("details"), FieldId::new("extra")]
        );
        assert!(graph.dependents_of([&FieldId::new("unrelated")]).is_empty());
        assert_eq!(graph.len(), 2);
    }
}
