//! Selection bookkeeping shared by radio, select, checkbox, chips and
//! multi-select fields.

use serde_json::Value;

use crate::registry::Selection;
use crate::schema::OptionItem;

/// Prunes a stored selection against a new option list.
///
/// Returns `Some(next)` only when the stored value has to change. An absent
/// value stays absent, a single selection whose option disappeared is cleared
/// to `""`, and a multi selection keeps the values still offered in their
/// original order.
pub fn reconcile(
    selection: Selection,
    current: Option<&Value>,
    options: &[OptionItem],
) -> Option<Value> {
    let current = current.filter(|value| !value.is_null())?;
    match selection {
        Selection::None => None,
        Selection::Single => match current {
            Value::String(selected) if selected.is_empty() || offers(options, selected) => None,
            _ => Some(Value::String(String::new())),
        },
        Selection::Multi => {
            let Value::Array(selected) = current else {
                return Some(Value::Array(Vec::new()));
            };
            let kept = selected
                .iter()
                .filter(|value| value.as_str().is_some_and(|value| offers(options, value)))
                .cloned()
                .collect::<Vec<_>>();
            (kept.len() != selected.len()).then_some(Value::Array(kept))
        }
    }
}

/// Checkbox group toggle. Picking the option flagged `none` clears every
/// other selection; picking anything else drops the `none` option.
pub fn toggle_checkbox(current: Option<&Value>, value: &str, options: &[OptionItem]) -> Value {
    let mut selected = current
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let none_value = options
        .iter()
        .find(|option| option.is_none_option())
        .map(|option| option.value.as_str());

    if none_value == Some(value) {
        selected = if selected.iter().any(|selected| selected == value) {
            Vec::new()
        } else {
            vec![value.to_string()]
        };
    } else if let Some(position) = selected.iter().position(|selected| selected == value) {
        selected.remove(position);
    } else {
        selected.retain(|selected| Some(selected.as_str()) != none_value);
        selected.push(value.to_string());
    }

    Value::Array(selected.into_iter().map(Value::String).collect())
}

fn offers(options: &[OptionItem], value: &str) -> bool {
    options.iter().any(|option| option.value == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(values: &[&str]) -> Vec<OptionItem> {
        values
            .iter()
            .map(|value| OptionItem::new(*value, value.to_uppercase()))
            .collect()
    }

    fn with_none(values: &[&str]) -> Vec<OptionItem> {
        let mut options = options(values);
        options.push(OptionItem {
            none: Some(true),
            ..OptionItem::new("none", "None of the above")
        });
        options
    }

    #[test]
    fn multi_selection_shrinks_to_offered_values() {
        let next = reconcile(Selection::Multi, Some(&json!(["a", "b"])), &options(&["a", "c"]));
        assert_eq!(next, Some(json!(["a"])));

        let next = reconcile(Selection::Multi, Some(&json!(["a", "b"])), &options(&["c"]));
        assert_eq!(next, Some(json!([])));

        assert_eq!(
            reconcile(Selection::Multi, Some(&json!(["a"])), &options(&["a", "b"])),
            None
        );
    }

    #[test]
    fn single_selection_clears_when_option_disappears() {
        assert_eq!(
            reconcile(Selection::Single, Some(&json!("b")), &options(&["a"])),
            Some(json!(""))
        );
        assert_eq!(
            reconcile(Selection::Single, Some(&json!("a")), &options(&["a"])),
            None
        );
        assert_eq!(reconcile(Selection::Single, Some(&json!("")), &[]), None);
    }

    #[test]
    fn absent_selection_stays_absent() {
        assert_eq!(reconcile(Selection::Multi, None, &options(&["a"])), None);
        assert_eq!(
            reconcile(Selection::Single, Some(&Value::Null), &options(&["a"])),
            None
        );
        assert_eq!(reconcile(Selection::None, Some(&json!("x")), &[]), None);
    }

    #[test]
    fn malformed_multi_value_resets_to_empty_array() {
        assert_eq!(
            reconcile(Selection::Multi, Some(&json!("a")), &options(&["a"])),
            Some(json!([]))
        );
    }

    #[test]
    fn checkbox_toggles_regular_options() {
        let options = with_none(&["a", "b"]);
        let selected = toggle_checkbox(None, "a", &options);
        assert_eq!(selected, json!(["a"]));
        let selected = toggle_checkbox(Some(&selected), "b", &options);
        assert_eq!(selected, json!(["a", "b"]));
        let selected = toggle_checkbox(Some(&selected), "a", &options);
        assert_eq!(selected, json!(["b"]));
    }

    #[test]
    fn none_option_is_exclusive() {
        let options = with_none(&["a", "b"]);
        let selected = toggle_checkbox(Some(&json!(["a", "b"])), "none", &options);
        assert_eq!(selected, json!(["none"]));

        let selected = toggle_checkbox(Some(&selected), "a", &options);
        assert_eq!(selected, json!(["a"]));

        let selected = toggle_checkbox(Some(&json!(["none"])), "none", &options);
        assert_eq!(selected, json!([]));
    }
}
