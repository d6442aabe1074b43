use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Key of a schema node inside its parent's `children` map. Fields use it as
/// their value store key.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldId(Arc<str>);

impl FieldId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FieldId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<FieldId> for String {
    fn from(value: FieldId) -> Self {
        value.0.to_string()
    }
}

impl From<&String> for FieldId {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

/// Builds the `data-testid` style identifier hosts attach to rendered nodes.
pub fn test_id(id: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) if !suffix.is_empty() => format!("{id}__{}", suffix.to_ascii_lowercase()),
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn field_id_is_usable_as_str_map_key() {
        let mut map = BTreeMap::new();
        map.insert(FieldId::new("field1"), 1);
        assert_eq!(map.get("field1"), Some(&1));
    }

    #[test]
    fn test_id_appends_lowercase_suffix() {
        assert_eq!(test_id("name", Some("Text-Field")), "name__text-field");
        assert_eq!(test_id("name", None), "name");
    }
}
