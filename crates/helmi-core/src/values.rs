//! Flattened release values
//!
//! `helm get values --all` prints nested YAML. Credential lookups address it
//! with dotted paths (`mariadb.rootUser.password`), so the document is
//! flattened once into a path -> scalar map.

use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;

use crate::error::Result;

/// Dotted-path view of a values document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatValues(BTreeMap<String, String>);

impl FlatValues {
    /// Create empty values
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse and flatten a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: YamlValue = serde_yaml::from_str(yaml)?;
        Ok(Self::from_value(&value))
    }

    /// Flatten an already parsed YAML value
    ///
    /// Rules:
    /// - Mappings: recurse, joining keys with `.`
    /// - Scalars: stored as their textual form
    /// - Nulls and sequences: skipped
    pub fn from_value(value: &YamlValue) -> Self {
        let mut values = BTreeMap::new();
        flatten_into(value, String::new(), &mut values);
        Self(values)
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Textual form of a YAML scalar, `None` for nulls and collections
pub fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Tagged(tagged) => scalar_to_string(&tagged.value),
        YamlValue::Null | YamlValue::Sequence(_) | YamlValue::Mapping(_) => None,
    }
}

fn flatten_into(value: &YamlValue, prefix: String, out: &mut BTreeMap<String, String>) {
    match value {
        YamlValue::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = scalar_to_string(key) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, path, out);
            }
        }
        YamlValue::Tagged(tagged) => flatten_into(&tagged.value, prefix, out),
        other => {
            if let Some(scalar) = scalar_to_string(other) {
                if !prefix.is_empty() {
                    out.insert(prefix, scalar);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested_mappings() {
        let values = FlatValues::from_yaml(
            r#"
mariadbUser: app
mariadb:
  rootUser:
    password: s3cret
  port: 3306
persistence:
  enabled: false
"#,
        )
        .unwrap();

        assert_eq!(values.get("mariadbUser"), Some("app"));
        assert_eq!(values.get("mariadb.rootUser.password"), Some("s3cret"));
        assert_eq!(values.get("mariadb.port"), Some("3306"));
        assert_eq!(values.get("persistence.enabled"), Some("false"));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_flatten_skips_nulls_and_sequences() {
        let values = FlatValues::from_yaml(
            r#"
image: mariadb
tag: ~
args:
  - --verbose
"#,
        )
        .unwrap();

        assert_eq!(values.get("image"), Some("mariadb"));
        assert_eq!(values.get("tag"), None);
        assert_eq!(values.get("args"), None);
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_empty_document() {
        let values = FlatValues::from_yaml("").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_collect_from_pairs() {
        let values: FlatValues = [("foo", "bar")].into_iter().collect();
        assert_eq!(values.get("foo"), Some("bar"));
    }
}
