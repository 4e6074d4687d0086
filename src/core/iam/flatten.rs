//! Request attribute flattening
//!
//! Conditions are evaluated against a flat key space: nested object paths
//! joined with `:` and lowercased (`{"aws": {"SourceIp": ..}}` becomes
//! `aws:sourceip`). Policy authors must write condition keys in this form;
//! anything else simply never matches.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Leaf value of the flattened request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Scalar(String),
    Array(Vec<String>),
}

impl AttributeValue {
    /// Empty string or empty array
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Scalar(s) => s.is_empty(),
            AttributeValue::Array(items) => items.is_empty(),
        }
    }
}

/// Flat, lowercase-keyed evaluation environment for conditions
pub type FlattenedAttributes = BTreeMap<String, AttributeValue>;

/// Builds [`FlattenedAttributes`] from a nested request object
pub struct AttributeFlattener;

impl AttributeFlattener {
    /// Flatten a JSON object; non-object input yields no attributes
    ///
    /// # Examples
    /// ```
    /// use leo_auth::iam::{AttributeFlattener, AttributeValue};
    /// use serde_json::json;
    ///
    /// let attrs = AttributeFlattener::flatten(&json!({
    ///     "Action": "read",
    ///     "context": {"Roles": ["team/a"]}
    /// }));
    /// assert_eq!(attrs["action"], AttributeValue::Scalar("read".into()));
    /// assert_eq!(attrs["context:roles"], AttributeValue::Array(vec!["team/a".into()]));
    /// ```
    pub fn flatten(request: &Value) -> FlattenedAttributes {
        let mut attrs = FlattenedAttributes::new();
        if let Value::Object(map) = request {
            Self::walk(map, None, &mut attrs);
        }
        attrs
    }

    fn walk(map: &Map<String, Value>, prefix: Option<&str>, attrs: &mut FlattenedAttributes) {
        for (key, value) in map {
            let key = match prefix {
                Some(prefix) => format!("{}:{}", prefix, key.to_lowercase()),
                None => key.to_lowercase(),
            };

            match value {
                Value::Null => {}
                Value::Object(inner) => Self::walk(inner, Some(&key), attrs),
                Value::Array(items) => {
                    let items = items.iter().filter_map(leaf_string).collect();
                    attrs.insert(key, AttributeValue::Array(items));
                }
                Value::String(s) => {
                    attrs.insert(key, AttributeValue::Scalar(s.clone()));
                }
                other => {
                    attrs.insert(key, AttributeValue::Scalar(other.to_string()));
                }
            }
        }
    }
}

fn leaf_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scalar(s: &str) -> AttributeValue {
        AttributeValue::Scalar(s.to_string())
    }

    #[test]
    fn test_nested_keys_join_with_colon() {
        let attrs = AttributeFlattener::flatten(&json!({
            "action": "write",
            "lrn": "lrn:leo:bus:::queue/a",
            "aws": {"sourceIp": "10.1.2.3", "Nested": {"Deep": true}}
        }));

        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs["action"], scalar("write"));
        assert_eq!(attrs["aws:sourceip"], scalar("10.1.2.3"));
        assert_eq!(attrs["aws:nested:deep"], scalar("true"));
    }

    #[test]
    fn test_values_keep_their_case() {
        let attrs = AttributeFlattener::flatten(&json!({"Context": {"Team": "Blue"}}));
        assert_eq!(attrs["context:team"], scalar("Blue"));
        assert!(!attrs.contains_key("Context:Team"));
    }

    #[test]
    fn test_arrays_are_leaves() {
        let attrs = AttributeFlattener::flatten(&json!({
            "context": {"roles": ["team/a", 7, null], "empty": []}
        }));
        assert_eq!(
            attrs["context:roles"],
            AttributeValue::Array(vec!["team/a".to_string(), "7".to_string()])
        );
        assert!(attrs["context:empty"].is_empty());
    }

    #[test]
    fn test_nulls_are_absent() {
        let attrs = AttributeFlattener::flatten(&json!({"context": {"gone": null}}));
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_non_object_request() {
        assert!(AttributeFlattener::flatten(&json!("read")).is_empty());
        assert!(AttributeFlattener::flatten(&json!([1, 2])).is_empty());
    }
}
