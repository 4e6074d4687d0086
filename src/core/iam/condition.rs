//! Condition evaluation for policy statements
//!
//! A condition block maps `[Quantifier:]Operator` keys to field maps:
//!
//! ```json
//! {
//!   "ForAllValues:StringLike": { "context:roles": "team/*" },
//!   "IpAddress": { "aws:sourceip": ["10.0.0.0/8"] }
//! }
//! ```
//!
//! Every operator, and every field within it, must pass. String operators
//! compare case-insensitively. Fields are looked up verbatim in the
//! flattened request attributes.

use super::cidr::CidrMatcher;
use super::flatten::{AttributeValue, FlattenedAttributes};
use super::pattern::PatternMatcher;
use super::variables::{VariableSource, VariableSubstitutor};
use crate::core::error::{AuthError, Result};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Base condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    /// Exact match against one of the values
    StringEquals,
    /// Matches none of the values
    StringNotEquals,
    /// Wildcard match against one of the patterns
    StringLike,
    /// Matches none of the patterns
    StringNotLike,
    /// `true`: attribute absent or empty; `false`: present and non-empty
    Null,
    /// Address inside one of the CIDR ranges
    IpAddress,
}

impl ConditionOperator {
    fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::StringEquals => "StringEquals",
            ConditionOperator::StringNotEquals => "StringNotEquals",
            ConditionOperator::StringLike => "StringLike",
            ConditionOperator::StringNotLike => "StringNotLike",
            ConditionOperator::Null => "Null",
            ConditionOperator::IpAddress => "IpAddress",
        }
    }
}

impl FromStr for ConditionOperator {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "StringEquals" => Ok(ConditionOperator::StringEquals),
            "StringNotEquals" => Ok(ConditionOperator::StringNotEquals),
            "StringLike" => Ok(ConditionOperator::StringLike),
            "StringNotLike" => Ok(ConditionOperator::StringNotLike),
            "Null" => Ok(ConditionOperator::Null),
            "IpAddress" => Ok(ConditionOperator::IpAddress),
            other => Err(AuthError::MalformedStatement(format!(
                "unknown condition operator `{}`",
                other
            ))),
        }
    }
}

/// How an operator applies to array-valued attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    /// Every element must satisfy the operator
    ForAllValues,
    /// At least one element must satisfy the operator
    ForAnyValue,
}

/// Parsed `[Quantifier:]Operator` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorKey {
    pub quantifier: Option<Quantifier>,
    pub operator: ConditionOperator,
}

impl OperatorKey {
    pub fn new(operator: ConditionOperator) -> Self {
        OperatorKey {
            quantifier: None,
            operator,
        }
    }

    pub fn quantified(quantifier: Quantifier, operator: ConditionOperator) -> Self {
        OperatorKey {
            quantifier: Some(quantifier),
            operator,
        }
    }
}

impl FromStr for OperatorKey {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        let (quantifier, operator) = match s.split_once(':') {
            Some(("ForAllValues", op)) => (Some(Quantifier::ForAllValues), op),
            Some(("ForAnyValue", op)) => (Some(Quantifier::ForAnyValue), op),
            Some((prefix, _)) => {
                return Err(AuthError::MalformedStatement(format!(
                    "unknown condition quantifier `{}`",
                    prefix
                )))
            }
            None => (None, s),
        };

        Ok(OperatorKey {
            quantifier,
            operator: operator.parse()?,
        })
    }
}

impl fmt::Display for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quantifier {
            Some(Quantifier::ForAllValues) => write!(f, "ForAllValues:{}", self.operator.as_str()),
            Some(Quantifier::ForAnyValue) => write!(f, "ForAnyValue:{}", self.operator.as_str()),
            None => f.write_str(self.operator.as_str()),
        }
    }
}

/// A single operator applied to a single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub operator: OperatorKey,
    /// Flattened attribute key, e.g. `context:roles`
    pub key: String,
    /// Allowed values, patterns, ranges or Null flags
    pub values: Vec<String>,
}

impl Condition {
    /// Create a new condition
    pub fn new(operator: OperatorKey, key: impl Into<String>, values: Vec<String>) -> Self {
        Condition {
            operator,
            key: key.into(),
            values,
        }
    }

    /// Evaluate this condition against the flattened request
    pub fn evaluate(&self, attrs: &FlattenedAttributes) -> bool {
        let attr = attrs.get(&self.key);

        if self.operator.operator == ConditionOperator::Null {
            let absent = attr.map_or(true, AttributeValue::is_empty);
            return self.values.iter().any(|v| match v.to_lowercase().as_str() {
                "true" => absent,
                "false" => !absent,
                _ => false,
            });
        }

        match attr {
            // Key not in request - condition fails
            None => false,
            Some(AttributeValue::Scalar(actual)) => self.element_matches(actual),
            Some(AttributeValue::Array(items)) => match self.operator.quantifier {
                Some(Quantifier::ForAllValues) => {
                    items.iter().all(|item| self.element_matches(item))
                }
                // Unquantified arrays behave as ForAnyValue
                Some(Quantifier::ForAnyValue) | None => {
                    items.iter().any(|item| self.element_matches(item))
                }
            },
        }
    }

    fn element_matches(&self, actual: &str) -> bool {
        match self.operator.operator {
            ConditionOperator::StringEquals => self.any_equal(actual),
            ConditionOperator::StringNotEquals => !self.any_equal(actual),
            ConditionOperator::StringLike => self.any_like(actual),
            ConditionOperator::StringNotLike => !self.any_like(actual),
            ConditionOperator::IpAddress => CidrMatcher::contains_any(&self.values, actual),
            ConditionOperator::Null => false,
        }
    }

    fn any_equal(&self, actual: &str) -> bool {
        let actual = actual.to_lowercase();
        self.values.iter().any(|v| v.to_lowercase() == actual)
    }

    fn any_like(&self, actual: &str) -> bool {
        self.values
            .iter()
            .any(|pattern| PatternMatcher::matches_ignore_case(pattern, actual))
    }

    /// Substitute `${...}` variables in the right-hand-side values
    pub fn resolve(&self, source: &dyn VariableSource) -> Result<Condition> {
        Ok(Condition {
            operator: self.operator,
            key: self.key.clone(),
            values: VariableSubstitutor::resolve_all(&self.values, source)?,
        })
    }
}

/// Conjunction of conditions attached to a statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionBlock {
    conditions: Vec<Condition>,
}

impl ConditionBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition (builder style)
    pub fn with(mut self, operator: OperatorKey, key: impl Into<String>, values: &[&str]) -> Self {
        self.conditions.push(Condition::new(
            operator,
            key,
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse from the JSON wire shape
    pub fn from_value(value: &Value) -> Result<Self> {
        let operators = value.as_object().ok_or_else(|| {
            AuthError::MalformedStatement("Condition must be an object".to_string())
        })?;

        let mut conditions = Vec::new();
        for (op_key, fields) in operators {
            let operator: OperatorKey = op_key.parse()?;
            let fields = fields.as_object().ok_or_else(|| {
                AuthError::MalformedStatement(format!("Condition `{}` must map fields to values", op_key))
            })?;

            for (key, raw) in fields {
                conditions.push(Condition::new(operator, key.clone(), condition_values(raw)?));
            }
        }

        Ok(ConditionBlock { conditions })
    }

    /// True iff every condition passes; an empty block always passes
    pub fn evaluate(&self, attrs: &FlattenedAttributes) -> bool {
        self.conditions.iter().all(|c| c.evaluate(attrs))
    }

    /// Substitute variables in every condition's values
    pub fn resolve(&self, source: &dyn VariableSource) -> Result<ConditionBlock> {
        let conditions = self
            .conditions
            .iter()
            .map(|c| c.resolve(source))
            .collect::<Result<Vec<_>>>()?;
        Ok(ConditionBlock { conditions })
    }
}

fn condition_values(raw: &Value) -> Result<Vec<String>> {
    match raw {
        Value::Array(items) => items.iter().map(condition_scalar).collect(),
        other => Ok(vec![condition_scalar(other)?]),
    }
}

fn condition_scalar(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
        other => Err(AuthError::MalformedStatement(format!(
            "unsupported condition value `{}`",
            other
        ))),
    }
}

impl Serialize for ConditionBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut grouped: Vec<(String, Map<String, Value>)> = Vec::new();
        for condition in &self.conditions {
            let op = condition.operator.to_string();
            let values = match condition.values.as_slice() {
                [single] => Value::String(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            match grouped.iter_mut().find(|(k, _)| *k == op) {
                Some((_, fields)) => {
                    fields.insert(condition.key.clone(), values);
                }
                None => {
                    let mut fields = Map::new();
                    fields.insert(condition.key.clone(), values);
                    grouped.push((op, fields));
                }
            }
        }

        let mut map = serializer.serialize_map(Some(grouped.len()))?;
        for (op, fields) in &grouped {
            map.serialize_entry(op, fields)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConditionBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ConditionBlock::from_value(&value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::iam::flatten::AttributeFlattener;
    use serde_json::json;

    fn attrs(request: Value) -> FlattenedAttributes {
        AttributeFlattener::flatten(&request)
    }

    fn block(value: Value) -> ConditionBlock {
        ConditionBlock::from_value(&value).unwrap()
    }

    #[test]
    fn test_operator_key_parsing() {
        let key: OperatorKey = "ForAnyValue:StringEquals".parse().unwrap();
        assert_eq!(
            key,
            OperatorKey::quantified(Quantifier::ForAnyValue, ConditionOperator::StringEquals)
        );
        assert_eq!(key.to_string(), "ForAnyValue:StringEquals");

        let key: OperatorKey = "IpAddress".parse().unwrap();
        assert_eq!(key, OperatorKey::new(ConditionOperator::IpAddress));

        assert!("NumericLessThan".parse::<OperatorKey>().is_err());
        assert!("Sometimes:StringLike".parse::<OperatorKey>().is_err());
    }

    #[test]
    fn test_string_equals() {
        let cond = block(json!({"StringEquals": {"context:team": ["blue", "green"]}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"team": "Blue"}}))));
        assert!(cond.evaluate(&attrs(json!({"context": {"team": "green"}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"team": "red"}}))));
    }

    #[test]
    fn test_string_not_equals() {
        let cond = block(json!({"StringNotEquals": {"context:team": ["blue", "green"]}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"team": "red"}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"team": "GREEN"}}))));
    }

    #[test]
    fn test_string_like() {
        let cond = block(json!({"StringLike": {"context:email": "*@example.com"}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"email": "alice@Example.com"}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"email": "alice@other.com"}}))));

        let cond = block(json!({"StringNotLike": {"context:email": "*@example.com"}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"email": "alice@other.com"}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"email": "bob@example.com"}}))));
    }

    #[test]
    fn test_missing_attribute_fails() {
        let empty = FlattenedAttributes::new();
        for op in ["StringEquals", "StringNotEquals", "StringLike", "StringNotLike", "IpAddress"] {
            let cond = block(json!({ op: {"context:user": "alice"} }));
            assert!(!cond.evaluate(&empty), "{} should fail on a missing key", op);
        }
    }

    #[test]
    fn test_null_operator() {
        let must_exist = block(json!({"Null": {"context:account": false}}));
        let must_be_absent = block(json!({"Null": {"context:account": "true"}}));

        let present = attrs(json!({"context": {"account": "999"}}));
        let empty = attrs(json!({"context": {"account": ""}}));
        let empty_array = attrs(json!({"context": {"account": []}}));
        let absent = FlattenedAttributes::new();

        assert!(must_exist.evaluate(&present));
        assert!(!must_exist.evaluate(&empty));
        assert!(!must_exist.evaluate(&absent));

        assert!(must_be_absent.evaluate(&absent));
        assert!(must_be_absent.evaluate(&empty));
        assert!(must_be_absent.evaluate(&empty_array));
        assert!(!must_be_absent.evaluate(&present));
    }

    #[test]
    fn test_ip_address() {
        let cond = block(json!({"IpAddress": {"aws:sourceip": ["10.0.0.0/8"]}}));
        assert!(cond.evaluate(&attrs(json!({"aws": {"sourceip": "10.1.2.3"}}))));
        assert!(!cond.evaluate(&attrs(json!({"aws": {"sourceip": "192.168.1.1"}}))));
        assert!(!cond.evaluate(&attrs(json!({"aws": {"sourceip": "garbage"}}))));
    }

    #[test]
    fn test_for_all_values() {
        let cond = block(json!({"ForAllValues:StringLike": {"context:roles": "team/*"}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"roles": ["team/a", "team/b"]}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"roles": ["team/a", "other"]}}))));
    }

    #[test]
    fn test_for_any_value() {
        let cond = block(json!({"ForAnyValue:StringEquals": {"context:permissions": "admin"}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"permissions": ["user", "admin"]}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"permissions": ["user"]}}))));
    }

    #[test]
    fn test_unquantified_array_is_any_value() {
        let cond = block(json!({"StringEquals": {"context:permissions": "admin"}}));
        assert!(cond.evaluate(&attrs(json!({"context": {"permissions": ["user", "admin"]}}))));
        assert!(!cond.evaluate(&attrs(json!({"context": {"permissions": ["user"]}}))));
    }

    #[test]
    fn test_quantifier_inert_for_scalars() {
        let all = block(json!({"ForAllValues:StringEquals": {"context:team": "blue"}}));
        let any = block(json!({"ForAnyValue:StringEquals": {"context:team": "blue"}}));
        let request = attrs(json!({"context": {"team": "blue"}}));
        assert!(all.evaluate(&request));
        assert!(any.evaluate(&request));
    }

    #[test]
    fn test_all_operators_must_pass() {
        let cond = block(json!({
            "StringEquals": {"context:team": "blue", "action": "read"},
            "IpAddress": {"aws:sourceip": "10.0.0.0/8"}
        }));
        assert_eq!(cond.conditions().len(), 3);

        let ok = attrs(json!({"action": "read", "context": {"team": "blue"}, "aws": {"sourceip": "10.0.0.1"}}));
        let wrong_ip = attrs(json!({"action": "read", "context": {"team": "blue"}, "aws": {"sourceip": "11.0.0.1"}}));
        let wrong_action = attrs(json!({"action": "write", "context": {"team": "blue"}, "aws": {"sourceip": "10.0.0.1"}}));

        assert!(cond.evaluate(&ok));
        assert!(!cond.evaluate(&wrong_ip));
        assert!(!cond.evaluate(&wrong_action));
    }

    #[test]
    fn test_mixed_case_keys_never_match() {
        let cond = block(json!({"StringEquals": {"Context:Team": "blue"}}));
        assert!(!cond.evaluate(&attrs(json!({"context": {"team": "blue"}}))));
    }

    #[test]
    fn test_empty_block_passes() {
        assert!(ConditionBlock::new().evaluate(&FlattenedAttributes::new()));
    }

    #[test]
    fn test_malformed_blocks() {
        assert!(ConditionBlock::from_value(&json!("StringEquals")).is_err());
        assert!(ConditionBlock::from_value(&json!({"StringEquals": "x"})).is_err());
        assert!(ConditionBlock::from_value(&json!({"StringEquals": {"k": {"nested": 1}}})).is_err());
        assert!(ConditionBlock::from_value(&json!({"DateLessThan": {"k": "2024"}})).is_err());
    }

    #[test]
    fn test_builder_matches_parsed_block() {
        let built = ConditionBlock::new().with(
            OperatorKey::quantified(Quantifier::ForAllValues, ConditionOperator::StringLike),
            "context:roles",
            &["team/*"],
        );
        assert_eq!(built, block(json!({"ForAllValues:StringLike": {"context:roles": "team/*"}})));

        let json = serde_json::to_value(&built).unwrap();
        assert_eq!(json, json!({"ForAllValues:StringLike": {"context:roles": "team/*"}}));
    }
}
