//! Policy variable substitution
//!
//! Resolves `${context.<path>}` and bare `${<field>}` tokens inside policy
//! values against a principal. A token that fills the entire value keeps
//! array-valued context intact; an embedded token joins arrays with `,`.
//! Unknown variables fail the decision rather than defaulting.

use crate::core::error::{AuthError, Result};
use crate::core::principal::{ContextValue, Principal};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("variable pattern is valid"))
}

/// Source of variable values
pub trait VariableSource {
    /// Look up a variable by its name inside `${...}`
    fn lookup(&self, name: &str) -> Option<ContextValue>;
}

impl VariableSource for Principal {
    fn lookup(&self, name: &str) -> Option<ContextValue> {
        match name.strip_prefix("context.") {
            Some(path) => self.context_path(path),
            None => self.field(name),
        }
    }
}

/// Result of resolving a single template value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Text(String),
    List(Vec<String>),
}

impl Resolved {
    pub fn into_values(self) -> Vec<String> {
        match self {
            Resolved::Text(s) => vec![s],
            Resolved::List(items) => items,
        }
    }
}

/// Resolves policy templates against a [`VariableSource`]
pub struct VariableSubstitutor;

impl VariableSubstitutor {
    /// Resolve every `${...}` token in a string
    ///
    /// # Examples
    /// ```
    /// use leo_auth::iam::{Resolved, VariableSubstitutor};
    /// use leo_auth::Principal;
    ///
    /// let principal = Principal::new("u").with_context("account", "999");
    /// let resolved = VariableSubstitutor::resolve(
    ///     "lrn:leo:data:::account/${context.account}/*",
    ///     &principal,
    /// ).unwrap();
    /// assert_eq!(resolved, Resolved::Text("lrn:leo:data:::account/999/*".into()));
    /// ```
    pub fn resolve(template: &str, source: &dyn VariableSource) -> Result<Resolved> {
        let pattern = variable_pattern();

        // Whole-value token: arrays survive as arrays
        if let Some(caps) = pattern.captures(template) {
            let whole = caps.get(0).map(|m| m.start() == 0 && m.end() == template.len());
            if whole == Some(true) {
                let name = caps[1].trim();
                return match Self::lookup(name, source)? {
                    ContextValue::Array(items) => Ok(Resolved::List(items)),
                    other => Ok(Resolved::Text(Self::render(&other))),
                };
            }
        } else {
            return Ok(Resolved::Text(template.to_string()));
        }

        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in pattern.captures_iter(template) {
            let Some(token) = caps.get(0) else { continue };
            out.push_str(&template[last..token.start()]);
            let value = Self::lookup(caps[1].trim(), source)?;
            out.push_str(&Self::render(&value));
            last = token.end();
        }
        out.push_str(&template[last..]);

        Ok(Resolved::Text(out))
    }

    /// Resolve a list of template values, splicing whole-value arrays in place
    pub fn resolve_all<S: AsRef<str>>(
        templates: &[S],
        source: &dyn VariableSource,
    ) -> Result<Vec<String>> {
        let mut values = Vec::with_capacity(templates.len());
        for template in templates {
            values.extend(Self::resolve(template.as_ref(), source)?.into_values());
        }
        Ok(values)
    }

    /// Resolve every string inside a JSON document
    pub fn resolve_json(template: &Value, source: &dyn VariableSource) -> Result<Value> {
        match template {
            Value::String(s) => Ok(match Self::resolve(s, source)? {
                Resolved::Text(text) => Value::String(text),
                Resolved::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
            }),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match (item, Self::resolve_json(item, source)?) {
                        // A whole-value array token inside a list splices into it
                        (Value::String(_), Value::Array(spliced)) => out.extend(spliced),
                        (_, resolved) => out.push(resolved),
                    }
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), Self::resolve_json(value, source)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn lookup(name: &str, source: &dyn VariableSource) -> Result<ContextValue> {
        source
            .lookup(name)
            .map(|value| value.resolved())
            .ok_or_else(|| AuthError::MissingVariable(name.to_string()))
    }

    fn render(value: &ContextValue) -> String {
        match value {
            ContextValue::Scalar(s) => s.clone(),
            ContextValue::Array(items) => items.join(","),
            other => other.to_json().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn principal() -> Principal {
        Principal::new("user-1")
            .with_identity("role/test")
            .with_context("account", "999")
            .with_context("roles", ContextValue::array(["team/a", "team/b"]))
            .with_context(
                "computed",
                ContextValue::resolver(|| ContextValue::array(["x", "y"])),
            )
    }

    #[test]
    fn test_embedded_scalar() {
        let resolved = VariableSubstitutor::resolve(
            "lrn:leo:data:::account/${context.account}/*",
            &principal(),
        )
        .unwrap();
        assert_eq!(resolved, Resolved::Text("lrn:leo:data:::account/999/*".to_string()));
    }

    #[test]
    fn test_missing_variable_fails() {
        let err = VariableSubstitutor::resolve(
            "lrn:leo:data:::account/${context.missing}/*",
            &Principal::new("u"),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::MissingVariable(name) if name == "context.missing"));
    }

    #[test]
    fn test_whole_value_array_stays_array() {
        let resolved = VariableSubstitutor::resolve("${context.roles}", &principal()).unwrap();
        assert_eq!(
            resolved,
            Resolved::List(vec!["team/a".to_string(), "team/b".to_string()])
        );
    }

    #[test]
    fn test_embedded_array_joins() {
        let resolved = VariableSubstitutor::resolve("roles=${context.roles}", &principal()).unwrap();
        assert_eq!(resolved, Resolved::Text("roles=team/a,team/b".to_string()));
    }

    #[test]
    fn test_resolver_invoked() {
        let resolved = VariableSubstitutor::resolve("${context.computed}", &principal()).unwrap();
        assert_eq!(resolved, Resolved::List(vec!["x".to_string(), "y".to_string()]));

        let resolved = VariableSubstitutor::resolve("a-${context.computed}", &principal()).unwrap();
        assert_eq!(resolved, Resolved::Text("a-x,y".to_string()));
    }

    #[test]
    fn test_bare_principal_fields() {
        let resolved = VariableSubstitutor::resolve("user/${identity_id}", &principal()).unwrap();
        assert_eq!(resolved, Resolved::Text("user/user-1".to_string()));

        let resolved = VariableSubstitutor::resolve("${identities}", &principal()).unwrap();
        assert_eq!(resolved, Resolved::List(vec!["role/test".to_string()]));
    }

    #[test]
    fn test_multiple_tokens() {
        let resolved = VariableSubstitutor::resolve(
            "${identity_id}/${context.account}/${ context.account }",
            &principal(),
        )
        .unwrap();
        assert_eq!(resolved, Resolved::Text("user-1/999/999".to_string()));
    }

    #[test]
    fn test_plain_strings_untouched() {
        let resolved = VariableSubstitutor::resolve("lrn:leo:*", &principal()).unwrap();
        assert_eq!(resolved, Resolved::Text("lrn:leo:*".to_string()));
    }

    #[test]
    fn test_resolve_all_splices_lists() {
        let values = VariableSubstitutor::resolve_all(
            &["${context.roles}", "static", "${context.account}"],
            &principal(),
        )
        .unwrap();
        assert_eq!(values, vec!["team/a", "team/b", "static", "999"]);
    }

    #[test]
    fn test_resolve_json_document() {
        let resolved = VariableSubstitutor::resolve_json(
            &json!({
                "StringEquals": {"context:account": "${context.account}"},
                "ForAnyValue:StringLike": {"context:roles": ["${context.roles}", "admin"]},
                "Null": {"context:x": false}
            }),
            &principal(),
        )
        .unwrap();

        assert_eq!(
            resolved,
            json!({
                "StringEquals": {"context:account": "999"},
                "ForAnyValue:StringLike": {"context:roles": ["team/a", "team/b", "admin"]},
                "Null": {"context:x": false}
            })
        );
    }
}
