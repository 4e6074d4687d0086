//! Principals and their context
//!
//! A principal is the caller being authorized: an identity id, the named
//! identities (roles/groups) it belongs to, and a context bag whose values
//! feed `${...}` policy variables and `context:*` condition attributes.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Zero-argument resolver stored in a principal's context
pub type ResolverFn = Arc<dyn Fn() -> ContextValue + Send + Sync>;

/// A value in a principal's context
#[derive(Clone)]
pub enum ContextValue {
    Scalar(String),
    Array(Vec<String>),
    Map(BTreeMap<String, ContextValue>),
    /// Computed lazily, once per use site
    Resolver(ResolverFn),
}

impl ContextValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        ContextValue::Scalar(value.into())
    }

    pub fn array<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContextValue::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn() -> ContextValue + Send + Sync + 'static,
    {
        ContextValue::Resolver(Arc::new(f))
    }

    /// Invoke resolvers until a concrete value remains
    pub fn resolved(&self) -> ContextValue {
        let mut value = self.clone();
        loop {
            match value {
                ContextValue::Resolver(f) => value = f(),
                other => return other,
            }
        }
    }

    /// Convert to JSON, invoking resolvers
    pub fn to_json(&self) -> Value {
        match self.resolved() {
            ContextValue::Scalar(s) => Value::String(s),
            ContextValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::String).collect())
            }
            ContextValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ContextValue::Resolver(_) => Value::Null,
        }
    }

    /// Build from JSON; `null` has no context representation
    pub fn from_json(value: &Value) -> Option<ContextValue> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(ContextValue::Scalar(s.clone())),
            Value::Bool(_) | Value::Number(_) => Some(ContextValue::Scalar(value.to_string())),
            Value::Array(items) => Some(ContextValue::Array(
                items.iter().filter_map(scalar_string).collect(),
            )),
            Value::Object(map) => Some(ContextValue::Map(
                map.iter()
                    .filter_map(|(k, v)| ContextValue::from_json(v).map(|cv| (k.clone(), cv)))
                    .collect(),
            )),
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            ContextValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            ContextValue::Map(map) => f.debug_tuple("Map").field(map).finish(),
            ContextValue::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl PartialEq for ContextValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ContextValue::Scalar(a), ContextValue::Scalar(b)) => a == b,
            (ContextValue::Array(a), ContextValue::Array(b)) => a == b,
            (ContextValue::Map(a), ContextValue::Map(b)) => a == b,
            (ContextValue::Resolver(a), ContextValue::Resolver(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Scalar(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Scalar(s)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(items: Vec<String>) -> Self {
        ContextValue::Array(items)
    }
}

impl Serialize for ContextValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContextValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ContextValue::from_json(&value)
            .ok_or_else(|| de::Error::custom("context value cannot be null"))
    }
}

/// The caller being authorized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub identity_id: String,

    /// Named identities; the wildcard `*` is implied and never listed
    #[serde(default)]
    pub identities: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_context")]
    pub context: BTreeMap<String, ContextValue>,
}

fn deserialize_context<'de, D>(deserializer: D) -> Result<BTreeMap<String, ContextValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .iter()
        .filter_map(|(k, v)| ContextValue::from_json(v).map(|cv| (k.clone(), cv)))
        .collect())
}

impl Principal {
    pub fn new(identity_id: impl Into<String>) -> Self {
        Principal {
            identity_id: identity_id.into(),
            identities: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    /// Principal for an identity the store does not know: only `*` applies
    pub fn anonymous(identity_id: impl Into<String>) -> Self {
        Self::new(identity_id)
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        let identity = identity.into();
        if identity != "*" && !self.identities.contains(&identity) {
            self.identities.push(identity);
        }
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Parse a principal record as returned by the store
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut principal: Principal = serde_json::from_str(json)?;
        principal.identities.retain(|id| id != "*");
        Ok(principal)
    }

    /// Identities to consult, in order, ending with the wildcard identity
    pub fn lookup_identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.identities.len() + 1);
        for id in &self.identities {
            if id != "*" && !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids.push("*".to_string());
        ids
    }

    /// Look up a dotted path (`a.b.c`) in the context, descending through maps
    pub fn context_path(&self, path: &str) -> Option<ContextValue> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let mut current = self.context.get(head)?.resolved();
        for segment in segments {
            current = match current {
                ContextValue::Map(map) => map.get(segment)?.resolved(),
                _ => return None,
            };
        }
        Some(current)
    }

    /// Look up a principal field for a bare `${name}` variable
    pub fn field(&self, name: &str) -> Option<ContextValue> {
        match name {
            "identity_id" => Some(ContextValue::Scalar(self.identity_id.clone())),
            "identities" => Some(ContextValue::Array(self.identities.clone())),
            _ => self.context_path(name),
        }
    }
}
