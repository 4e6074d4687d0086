//! Request descriptors
//!
//! A request names an action and an LRN template such as
//! `lrn:leo:bus:::queue/{queue}`. Placeholders are filled from the
//! substitution values registered for the LRN's system (`bus` here), and
//! those same values are exposed to conditions as `<system>:<name>`.

use crate::core::error::{AuthError, Result};
use crate::core::iam::{AttributeFlattener, FlattenedAttributes};
use crate::core::principal::Principal;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"))
}

/// What is being asked for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    pub action: String,
    /// LRN template with optional `{name}` placeholders
    pub lrn: String,
    /// Principal context fields exposed to conditions as `context:<field>`
    pub context_fields: Option<Vec<String>>,
    /// Placeholder values keyed by system, then placeholder name
    pub substitutions: BTreeMap<String, BTreeMap<String, String>>,
    /// Extra request attributes, e.g. `{"aws": {"sourceip": "10.1.2.3"}}`
    pub attributes: Map<String, Value>,
}

impl RequestDescriptor {
    pub fn new(action: impl Into<String>, lrn: impl Into<String>) -> Self {
        RequestDescriptor {
            action: action.into(),
            lrn: lrn.into(),
            ..Default::default()
        }
    }

    /// Add a placeholder value for the template's own system
    pub fn with_param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let system = self.system().unwrap_or_default().to_string();
        self.with_substitution(system, name, value)
    }

    pub fn with_substitution(
        mut self,
        system: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.substitutions
            .entry(system.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    pub fn with_context_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Third colon segment of the LRN template (`lrn:leo:<system>:...`)
    pub fn system(&self) -> Option<&str> {
        self.lrn.split(':').nth(2).filter(|s| !s.is_empty())
    }

    /// LRN with every `{name}` placeholder filled in
    pub fn resolved_lrn(&self) -> Result<String> {
        let pattern = placeholder_pattern();
        if !pattern.is_match(&self.lrn) {
            return Ok(self.lrn.clone());
        }

        let system = self.system().ok_or_else(|| {
            AuthError::InvalidRequest(format!("LRN `{}` has no system segment", self.lrn))
        })?;
        let params = self.substitutions.get(system);

        let mut out = String::with_capacity(self.lrn.len());
        let mut last = 0;
        for caps in pattern.captures_iter(&self.lrn) {
            let Some(token) = caps.get(0) else { continue };
            let name = &caps[1];
            let value = params.and_then(|p| p.get(name)).ok_or_else(|| {
                AuthError::InvalidRequest(format!("no value for LRN placeholder `{}`", name))
            })?;
            out.push_str(&self.lrn[last..token.start()]);
            out.push_str(value);
            last = token.end();
        }
        out.push_str(&self.lrn[last..]);
        Ok(out)
    }

    /// Build the flattened evaluation environment for `principal`
    pub fn attributes(&self, principal: &Principal) -> Result<FlattenedAttributes> {
        let mut root = self.attributes.clone();

        if let Some(system) = self.system() {
            if let Some(params) = self.substitutions.get(system) {
                let params: Map<String, Value> = params
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                root.insert(system.to_string(), Value::Object(params));
            }
        }

        if let Some(fields) = &self.context_fields {
            let context: Map<String, Value> = fields
                .iter()
                .filter_map(|field| {
                    principal
                        .context
                        .get(field)
                        .map(|value| (field.clone(), value.to_json()))
                })
                .collect();
            root.insert("context".to_string(), Value::Object(context));
        }

        root.insert("action".to_string(), Value::String(self.action.clone()));
        root.insert("lrn".to_string(), Value::String(self.resolved_lrn()?));

        Ok(AttributeFlattener::flatten(&Value::Object(root)))
    }
}
