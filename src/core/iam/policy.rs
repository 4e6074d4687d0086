//! Policy statement structure
//!
//! Statements follow the AWS IAM shape with Leo resource names:
//!
//! ```json
//! {
//!   "Effect": "Deny",
//!   "NotAction": ["bus:read"],
//!   "Resource": "lrn:leo:bus:::queue/${context.team}/*",
//!   "Condition": { "StringEquals": { "context:team": "ops" } }
//! }
//! ```

use super::condition::ConditionBlock;
use super::flatten::FlattenedAttributes;
use super::pattern::PatternMatcher;
use super::variables::{VariableSource, VariableSubstitutor};
use crate::core::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// A string or list of strings on the wire, always a list in memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "OneOrMany")]
pub struct StringList(pub Vec<String>);

impl From<OneOrMany> for StringList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => StringList(vec![s]),
            OneOrMany::Many(items) => StringList(items),
        }
    }
}

impl From<StringList> for OneOrMany {
    fn from(list: StringList) -> Self {
        let mut items = list.0;
        if items.len() == 1 {
            OneOrMany::One(items.remove(0))
        } else {
            OneOrMany::Many(items)
        }
    }
}

impl From<&str> for StringList {
    fn from(s: &str) -> Self {
        StringList(vec![s.to_string()])
    }
}

impl From<Vec<String>> for StringList {
    fn from(items: Vec<String>) -> Self {
        StringList(items)
    }
}

impl From<Vec<&str>> for StringList {
    fn from(items: Vec<&str>) -> Self {
        StringList(items.into_iter().map(String::from).collect())
    }
}

impl StringList {
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn matches(&self, value: &str) -> bool {
        PatternMatcher::matches_any(&self.0, value)
    }
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Statement ID (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Effect of this statement
    pub effect: Effect,

    /// Actions this statement applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<StringList>,

    /// Actions this statement does not apply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<StringList>,

    /// LRN patterns this statement applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<StringList>,

    /// LRN patterns this statement does not apply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<StringList>,

    /// Optional conditions for when this statement applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionBlock>,
}

impl PolicyStatement {
    /// Create a new statement
    pub fn new(effect: Effect, action: Vec<&str>, resource: Vec<&str>) -> Self {
        PolicyStatement {
            sid: None,
            effect,
            action: Some(action.into()),
            not_action: None,
            resource: Some(resource.into()),
            not_resource: None,
            condition: None,
        }
    }

    /// Statement with only an effect; every other field is unrestricted
    pub fn unrestricted(effect: Effect) -> Self {
        PolicyStatement {
            sid: None,
            effect,
            action: None,
            not_action: None,
            resource: None,
            not_resource: None,
            condition: None,
        }
    }

    pub fn allow(action: Vec<&str>, resource: Vec<&str>) -> Self {
        Self::new(Effect::Allow, action, resource)
    }

    pub fn deny(action: Vec<&str>, resource: Vec<&str>) -> Self {
        Self::new(Effect::Deny, action, resource)
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_not_action(mut self, not_action: Vec<&str>) -> Self {
        self.not_action = Some(not_action.into());
        self
    }

    pub fn with_not_resource(mut self, not_resource: Vec<&str>) -> Self {
        self.not_resource = Some(not_resource.into());
        self
    }

    pub fn with_condition(mut self, condition: ConditionBlock) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Parse one JSON-encoded statement as stored alongside a policy
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AuthError::MalformedStatement(e.to_string()))
    }

    /// Serialize statement to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Both `Action` and `NotAction`, or both resource forms, are present
    pub fn has_conflicting_fields(&self) -> bool {
        (self.action.is_some() && self.not_action.is_some())
            || (self.resource.is_some() && self.not_resource.is_some())
    }

    /// Check if this statement applies to the given request
    pub fn applies(&self, action: &str, resource: &str, attrs: &FlattenedAttributes) -> bool {
        if self.has_conflicting_fields() {
            warn!(sid = ?self.sid, "Statement sets both a field and its Not form; ignoring it");
            return false;
        }

        let action_matches = match (&self.action, &self.not_action) {
            (Some(actions), _) => actions.matches(action),
            (None, Some(excluded)) => !excluded.matches(action),
            (None, None) => true,
        };
        if !action_matches {
            return false;
        }

        let resource_matches = match (&self.resource, &self.not_resource) {
            (Some(resources), _) => resources.matches(resource),
            (None, Some(excluded)) => !excluded.matches(resource),
            (None, None) => true,
        };
        if !resource_matches {
            return false;
        }

        let condition_passes = self
            .condition
            .as_ref()
            .map_or(true, |block| block.evaluate(attrs));

        debug!(sid = ?self.sid, effect = ?self.effect, condition_passes, "Statement matched action and resource");
        condition_passes
    }

    /// Substitute variables in resources and condition values
    ///
    /// `Action` and `Effect` are never templated.
    pub fn resolve(&self, source: &dyn VariableSource) -> Result<PolicyStatement> {
        let resolve_list = |list: &Option<StringList>| -> Result<Option<StringList>> {
            list.as_ref()
                .map(|l| VariableSubstitutor::resolve_all(&l.0, source).map(StringList))
                .transpose()
        };

        Ok(PolicyStatement {
            sid: self.sid.clone(),
            effect: self.effect,
            action: self.action.clone(),
            not_action: self.not_action.clone(),
            resource: resolve_list(&self.resource)?,
            not_resource: resolve_list(&self.not_resource)?,
            condition: self
                .condition
                .as_ref()
                .map(|block| block.resolve(source))
                .transpose()?,
        })
    }
}
