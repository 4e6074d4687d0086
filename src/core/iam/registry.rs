//! In-process bootstrap policies
//!
//! A bootstrap config replaces the persistent policy store for the whole
//! process: once registered, policies are read from here and the store is
//! never asked for them. Short action and resource names are completed at
//! registration time:
//!
//! - `read` becomes `<actions>:read`; `other:write` is kept
//! - `data/x` becomes `<resource padded to 6 LRN segments>data/x`; anything
//!   starting with `lrn` is kept
//!
//! Registration is single-writer-then-many-readers: register during
//! startup, before concurrent decision traffic begins.

use super::policy::{PolicyStatement, StringList};
use crate::core::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Number of colon-separated segments in an LRN
pub const LRN_SEGMENTS: usize = 6;

/// In-code policy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct BootstrapConfig {
    /// Prefix for actions without a `:`
    #[validate(length(min = 1, message = "actions prefix cannot be empty"))]
    pub actions: String,

    /// LRN prefix for resources not starting with `lrn`
    #[validate(length(min = 1, message = "resource prefix cannot be empty"))]
    pub resource: String,

    /// Identity name to the names of its attached policies
    #[serde(default)]
    pub identities: BTreeMap<String, Vec<String>>,

    /// Policy name to its statements
    #[serde(default)]
    pub policies: BTreeMap<String, Vec<PolicyStatement>>,
}

impl BootstrapConfig {
    pub fn new(actions: impl Into<String>, resource: impl Into<String>) -> Self {
        BootstrapConfig {
            actions: actions.into(),
            resource: resource.into(),
            ..Default::default()
        }
    }

    /// Attach a named policy to an identity
    pub fn with_policy(
        mut self,
        identity: impl Into<String>,
        name: impl Into<String>,
        statements: Vec<PolicyStatement>,
    ) -> Self {
        let name = name.into();
        let attached = self.identities.entry(identity.into()).or_default();
        if !attached.contains(&name) {
            attached.push(name.clone());
        }
        self.policies.insert(name, statements);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: BootstrapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: BootstrapConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` file, or JSON for any other extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }

    /// `resource` right-padded with empty segments to a full LRN prefix
    pub fn resource_prefix(&self) -> String {
        let mut parts: Vec<&str> = self.resource.split(':').collect();
        while parts.len() < LRN_SEGMENTS {
            parts.push("");
        }
        parts.join(":")
    }

    fn complete_action(&self, action: &str) -> String {
        if action.contains(':') {
            action.to_string()
        } else {
            format!("{}:{}", self.actions, action)
        }
    }

    fn complete_resource(&self, prefix: &str, resource: &str) -> String {
        if resource.starts_with("lrn") {
            resource.to_string()
        } else {
            format!("{}{}", prefix, resource)
        }
    }

    /// Statement with action and resource names completed
    pub fn complete(&self, statement: &PolicyStatement) -> PolicyStatement {
        let prefix = self.resource_prefix();
        let actions = |list: &Option<StringList>| {
            list.as_ref()
                .map(|l| StringList(l.iter().map(|a| self.complete_action(a)).collect()))
        };
        let resources = |list: &Option<StringList>| {
            list.as_ref().map(|l| {
                StringList(l.iter().map(|r| self.complete_resource(&prefix, r)).collect())
            })
        };

        PolicyStatement {
            action: actions(&statement.action),
            not_action: actions(&statement.not_action),
            resource: resources(&statement.resource),
            not_resource: resources(&statement.not_resource),
            ..statement.clone()
        }
    }
}

/// Registered, prefix-completed bootstrap policies
#[derive(Debug, Clone, Default)]
pub struct BootstrapPolicies {
    identities: BTreeMap<String, Vec<String>>,
    policies: BTreeMap<String, Vec<Arc<PolicyStatement>>>,
}

impl BootstrapPolicies {
    /// Validate and complete a config
    pub fn from_config(config: &BootstrapConfig) -> Result<Self> {
        config.validate()?;

        let policies = config
            .policies
            .iter()
            .map(|(name, statements)| {
                let completed = statements
                    .iter()
                    .map(|s| Arc::new(config.complete(s)))
                    .collect();
                (name.clone(), completed)
            })
            .collect();

        Ok(BootstrapPolicies {
            identities: config.identities.clone(),
            policies,
        })
    }

    /// Statements attached to `identities`, in identity then attachment order
    pub fn statements_for(&self, identities: &[String]) -> Vec<Arc<PolicyStatement>> {
        let mut statements = Vec::new();
        for identity in identities {
            let Some(names) = self.identities.get(identity) else {
                continue;
            };
            for name in names {
                match self.policies.get(name) {
                    Some(policy) => statements.extend(policy.iter().cloned()),
                    None => warn!(identity = %identity, policy = %name, "Bootstrap identity references unknown policy"),
                }
            }
        }
        statements
    }

    pub fn policy(&self, name: &str) -> Option<&[Arc<PolicyStatement>]> {
        self.policies.get(name).map(Vec::as_slice)
    }
}

/// Process-wide bootstrap cell
pub struct BootstrapRegistry {
    cell: RwLock<Option<Arc<BootstrapPolicies>>>,
}

impl BootstrapRegistry {
    pub const fn new() -> Self {
        BootstrapRegistry {
            cell: parking_lot::const_rwlock(None),
        }
    }

    /// Replace any previous registration
    pub fn set(&self, config: &BootstrapConfig) -> Result<Arc<BootstrapPolicies>> {
        let policies = Arc::new(BootstrapPolicies::from_config(config)?);
        *self.cell.write() = Some(Arc::clone(&policies));
        info!(
            identities = config.identities.len(),
            policies = config.policies.len(),
            "Registered bootstrap policies"
        );
        Ok(policies)
    }

    pub fn get(&self) -> Option<Arc<BootstrapPolicies>> {
        self.cell.read().clone()
    }

    pub fn clear(&self) {
        *self.cell.write() = None;
    }

    pub fn is_active(&self) -> bool {
        self.cell.read().is_some()
    }
}

impl Default for BootstrapRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: BootstrapRegistry = BootstrapRegistry::new();

/// The process-wide registry
pub fn global() -> &'static BootstrapRegistry {
    &GLOBAL
}

/// Register bootstrap policies for the process, replacing the policy store
pub fn register(config: &BootstrapConfig) -> Result<()> {
    GLOBAL.set(config).map(|_| ())
}

pub fn current() -> Option<Arc<BootstrapPolicies>> {
    GLOBAL.get()
}

pub fn clear() {
    GLOBAL.clear()
}

pub fn is_active() -> bool {
    GLOBAL.is_active()
}
