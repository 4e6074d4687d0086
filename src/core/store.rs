//! Principal and policy storage
//!
//! The engine does not own persistence. A [`PolicyStore`] hands back
//! principals by id and the raw statement JSON attached to a set of
//! identities, fetched in one batch per decision.

use crate::core::error::{AuthError, Result};
use crate::core::principal::Principal;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Identity, then policy name, then raw statement JSON
pub type IdentityPolicies = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Source of principals and attached policies
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Look up a principal; `None` when unknown
    async fn fetch_principal(&self, id: &str) -> Result<Option<Principal>>;

    /// Fetch every policy attached to any of `identities`
    ///
    /// Identities with nothing attached are simply absent from the result.
    async fn fetch_policies(&self, identities: &[String]) -> Result<IdentityPolicies>;
}

/// In-memory store for tests, tooling and small deployments
#[derive(Default)]
pub struct MemoryStore {
    principals: RwLock<HashMap<String, Principal>>,
    policies: RwLock<IdentityPolicies>,
    failure: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_principal(&self, principal: Principal) {
        self.principals
            .write()
            .insert(principal.identity_id.clone(), principal);
    }

    /// Attach a named policy to an identity, replacing one with the same name
    pub fn attach_policy(
        &self,
        identity: impl Into<String>,
        name: impl Into<String>,
        statements: Vec<String>,
    ) {
        self.policies
            .write()
            .entry(identity.into())
            .or_default()
            .insert(name.into(), statements);
    }

    /// Attach statements given as JSON values
    pub fn attach_values(
        &self,
        identity: impl Into<String>,
        name: impl Into<String>,
        statements: &[Value],
    ) {
        let raw = statements.iter().map(Value::to_string).collect();
        self.attach_policy(identity, name, raw);
    }

    pub fn detach_policy(&self, identity: &str, name: &str) -> bool {
        self.policies
            .write()
            .get_mut(identity)
            .map(|attached| attached.remove(name).is_some())
            .unwrap_or(false)
    }

    /// Make every later call fail as if the backend were down
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write() = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    fn check_available(&self) -> Result<()> {
        match self.failure.read().as_ref() {
            Some(reason) => Err(AuthError::StoreUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn fetch_principal(&self, id: &str) -> Result<Option<Principal>> {
        self.check_available()?;
        Ok(self.principals.read().get(id).cloned())
    }

    async fn fetch_policies(&self, identities: &[String]) -> Result<IdentityPolicies> {
        self.check_available()?;
        let policies = self.policies.read();
        Ok(identities
            .iter()
            .filter_map(|id| policies.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}
