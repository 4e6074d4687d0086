//! Request authorization against a policy store
//!
//! The [`Authorizer`] glues a [`PolicyStore`] to the [`DecisionEngine`]:
//!
//! 1. Look up the principal (unknown ids act with the wildcard identity only)
//! 2. Collect statements for the principal's identities plus `*`, from the
//!    bootstrap registry when one is registered, else in one store batch
//! 3. Evaluate with deny precedence
//!
//! Store calls are bounded by the configured timeout. Malformed stored
//! statements are skipped so one bad policy cannot lock everyone out.

use crate::core::config::AuthConfig;
use crate::core::error::{AuthError, Result};
use crate::core::iam::registry::{self, BootstrapRegistry};
use crate::core::iam::{DecisionEngine, PolicyStatement, StatementCache};
use crate::core::principal::Principal;
use crate::core::request::RequestDescriptor;
use crate::core::store::PolicyStore;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

pub struct Authorizer<S> {
    store: S,
    config: AuthConfig,
    engine: DecisionEngine,
    statements: StatementCache,
    bootstrap: &'static BootstrapRegistry,
}

impl<S: PolicyStore> Authorizer<S> {
    /// Build an authorizer on the process-wide bootstrap registry
    ///
    /// A bootstrap section in `config` is registered immediately.
    pub fn new(store: S, config: AuthConfig) -> Result<Self> {
        Self::with_registry(store, config, registry::global())
    }

    pub fn with_registry(
        store: S,
        config: AuthConfig,
        bootstrap: &'static BootstrapRegistry,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(policies) = &config.bootstrap {
            bootstrap.set(policies)?;
        }

        Ok(Authorizer {
            store,
            statements: StatementCache::new(config.statement_cache_capacity),
            config,
            engine: DecisionEngine::new(),
            bootstrap,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn statement_cache(&self) -> &StatementCache {
        &self.statements
    }

    /// Authorize a request for the principal stored under `principal_id`
    pub async fn authorize(
        &self,
        principal_id: &str,
        request: &RequestDescriptor,
    ) -> Result<Principal> {
        let principal = self
            .bounded(self.store.fetch_principal(principal_id))
            .await?
            .unwrap_or_else(|| {
                debug!(principal = %principal_id, "Unknown principal, using wildcard identity");
                Principal::anonymous(principal_id)
            });
        self.authorize_principal(&principal, request).await
    }

    /// Authorize a request for an already-resolved principal
    pub async fn authorize_principal(
        &self,
        principal: &Principal,
        request: &RequestDescriptor,
    ) -> Result<Principal> {
        let statements = self.statements_for(principal).await?;
        self.engine.decide(principal, request, &statements)
    }

    /// Every statement that applies to `principal`, unresolved
    pub async fn statements_for(&self, principal: &Principal) -> Result<Vec<Arc<PolicyStatement>>> {
        let identities = principal.lookup_identities();

        if let Some(bootstrap) = self.bootstrap.get() {
            return Ok(bootstrap.statements_for(&identities));
        }

        let fetched = self.bounded(self.store.fetch_policies(&identities)).await?;

        let mut statements = Vec::new();
        for identity in &identities {
            let Some(policies) = fetched.get(identity) else {
                continue;
            };
            for (name, raw_statements) in policies {
                for raw in raw_statements {
                    match self.statements.get_or_parse(raw) {
                        Ok(statement) => statements.push(statement),
                        Err(err) => warn!(
                            identity = %identity,
                            policy = %name,
                            error = %err,
                            "Skipping malformed policy statement"
                        ),
                    }
                }
            }
        }
        Ok(statements)
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.store_timeout();
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            AuthError::StoreUnavailable(format!("no response within {}ms", timeout.as_millis()))
        })?
    }
}
