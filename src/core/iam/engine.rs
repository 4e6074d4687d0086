//! Policy evaluation engine with deny precedence
//!
//! Evaluates every statement collected for a principal's identities (plus
//! the wildcard identity) against one request:
//! - Explicit deny takes precedence over allow and stops evaluation
//! - Absence of an allow is itself a denial
//! - Variables are resolved against the principal before matching

use super::flatten::FlattenedAttributes;
use super::policy::{Effect, PolicyStatement};
use crate::core::error::{AuthError, Result};
use crate::core::principal::Principal;
use crate::core::request::RequestDescriptor;
use std::borrow::Borrow;
use tracing::{debug, info};

/// Outcome of evaluating a statement set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// An Allow statement matched and no Deny did
    Allow,
    /// A Deny statement matched
    ExplicitDeny,
    /// Nothing matched
    ImplicitDeny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

fn statement<S: Borrow<PolicyStatement>>(s: &S) -> &PolicyStatement {
    s.borrow()
}

/// Policy evaluation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        DecisionEngine
    }

    /// Two-phase evaluation over already-resolved statements
    ///
    /// # Examples
    ///
    /// ```
    /// use leo_auth::iam::{Decision, DecisionEngine, FlattenedAttributes, PolicyStatement};
    ///
    /// let statements = vec![
    ///     PolicyStatement::allow(vec!["read"], vec!["*"]),
    ///     PolicyStatement::deny(vec!["*"], vec!["lrn:stuff:*"]),
    /// ];
    /// let engine = DecisionEngine::new();
    /// let attrs = FlattenedAttributes::new();
    ///
    /// assert_eq!(engine.evaluate(&statements, "read", "lrn:leo:ok", &attrs), Decision::Allow);
    /// assert_eq!(
    ///     engine.evaluate(&statements, "read", "lrn:stuff:other:::ok", &attrs),
    ///     Decision::ExplicitDeny
    /// );
    /// ```
    pub fn evaluate<S: Borrow<PolicyStatement>>(
        &self,
        statements: &[S],
        action: &str,
        resource: &str,
        attrs: &FlattenedAttributes,
    ) -> Decision {
        // Deny phase
        let denied = statements
            .iter()
            .map(statement)
            .filter(|s| s.effect == Effect::Deny)
            .any(|s| s.applies(action, resource, attrs));
        if denied {
            return Decision::ExplicitDeny;
        }

        // Allow phase
        let allowed = statements
            .iter()
            .map(statement)
            .filter(|s| s.effect == Effect::Allow)
            .any(|s| s.applies(action, resource, attrs));
        if allowed {
            Decision::Allow
        } else {
            Decision::ImplicitDeny
        }
    }

    /// Resolve variables in every statement, then evaluate
    ///
    /// An unresolvable variable fails the whole evaluation.
    pub fn evaluate_for<S: Borrow<PolicyStatement>>(
        &self,
        principal: &Principal,
        request: &RequestDescriptor,
        statements: &[S],
    ) -> Result<Decision> {
        let attrs = request.attributes(principal)?;
        let lrn = request.resolved_lrn()?;

        let resolved = statements
            .iter()
            .map(|s| statement(s).resolve(principal))
            .collect::<Result<Vec<_>>>()?;

        let decision = self.evaluate(&resolved, &request.action, &lrn, &attrs);
        debug!(
            identity = %principal.identity_id,
            action = %request.action,
            lrn = %lrn,
            statements = resolved.len(),
            ?decision,
            "Evaluated request"
        );
        Ok(decision)
    }

    /// Authorize a request, returning the principal on success
    ///
    /// Both explicit and implicit denials surface as [`AuthError::AccessDenied`].
    pub fn decide<S: Borrow<PolicyStatement>>(
        &self,
        principal: &Principal,
        request: &RequestDescriptor,
        statements: &[S],
    ) -> Result<Principal> {
        match self.evaluate_for(principal, request, statements)? {
            Decision::Allow => Ok(principal.clone()),
            Decision::ExplicitDeny | Decision::ImplicitDeny => {
                info!(identity = %principal.identity_id, action = %request.action, "Access denied");
                Err(AuthError::AccessDenied)
            }
        }
    }
}
