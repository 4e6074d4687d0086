//! # Leo Auth - Identity-Based Authorization for Leo Resources
//!
//! `leo-auth` decides whether a principal may perform an action on a
//! resource named by an LRN (Leo Resource Name, e.g. `lrn:leo:bus:::queue/orders`).
//! Policies follow the AWS IAM statement shape:
//!
//! - **Deny precedence**: any matching Deny wins over every Allow
//! - **Default deny**: no matching Allow is a denial too
//! - **Wildcard identity**: policies on `*` apply to every principal
//! - **Policy variables**: `${context.account}` resolved from the principal
//! - **Conditions**: string, null and CIDR operators with `ForAllValues`/`ForAnyValue`
//! - **Bootstrap mode**: in-code policies that replace the policy store
//!
//! ## Quick Start
//!
//! ```rust
//! use leo_auth::{AuthConfig, Authorizer, MemoryStore, Principal, RequestDescriptor, Result};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let store = MemoryStore::new();
//! store.insert_principal(Principal::new("user-1").with_identity("role/reader"));
//! store.attach_values(
//!     "role/reader",
//!     "queues",
//!     &[json!({"Effect": "Allow", "Action": "bus:read", "Resource": "lrn:leo:bus:::queue/*"})],
//! );
//!
//! let auth = Authorizer::new(store, AuthConfig::default())?;
//!
//! let request = RequestDescriptor::new("bus:read", "lrn:leo:bus:::queue/{queue}")
//!     .with_param("queue", "orders");
//! let principal = auth.authorize("user-1", &request).await?;
//! assert_eq!(principal.identity_id, "user-1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Evaluating Without a Store
//!
//! ```rust
//! use leo_auth::iam::{DecisionEngine, PolicyStatement};
//! use leo_auth::{Principal, RequestDescriptor};
//!
//! let statements = vec![
//!     PolicyStatement::allow(vec!["read"], vec!["*"]),
//!     PolicyStatement::deny(vec!["*"], vec!["lrn:stuff:*"]),
//! ];
//! let principal = Principal::new("user-1").with_identity("role/test");
//!
//! let engine = DecisionEngine::new();
//! let ok = RequestDescriptor::new("read", "lrn:leo:myapp:::x");
//! let denied = RequestDescriptor::new("read", "lrn:stuff:other:::ok");
//!
//! assert!(engine.decide(&principal, &ok, &statements).is_ok());
//! assert!(engine.decide(&principal, &denied, &statements).is_err());
//! ```

pub mod core;

pub use crate::core::iam;

pub use crate::core::{
    authorizer::Authorizer,
    config::AuthConfig,
    error::{AuthError, Result},
    iam::{BootstrapConfig, Decision, DecisionEngine, Effect, PolicyStatement},
    principal::{ContextValue, Principal},
    request::RequestDescriptor,
    store::{IdentityPolicies, MemoryStore, PolicyStore},
};

/// Register bootstrap policies for the whole process
///
/// Replaces the policy store for every [`Authorizer`] built on the global
/// registry. Call during startup, before decision traffic begins.
pub fn register_bootstrap(config: &BootstrapConfig) -> Result<()> {
    iam::registry::register(config)
}
