//! Identity-based access control for Leo resources
//!
//! Provides policy evaluation with:
//! - AWS IAM-style statements over Leo resource names (LRNs)
//! - Explicit deny precedence, implicit deny by default
//! - `*` wildcards for actions and resources
//! - `${...}` policy variables resolved from the principal
//! - Quantified string, null and CIDR conditions
//! - In-process bootstrap policies that replace the policy store

mod cache;
mod cidr;
mod condition;
mod engine;
mod flatten;
mod pattern;
mod policy;
pub mod registry;
mod variables;

pub use cache::StatementCache;
pub use cidr::CidrMatcher;
pub use condition::{Condition, ConditionBlock, ConditionOperator, OperatorKey, Quantifier};
pub use engine::{Decision, DecisionEngine};
pub use flatten::{AttributeFlattener, AttributeValue, FlattenedAttributes};
pub use pattern::PatternMatcher;
pub use policy::{Effect, PolicyStatement, StringList};
pub use registry::{BootstrapConfig, BootstrapPolicies, BootstrapRegistry};
pub use variables::{Resolved, VariableSource, VariableSubstitutor};
