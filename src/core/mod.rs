pub mod authorizer;
pub mod config;
pub mod error;
pub mod iam;
pub mod principal;
pub mod request;
pub mod store;

pub use authorizer::Authorizer;
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use principal::{ContextValue, Principal};
pub use request::RequestDescriptor;
pub use store::{IdentityPolicies, MemoryStore, PolicyStore};
