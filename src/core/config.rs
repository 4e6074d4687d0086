//! Authorizer configuration
//!
//! ```toml
//! store_timeout_ms = 2000
//! statement_cache_capacity = 500
//!
//! [bootstrap]
//! actions = "myapp"
//! resource = "lrn:leo:myapp"
//! ```

use crate::core::error::Result;
use crate::core::iam::BootstrapConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_statement_cache_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// Upper bound on each policy store call
    #[serde(default = "default_store_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub store_timeout_ms: u64,

    /// Parsed statements kept in memory
    #[serde(default = "default_statement_cache_capacity")]
    #[validate(range(min = 1))]
    pub statement_cache_capacity: usize,

    /// Registered for the process when the authorizer is built
    #[serde(default)]
    #[validate(nested)]
    pub bootstrap: Option<BootstrapConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            store_timeout_ms: default_store_timeout_ms(),
            statement_cache_capacity: default_statement_cache_capacity(),
            bootstrap: None,
        }
    }
}

impl AuthConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: AuthConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AuthError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_toml_str("").unwrap();
        assert_eq!(config, AuthConfig::default());
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert!(config.bootstrap.is_none());
    }

    #[test]
    fn test_parse_with_bootstrap() {
        let config = AuthConfig::from_toml_str(
            r#"
            store_timeout_ms = 250

            [bootstrap]
            actions = "myapp"
            resource = "lrn:leo:myapp"

            [bootstrap.identities]
            "role/admin" = ["admin"]

            [[bootstrap.policies.admin]]
            Effect = "Allow"
            Action = "*"
            Resource = "*"
            "#,
        )
        .unwrap();

        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.actions, "myapp");
        assert_eq!(bootstrap.policies["admin"].len(), 1);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(matches!(
            AuthConfig::from_toml_str("store_timeout_ms = 0"),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            AuthConfig::from_toml_str("statement_cache_capacity = 0"),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_validation_reaches_bootstrap() {
        let result = AuthConfig::from_toml_str(
            r#"
            [bootstrap]
            actions = ""
            resource = "lrn:leo:myapp"
            "#,
        );
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            AuthConfig::from_toml_str("store_timeout_ms = \"soon\""),
            Err(AuthError::Toml(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "statement_cache_capacity = 42").unwrap();

        let config = AuthConfig::from_file(file.path()).unwrap();
        assert_eq!(config.statement_cache_capacity, 42);

        assert!(matches!(
            AuthConfig::from_file("/nonexistent/auth.toml"),
            Err(AuthError::Io(_))
        ));
    }
}
