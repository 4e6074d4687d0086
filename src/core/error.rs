use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Explicit deny matched, or nothing allowed the request.
    #[error("Access Denied")]
    AccessDenied,

    #[error("Missing policy variable: ${{{0}}}")]
    MissingVariable(String),

    #[error("Policy store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed policy statement: {0}")]
    MalformedStatement(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// True for the authorization-boundary denial, false for operational errors
    pub fn is_denial(&self) -> bool {
        matches!(self, AuthError::AccessDenied)
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_carries_no_detail() {
        assert_eq!(AuthError::AccessDenied.to_string(), "Access Denied");
        assert!(AuthError::AccessDenied.is_denial());
    }

    #[test]
    fn test_operational_errors_are_not_denials() {
        let err = AuthError::MissingVariable("context.account".to_string());
        assert_eq!(err.to_string(), "Missing policy variable: ${context.account}");
        assert!(!err.is_denial());
        assert!(!AuthError::StoreUnavailable("timeout".to_string()).is_denial());
    }
}
