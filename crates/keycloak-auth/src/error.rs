//! Error taxonomy for key retrieval, token validation and provider calls
//!
//! Every fallible operation in this crate returns [`AuthError`]. Callers that
//! only need a coarse classification should match on [`AuthError::kind`].

use std::fmt;
use thiserror::Error;

/// Boxed cause carried by [`AuthError::KeyRetrieval`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the Keycloak client
#[derive(Debug, Error)]
pub enum AuthError {
    /// The signing certificate could not be obtained or turned into key material
    #[error("key retrieval failed: {message}")]
    KeyRetrieval {
        /// What went wrong
        message: String,
        /// Underlying transport or parse failure, when there is one
        #[source]
        source: Option<BoxError>,
    },

    /// The token does not have three segments or does not decode to JSON
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature, algorithm, expiry or claim checks failed
    #[error("token verification failed: {0}")]
    TokenVerification(String),

    /// The identity provider answered with a non-success status or an unusable body
    #[error("identity provider error{}: {message}", status.map(|s| format!(" [{s}]")).unwrap_or_default())]
    Provider {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Provider supplied description or response body
        message: String,
    },

    /// HTTP transport failure on a grant or admin call
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid client configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Key retrieval failure without an underlying cause
    pub fn key_retrieval(message: impl Into<String>) -> Self {
        Self::KeyRetrieval {
            message: message.into(),
            source: None,
        }
    }

    /// Key retrieval failure wrapping its cause
    pub fn key_retrieval_with(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::KeyRetrieval {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Malformed token
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedToken(message.into())
    }

    /// Token verification failure
    pub fn verification(message: impl Into<String>) -> Self {
        Self::TokenVerification(message.into())
    }

    /// Provider failure
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Coarse classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyRetrieval { .. } => ErrorKind::KeyRetrieval,
            Self::MalformedToken(_) => ErrorKind::MalformedToken,
            Self::TokenVerification(_) => ErrorKind::TokenVerification,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status reported by the provider, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Signing certificate unavailable
    KeyRetrieval,
    /// Token is structurally invalid
    MalformedToken,
    /// Token failed verification
    TokenVerification,
    /// Provider rejected a request
    Provider,
    /// Network failure
    Transport,
    /// Configuration problem
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyRetrieval => write!(f, "KeyRetrievalError"),
            Self::MalformedToken => write!(f, "MalformedTokenError"),
            Self::TokenVerification => write!(f, "TokenVerificationError"),
            Self::Provider => write!(f, "ProviderError"),
            Self::Transport => write!(f, "TransportError"),
            Self::Config => write!(f, "ConfigError"),
        }
    }
}

/// Result type for Keycloak operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            AuthError::key_retrieval("empty key list").kind(),
            ErrorKind::KeyRetrieval
        );
        assert_eq!(AuthError::malformed("x").kind(), ErrorKind::MalformedToken);
        assert_eq!(
            AuthError::verification("expired").kind(),
            ErrorKind::TokenVerification
        );
        assert_eq!(AuthError::provider(Some(401), "x").kind(), ErrorKind::Provider);
    }

    #[test]
    fn test_key_retrieval_keeps_source() {
        let cause = std::io::Error::other("connection reset");
        let err = AuthError::key_retrieval_with("certs request failed", cause);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("certs request failed"));
    }

    #[test]
    fn test_provider_display_includes_status() {
        let err = AuthError::provider(Some(400), "invalid_grant");
        assert_eq!(
            err.to_string(),
            "identity provider error [400]: invalid_grant"
        );
        assert_eq!(err.status(), Some(400));

        let err = AuthError::provider(None, "missing Location header");
        assert_eq!(
            err.to_string(),
            "identity provider error: missing Location header"
        );
    }

    #[test]
    fn test_kind_display_names() {
        assert_eq!(ErrorKind::KeyRetrieval.to_string(), "KeyRetrievalError");
        assert_eq!(
            ErrorKind::TokenVerification.to_string(),
            "TokenVerificationError"
        );
    }
}
