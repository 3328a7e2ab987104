//! CLI error types

use keycloak_auth::{AuthError, ConfigError, ErrorKind};
use thiserror::Error;

/// Errors surfaced to the terminal
#[derive(Error, Debug)]
pub enum CliError {
    /// Library failure
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Configuration could not be loaded
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Token failed validation
    #[error("token rejected ({kind}): {reason}")]
    TokenRejected {
        /// Classification of the failure
        kind: ErrorKind,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// JSON output could not be rendered
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Hints printed under the error message
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Config(_) => vec![
                "Pass --config <FILE> or set KEYCLOAK_BASE_URI and KEYCLOAK_REALM",
                "Use --help to see the expected flags",
            ],
            Self::Auth(e) => match e.kind() {
                ErrorKind::KeyRetrieval => vec![
                    "Check that the base URI and realm are correct",
                    "Verify the certs endpoint is reachable from this host",
                ],
                ErrorKind::Provider if e.status() == Some(401) => {
                    vec!["Check KEYCLOAK_USERNAME and KEYCLOAK_PASSWORD"]
                }
                _ => vec![],
            },
            _ => vec![],
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
