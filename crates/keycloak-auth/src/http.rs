//! Shared reqwest client construction and provider error mapping

use serde::Deserialize;
use tracing::warn;

use crate::config::KeycloakConfig;
use crate::error::{AuthError, Result};

/// Build the HTTP client used for every call to the provider
///
/// - Redirects disabled (a redirected token POST would leak credentials)
/// - Request timeout from configuration
/// - Strict TLS unless `danger_accept_invalid_certs` is set
pub(crate) fn build_client(config: &KeycloakConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.request_timeout())
        .user_agent(concat!("keycloak-auth/", env!("CARGO_PKG_VERSION")));

    if config.danger_accept_invalid_certs {
        warn!(
            base_uri = %config.base_uri,
            "TLS certificate verification toward the identity provider is DISABLED"
        );
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))
}

/// Error bodies returned by the token endpoint (RFC 6749) and the admin API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Turn a non-success response into [`AuthError::Provider`]
pub(crate) async fn provider_error(response: reqwest::Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AuthError::provider(Some(status), describe_error_body(&body))
}

fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .error_description
            .or(parsed.error_message)
            .or(parsed.error)
            .unwrap_or_else(|| body.to_string()),
        Err(_) if body.is_empty() => "empty response body".to_string(),
        Err(_) => body.to_string(),
    }
}
