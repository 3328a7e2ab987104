//! Token endpoint grants
//!
//! Every grant is a form-encoded POST to the realm token endpoint:
//!
//! - password grant for `admin-cli` ([`TokenClient::login`]) or a
//!   confidential client ([`TokenClient::access_token`])
//! - authorization code exchange ([`TokenClient::exchange_code`])
//! - refresh token grant ([`TokenClient::refresh`])

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ADMIN_CLI_CLIENT_ID, KeycloakConfig};
use crate::error::{AuthError, Result};
use crate::http;

/// Successful token endpoint response (RFC 6749 Section 5.1)
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,

    /// Refresh token, absent for client credential style grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type, normally `Bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Refresh token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<u64>,

    /// OpenID Connect ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Keycloak session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,

    /// Everything else
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

// Tokens never reach logs
impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Client for the realm token endpoint
#[derive(Clone)]
pub struct TokenClient {
    endpoint: String,
    realm: String,
    username: Option<String>,
    password: Option<SecretString>,
    exchange_scope: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("exchange_scope", &self.exchange_scope)
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl TokenClient {
    /// Create a token client with its own HTTP client
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &KeycloakConfig) -> Result<Self> {
        Ok(Self::with_client(config, http::build_client(config)?))
    }

    /// Create a token client sharing an existing HTTP client
    pub fn with_client(config: &KeycloakConfig, http_client: reqwest::Client) -> Self {
        Self {
            endpoint: config.token_endpoint(),
            realm: config.realm.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            exchange_scope: config.exchange_scope.clone(),
            http_client,
        }
    }

    /// Token endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Log in as the configured user through `admin-cli`
    ///
    /// Returns the access token to use as the bearer for [`crate::AdminClient`].
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] when no credentials are configured,
    /// [`AuthError::Provider`] when Keycloak rejects them.
    pub async fn login(&self) -> Result<String> {
        info!(realm = %self.realm, "Logging in");
        let tokens = self.password_grant(ADMIN_CLI_CLIENT_ID, None).await?;
        info!(realm = %self.realm, "Login successful");
        Ok(tokens.access_token)
    }

    /// Password grant for a confidential client, returning the access token
    ///
    /// # Errors
    ///
    /// See [`TokenClient::password_grant`].
    pub async fn access_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        let tokens = self.password_grant(client_id, Some(client_secret)).await?;
        Ok(tokens.access_token)
    }

    /// Resource owner password grant with the configured credentials
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] when no credentials are configured,
    /// [`AuthError::Provider`] when Keycloak rejects the grant.
    pub async fn password_grant(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<TokenResponse> {
        let (username, password) = match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                (username.as_str(), password.expose_secret().as_str())
            }
            _ => {
                return Err(AuthError::Config(
                    "username and password are required for the password grant".to_string(),
                ));
            }
        };

        let mut form = vec![
            ("grant_type", "password"),
            ("client_id", client_id),
            ("username", username),
            ("password", password),
        ];
        if let Some(secret) = client_secret {
            form.push(("client_secret", secret));
        }

        self.request(&form, None).await
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when Keycloak rejects the code.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        info!(client_id, "Beginning token exchange");
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", self.exchange_scope.as_str()),
        ];
        self.request(&form, None).await
    }

    /// Refresh tokens for `client_id`
    ///
    /// `admin_token` is sent as the bearer on the request.
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when Keycloak rejects the refresh token.
    pub async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        admin_token: &str,
    ) -> Result<TokenResponse> {
        info!(client_id, "Beginning token refresh");
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];
        let tokens = self.request(&form, Some(admin_token)).await?;
        info!(client_id, "Refresh successful");
        Ok(tokens)
    }

    async fn request(&self, form: &[(&str, &str)], bearer: Option<&str>) -> Result<TokenResponse> {
        let grant_type = form
            .iter()
            .find(|(key, _)| *key == "grant_type")
            .map(|(_, value)| *value)
            .unwrap_or_default();

        let mut request = self.http_client.post(&self.endpoint).form(form);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let err = http::provider_error(response).await;
            warn!(realm = %self.realm, grant_type, status = status.as_u16(), error = %err, "Token request failed");
            return Err(err);
        }

        let tokens = response.json::<TokenResponse>().await.map_err(|e| {
            AuthError::provider(
                Some(status.as_u16()),
                format!("unusable token response: {e}"),
            )
        })?;

        debug!(
            realm = %self.realm,
            grant_type,
            expires_in = ?tokens.expires_in,
            "Token request succeeded"
        );
        Ok(tokens)
    }
}
