//! One-stop facade over a realm
//!
//! [`Keycloak`] wires a single HTTP client into the key provider, validator,
//! token client and admin client, and adds the multi-step flows that need
//! more than one of them.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::admin::{AdminClient, ClientRepresentation};
use crate::config::KeycloakConfig;
use crate::error::{AuthError, Result};
use crate::http;
use crate::jwt::{KeyProvider, PublicKeyMaterial, RealmKeyProvider, TokenValidator, VerifiedToken, decode_unverified};
use crate::token::{TokenClient, TokenResponse};

/// Keycloak realm client
///
/// # Example
///
/// ```rust,no_run
/// use keycloak_auth::{Keycloak, KeycloakConfig};
///
/// # tokio_test::block_on(async {
/// let config = KeycloakConfig::new("https://sso.example.com", "acme")
///     .with_credentials("admin", "change-me")
///     .with_expected_audience("my-app");
/// let keycloak = Keycloak::new(config)?;
///
/// if keycloak.validate_access_token("eyJ...").await {
///     println!("accepted");
/// }
///
/// let admin_token = keycloak.login().await?;
/// let tokens = keycloak
///     .token_exchange(&admin_token, "my-app", "auth-code", "https://app.example.com/callback")
///     .await?;
/// println!("expires in {:?}s", tokens.expires_in);
/// # Ok::<(), keycloak_auth::AuthError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Keycloak {
    config: KeycloakConfig,
    keys: Arc<RealmKeyProvider>,
    validator: Arc<TokenValidator>,
    tokens: TokenClient,
    admin: AdminClient,
}

impl Keycloak {
    /// Build every component from `config`
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: KeycloakConfig) -> Result<Self> {
        config.validate()?;
        let http_client = http::build_client(&config)?;

        let keys = Arc::new(RealmKeyProvider::with_client(&config, http_client.clone()));
        let validator = Arc::new(TokenValidator::from_config(&config, keys.clone()));
        let tokens = TokenClient::with_client(&config, http_client.clone());
        let admin = AdminClient::with_client(&config, http_client);

        Ok(Self {
            config,
            keys,
            validator,
            tokens,
            admin,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    /// Signing key provider
    pub fn keys(&self) -> &Arc<RealmKeyProvider> {
        &self.keys
    }

    /// Token validator
    pub fn validator(&self) -> &Arc<TokenValidator> {
        &self.validator
    }

    /// Token endpoint client
    pub fn tokens(&self) -> &TokenClient {
        &self.tokens
    }

    /// Admin REST client
    pub fn admin(&self) -> &AdminClient {
        &self.admin
    }

    /// Current realm signing certificate
    ///
    /// # Errors
    ///
    /// [`AuthError::KeyRetrieval`] when the certificate cannot be obtained.
    pub async fn fetch_public_key(&self) -> Result<PublicKeyMaterial> {
        self.keys.fetch_public_key().await
    }

    /// Validate an access token
    ///
    /// # Errors
    ///
    /// See [`TokenValidator::validate`].
    pub async fn validate(&self, token: &str) -> Result<VerifiedToken> {
        self.validator.validate(token).await
    }

    /// See [`TokenValidator::validate_access_token`]
    pub async fn validate_access_token(&self, token: &str) -> bool {
        self.validator.validate_access_token(token).await
    }

    /// Admin login through `admin-cli`
    ///
    /// # Errors
    ///
    /// See [`TokenClient::login`].
    pub async fn login(&self) -> Result<String> {
        self.tokens.login().await
    }

    /// Exchange an authorization code on behalf of a realm client
    ///
    /// Looks the client up by `client_id`, reads its secret with the admin
    /// token `auth`, then performs the code exchange.
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] with status 404 when `client_id` is not a
    /// realm client, or when Keycloak rejects the exchange.
    pub async fn token_exchange(
        &self,
        auth: &str,
        client_id: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let client = self.require_client(auth, client_id).await?;
        let secret = self.admin.client_secret(auth, &client).await?;

        self.tokens
            .exchange_code(&client.client_id, secret.value.expose_secret(), code, redirect_uri)
            .await
    }

    /// Refresh tokens for the client the refresh token was issued to
    ///
    /// The client is read from the `azp` claim of the (unverified) refresh
    /// token; Keycloak verifies the token itself during the grant.
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedToken`] when the refresh token cannot be decoded
    /// or has no `azp`, [`AuthError::Provider`] as for [`Keycloak::token_exchange`].
    pub async fn refresh_token(&self, auth: &str, refresh_token: &str) -> Result<TokenResponse> {
        let azp = decode_unverified(refresh_token)?
            .claims
            .azp
            .ok_or_else(|| AuthError::malformed("refresh token has no azp claim"))?;
        info!(client_id = %azp, "Refreshing token");

        let client = self.require_client(auth, &azp).await?;
        let secret = self.admin.client_secret(auth, &client).await?;

        self.tokens
            .refresh(&client.client_id, secret.value.expose_secret(), refresh_token, auth)
            .await
    }

    async fn require_client(&self, auth: &str, client_id: &str) -> Result<ClientRepresentation> {
        match self.admin.find_client(auth, client_id).await? {
            Some(client) => Ok(client),
            None => {
                warn!(realm = %self.config.realm, client_id, "Client not found");
                Err(AuthError::provider(
                    Some(404),
                    format!("client '{client_id}' not found in realm '{}'", self.config.realm),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Keycloak::new(KeycloakConfig::new("ftp://sso.example.com", "acme")).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn test_components_share_realm() {
        let keycloak = Keycloak::new(KeycloakConfig::new("https://sso.example.com", "acme")).unwrap();
        assert_eq!(
            keycloak.keys().certs_uri(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
        );
        assert_eq!(
            keycloak.validator().expected_issuer(),
            "https://sso.example.com/realms/acme"
        );
    }

    #[tokio::test]
    async fn test_refresh_token_requires_azp() {
        use base64::Engine as _;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let keycloak = Keycloak::new(KeycloakConfig::new("https://sso.example.com", "acme")).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"user-123"}"#);
        let token = format!("{header}.{payload}.sig");

        let err = keycloak.refresh_token("admin", &token).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }
}
