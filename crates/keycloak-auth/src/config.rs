//! Client configuration
//!
//! [`KeycloakConfig`] names the provider (base URI + realm), the admin
//! credentials used by the password grant, and the validation and caching
//! policy. It can be built in code or loaded from a TOML/YAML/JSON file
//! layered with `KEYCLOAK_`-prefixed environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::AuthError;

/// Environment variable prefix used by [`KeycloakConfig::from_file`] and [`KeycloakConfig::from_env`]
pub const ENV_PREFIX: &str = "KEYCLOAK";

/// Client id used by [`crate::TokenClient::login`]
pub const ADMIN_CLI_CLIENT_ID: &str = "admin-cli";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::Config(err.to_string())
    }
}

/// Keycloak realm connection and validation settings
#[derive(Debug, Clone, Deserialize)]
pub struct KeycloakConfig {
    /// Provider base URI, e.g. `https://sso.example.com`
    pub base_uri: String,

    /// Realm name
    pub realm: String,

    /// Username for the password grant
    #[serde(default)]
    pub username: Option<String>,

    /// Password for the password grant
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Expected `iss` claim. Defaults to `{base_uri}/realms/{realm}`
    #[serde(default)]
    pub expected_issuer: Option<String>,

    /// Expected `aud` claim. Audience is not checked when unset
    #[serde(default)]
    pub expected_audience: Option<String>,

    /// Expected `sub` claim. Subject is not checked when unset
    #[serde(default)]
    pub expected_subject: Option<String>,

    /// Clock skew tolerated on `exp`/`nbf`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,

    /// Timeout for every outbound request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long fetched signing keys are reused, in seconds (0 disables caching)
    #[serde(default = "default_key_cache_ttl_secs")]
    pub key_cache_ttl_secs: u64,

    /// Minimum spacing between forced key refreshes, in seconds
    #[serde(default = "default_min_key_refresh_secs")]
    pub min_key_refresh_secs: u64,

    /// Scope sent with the authorization code exchange
    #[serde(default = "default_exchange_scope")]
    pub exchange_scope: String,

    /// Accept any TLS certificate from the provider.
    ///
    /// DANGER: only for development against self-signed deployments.
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_key_cache_ttl_secs() -> u64 {
    300
}

fn default_min_key_refresh_secs() -> u64 {
    10
}

fn default_exchange_scope() -> String {
    "openid offline_access".to_string()
}

impl KeycloakConfig {
    /// Create a configuration for a realm with default policy
    ///
    /// # Example
    ///
    /// ```rust
    /// use keycloak_auth::KeycloakConfig;
    ///
    /// let config = KeycloakConfig::new("https://sso.example.com/", "acme");
    /// assert_eq!(
    ///     config.certs_endpoint(),
    ///     "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
    /// );
    /// ```
    pub fn new(base_uri: impl Into<String>, realm: impl Into<String>) -> Self {
        let mut config = Self {
            base_uri: base_uri.into(),
            realm: realm.into(),
            username: None,
            password: None,
            expected_issuer: None,
            expected_audience: None,
            expected_subject: None,
            leeway_secs: 0,
            request_timeout_secs: default_request_timeout_secs(),
            key_cache_ttl_secs: default_key_cache_ttl_secs(),
            min_key_refresh_secs: default_min_key_refresh_secs(),
            exchange_scope: default_exchange_scope(),
            danger_accept_invalid_certs: false,
        };
        config.normalize();
        config
    }

    /// Set the password grant credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Set the expected issuer
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Set the expected audience
    pub fn with_expected_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience = Some(audience.into());
        self
    }

    /// Set the expected subject
    pub fn with_expected_subject(mut self, subject: impl Into<String>) -> Self {
        self.expected_subject = Some(subject.into());
        self
    }

    /// Set the clock skew leeway
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Set the outbound request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the signing key cache TTL (`Duration::ZERO` fetches on every validation)
    pub fn with_key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the minimum spacing between forced key refreshes
    pub fn with_min_key_refresh(mut self, interval: Duration) -> Self {
        self.min_key_refresh_secs = interval.as_secs();
        self
    }

    /// Set the authorization code exchange scope
    pub fn with_exchange_scope(mut self, scope: impl Into<String>) -> Self {
        self.exchange_scope = scope.into();
        self
    }

    /// Disable TLS certificate verification toward the provider.
    ///
    /// DANGER: any certificate is accepted, including forged ones.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `KEYCLOAK_` prefix override file
    /// settings, e.g. `KEYCLOAK_REALM=staging`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(Some(path.as_ref()), None, &[])
    }

    /// Load configuration from `KEYCLOAK_`-prefixed environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if required values are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None, None, &[])
    }

    /// Layer an optional file, `KEYCLOAK_` environment variables and
    /// explicit overrides, each taking precedence over the one before
    ///
    /// `env` replaces the process environment when given. `overrides` are
    /// `(field, value)` pairs such as `("realm", "acme")`, typically taken
    /// from command line flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unsupported, or the
    /// combined values are missing or invalid.
    pub fn load(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
        overrides: &[(&str, &str)],
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }

            let format = match path.extension().and_then(|s| s.to_str()) {
                Some("toml") => FileFormat::Toml,
                Some("yaml") | Some("yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(ConfigError::UnsupportedFormat),
            };

            builder = builder.add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let config = builder.build()?;

        let mut loaded: Self = config.try_deserialize()?;
        loaded.normalize();
        loaded.validate()?;
        Ok(loaded)
    }

    fn normalize(&mut self) {
        self.base_uri = self.base_uri.trim().trim_end_matches('/').to_string();
        self.realm = self.realm.trim().to_string();
    }

    /// Check that the base URI and realm are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the base URI is not an absolute
    /// http(s) URL or the realm is empty or contains a `/`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_uri)
            .map_err(|e| ConfigError::Invalid(format!("base_uri '{}': {e}", self.base_uri)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_uri must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.realm.is_empty() {
            return Err(ConfigError::Invalid("realm cannot be empty".to_string()));
        }

        if self.realm.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "realm '{}' must not contain '/'",
                self.realm
            )));
        }

        Ok(())
    }

    /// `{base}/realms/{realm}`, which is also the realm's token issuer
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.base_uri, self.realm)
    }

    /// Issuer that validated tokens must carry
    pub fn issuer(&self) -> String {
        self.expected_issuer
            .clone()
            .unwrap_or_else(|| self.realm_url())
    }

    /// Signing certificate endpoint
    pub fn certs_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.realm_url())
    }

    /// Token endpoint
    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    /// Admin clients collection endpoint
    pub fn admin_clients_endpoint(&self) -> String {
        format!("{}/admin/realms/{}/clients", self.base_uri, self.realm)
    }

    /// Admin endpoint for one client's secret, by internal id
    pub fn client_secret_endpoint(&self, id: &str) -> String {
        format!("{}/{}/client-secret", self.admin_clients_endpoint(), id)
    }

    /// Outbound request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Signing key cache TTL
    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }

    /// Minimum spacing between forced key refreshes
    pub fn min_key_refresh(&self) -> Duration {
        Duration::from_secs(self.min_key_refresh_secs)
    }

    /// Clock skew leeway
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }
}
