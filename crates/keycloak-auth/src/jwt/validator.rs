//! RS256 access token validation against the realm signing key
//!
//! Validation is one linear pass: decode → algorithm gate → fetch key →
//! verify. Nothing about the token is trusted before the signature check
//! succeeds; the unverified header only chooses the key.
//!
//! Issuer, audience and subject expectations come from configuration, never
//! from the token under test. Only `RS256` is accepted, which closes the
//! `none`/`HS256` algorithm confusion paths.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, TokenData, Validation, decode};
use tracing::{debug, warn};

use super::keys::KeyProvider;
use super::{TokenClaims, decode_unverified};
use crate::config::KeycloakConfig;
use crate::error::{AuthError, Result};

/// The only accepted signing algorithm
pub const ALLOWED_ALGORITHM: Algorithm = Algorithm::RS256;

/// A token that passed validation
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The verified claims
    pub claims: TokenClaims,
    /// Algorithm used for signing
    pub algorithm: Algorithm,
    /// Key ID (kid) from the token header
    pub key_id: Option<String>,
    /// When the token was issued
    pub issued_at: Option<SystemTime>,
    /// When the token expires
    pub expires_at: Option<SystemTime>,
}

/// Access token validator
///
/// Shareable across tasks; the only mutable state is the key cache inside
/// the [`KeyProvider`].
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use keycloak_auth::KeycloakConfig;
/// # use keycloak_auth::jwt::{RealmKeyProvider, TokenValidator};
/// # tokio_test::block_on(async {
/// let config = KeycloakConfig::new("https://sso.example.com", "acme")
///     .with_expected_audience("my-client");
/// let keys = Arc::new(RealmKeyProvider::new(&config)?);
/// let validator = TokenValidator::from_config(&config, keys);
///
/// match validator.validate("eyJ0eXAi...").await {
///     Ok(token) => println!("Valid token for: {:?}", token.claims.sub),
///     Err(e) => println!("Rejected ({}): {}", e.kind(), e),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct TokenValidator {
    keys: Arc<dyn KeyProvider>,
    expected_issuer: String,
    expected_audience: Option<String>,
    expected_subject: Option<String>,
    leeway: Duration,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("expected_issuer", &self.expected_issuer)
            .field("expected_audience", &self.expected_audience)
            .field("expected_subject", &self.expected_subject)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator for tokens from `expected_issuer`
    ///
    /// Audience and subject are not checked until configured; the leeway is zero.
    pub fn new(keys: Arc<dyn KeyProvider>, expected_issuer: impl Into<String>) -> Self {
        Self {
            keys,
            expected_issuer: expected_issuer.into(),
            expected_audience: None,
            expected_subject: None,
            leeway: Duration::ZERO,
        }
    }

    /// Create a validator using the issuer, audience, subject and leeway from `config`
    pub fn from_config(config: &KeycloakConfig, keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            keys,
            expected_issuer: config.issuer(),
            expected_audience: config.expected_audience.clone(),
            expected_subject: config.expected_subject.clone(),
            leeway: config.leeway(),
        }
    }

    /// Require this audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience = Some(audience.into());
        self
    }

    /// Require this subject
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.expected_subject = Some(subject.into());
        self
    }

    /// Tolerate clock skew on `exp` and `nbf`
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Expected issuer
    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Expected audience, if checked
    pub fn expected_audience(&self) -> Option<&str> {
        self.expected_audience.as_deref()
    }

    /// Validate a bearer token and return its verified claims
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] if the token is not three base64url
    ///   JSON segments
    /// - [`AuthError::KeyRetrieval`] if the signing certificate cannot be obtained
    /// - [`AuthError::TokenVerification`] if the algorithm is not RS256, the
    ///   signature does not match, the token is expired or not yet valid,
    ///   or issuer/audience/subject do not match
    pub async fn validate(&self, token: &str) -> Result<VerifiedToken> {
        let unverified = decode_unverified(token)?;
        let header = unverified.header;

        if header.alg != "RS256" {
            warn!(algorithm = %header.alg, "JWT algorithm not allowed");
            return Err(AuthError::verification(format!(
                "algorithm '{}' is not allowed; only RS256 is accepted",
                header.alg
            )));
        }

        let key = self.keys.signing_key(header.kid.as_deref()).await?;

        let token_data: TokenData<TokenClaims> =
            decode(token, key.decoding_key(), &self.validation()).map_err(|e| {
                warn!(
                    error = %e,
                    issuer = %self.expected_issuer,
                    kid = ?header.kid,
                    "JWT validation failed"
                );
                AuthError::verification(describe(e.kind()))
            })?;

        let claims = token_data.claims;
        // Dates past what SystemTime can hold are reported as absent
        let issued_at = claims.iat.and_then(unix_time);
        let expires_at = claims.exp.and_then(unix_time);

        debug!(
            issuer = %self.expected_issuer,
            subject = ?claims.sub,
            kid = ?header.kid,
            "JWT validation successful"
        );

        Ok(VerifiedToken {
            claims,
            algorithm: ALLOWED_ALGORITHM,
            key_id: header.kid,
            issued_at,
            expires_at,
        })
    }

    /// Boolean form of [`TokenValidator::validate`]
    ///
    /// Never fails: every rejection is logged with its classification and
    /// reported as `false`.
    pub async fn validate_access_token(&self, token: &str) -> bool {
        match self.validate(token).await {
            Ok(_) => true,
            Err(e) => {
                warn!(kind = %e.kind(), reason = %e, "Invalid token");
                false
            }
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALLOWED_ALGORITHM);
        validation.leeway = self.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[&self.expected_issuer]);

        match &self.expected_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        validation.sub = self.expected_subject.clone();
        validation
    }
}

fn unix_time(secs: u64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}

/// Human readable rejection reason
fn describe(kind: &JwtErrorKind) -> String {
    match kind {
        JwtErrorKind::InvalidSignature => {
            "signature does not match the realm signing key".to_string()
        }
        JwtErrorKind::ExpiredSignature => "token has expired".to_string(),
        JwtErrorKind::ImmatureSignature => "token is not valid yet (nbf)".to_string(),
        JwtErrorKind::InvalidIssuer => "issuer does not match".to_string(),
        JwtErrorKind::InvalidAudience => "audience does not match".to_string(),
        JwtErrorKind::InvalidSubject => "subject does not match".to_string(),
        JwtErrorKind::InvalidAlgorithm => "algorithm does not match the signing key".to_string(),
        JwtErrorKind::MissingRequiredClaim(claim) => format!("missing required claim '{claim}'"),
        other => format!("{other:?}"),
    }
}
