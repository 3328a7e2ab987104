//! Access token handling
//!
//! - `keys` - signing certificate retrieval, key selection and caching
//! - `validator` - RS256 signature and claim verification
//!
//! This module also holds the claim types and the unverified decoder used
//! to read a token's header before any key is fetched. Nothing returned by
//! [`decode_unverified`] may be trusted for authorization.

pub mod keys;
pub mod validator;

pub use keys::{KeyProvider, PublicKeyMaterial, RealmKeyProvider, SigningCertificate};
pub use validator::{TokenValidator, VerifiedToken};

use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::HashMap;

use crate::error::{AuthError, Result};

/// `aud` claim: a single audience or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "my-client"`
    Single(String),
    /// `"aud": ["my-client", "account"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the token's audiences
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }

    /// All audiences
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(aud) => vec![aud.clone()],
            Self::Multiple(auds) => auds.clone(),
        }
    }
}

impl From<&str> for Audience {
    fn from(aud: &str) -> Self {
        Self::Single(aud.to_string())
    }
}

/// Access/refresh token claims
///
/// Registered claims per RFC 7519 plus Keycloak's `azp`. Every other claim
/// (realm roles, scopes, session ids...) is kept in `additional`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer (iss)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (sub)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time, Unix seconds
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<u64>,

    /// Not before, Unix seconds
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<u64>,

    /// Issued at, Unix seconds
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<u64>,

    /// JWT ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Authorized party: the client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Everything else
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// NumericDate as integer or fractional seconds, rounded to whole seconds
fn numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericDate {
        Whole(u64),
        Fractional(f64),
    }

    match Option::<NumericDate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumericDate::Whole(secs)) => Ok(Some(secs)),
        Some(NumericDate::Fractional(secs))
            if secs.is_finite() && secs >= 0.0 && secs < u64::MAX as f64 =>
        {
            Ok(Some(secs.round() as u64))
        }
        Some(NumericDate::Fractional(secs)) => Err(de::Error::custom(format!(
            "{secs} is not a valid NumericDate"
        ))),
    }
}

/// JOSE header fields this crate reads
///
/// `alg` stays a string so that unsupported algorithms (`none`, `HS256`,
/// ...) are rejected by the validator instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm
    pub alg: String,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Header and claims of a token whose signature has NOT been checked
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    /// Decoded header
    pub header: TokenHeader,
    /// Decoded claims
    pub claims: TokenClaims,
}

/// Split a compact token and decode its header and payload without verification
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] when the token does not have
/// exactly three segments, a segment is not base64url, or the header or
/// payload is not a JSON object.
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header_bytes = decode_segment(segments[0], "header")?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::malformed(format!("invalid header: {e}")))?;

    let payload_bytes = decode_segment(segments[1], "payload")?;
    let claims: TokenClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::malformed(format!("invalid claims: {e}")))?;

    Ok(UnverifiedToken { header, claims })
}

/// Base64url decode, tolerating padding
fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| URL_SAFE.decode(segment))
        .map_err(|e| AuthError::malformed(format!("invalid base64 in {name}: {e}")))
}
