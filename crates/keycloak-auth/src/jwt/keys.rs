//! Realm signing key retrieval
//!
//! Keycloak publishes its realm keys at
//! `{base}/realms/{realm}/protocol/openid-connect/certs` as a JWK set whose
//! entries carry an `x5c` certificate chain. The first chain element is the
//! signing certificate (base64 DER). It is framed as PEM, parsed as X.509
//! and its RSA SubjectPublicKeyInfo becomes the verification key.
//!
//! # Key selection
//!
//! A token's `kid` header selects the published key with the same `kid`.
//! Tokens without a `kid` fall back to the first signing key in the set
//! (entries marked `"use": "enc"` are skipped); this keeps older deployments
//! that do not stamp a `kid` working, but cannot tell rotated keys apart.
//!
//! # Caching
//!
//! The published set is kept in memory for a TTL. Refreshes are serialized
//! behind one mutex so concurrent cache misses produce a single request. A
//! `kid` that is missing from a cached set forces one refresh (rate limited)
//! to pick up rotated keys. Keys are never written to disk.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use x509_parser::parse_x509_certificate;
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

use crate::config::KeycloakConfig;
use crate::error::{AuthError, Result};

/// Source of verification keys for the validator
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Key material for the given `kid`, or the default signing key when `kid` is `None`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyRetrieval`] when the provider cannot be reached
    /// or publishes no usable certificate, and [`AuthError::TokenVerification`]
    /// when `kid` names a key the provider does not publish.
    async fn signing_key(&self, kid: Option<&str>) -> Result<PublicKeyMaterial>;

    /// Default signing key
    ///
    /// # Errors
    ///
    /// See [`KeyProvider::signing_key`].
    async fn fetch_public_key(&self) -> Result<PublicKeyMaterial> {
        self.signing_key(None).await
    }
}

/// One entry of the realm's published key set
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SigningCertificate {
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,

    /// Key type (`RSA`, `EC`, ...)
    #[serde(default)]
    pub kty: Option<String>,

    /// Intended use (`sig` or `enc`)
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Declared algorithm
    #[serde(default)]
    pub alg: Option<String>,

    /// Certificate chain, base64 DER, leaf first
    #[serde(default)]
    pub x5c: Vec<String>,
}

impl SigningCertificate {
    /// The leaf certificate, base64 DER
    pub fn certificate(&self) -> Option<&str> {
        self.x5c.first().map(String::as_str)
    }

    fn is_signing_key(&self) -> bool {
        self.key_use.as_deref() != Some("enc")
    }
}

#[derive(Debug, Deserialize)]
struct CertificateSet {
    keys: Vec<SigningCertificate>,
}

/// PEM-framed signing certificate and the verification key derived from it
#[derive(Clone)]
pub struct PublicKeyMaterial {
    kid: Option<String>,
    pem: String,
    decoding_key: DecodingKey,
}

impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyMaterial")
            .field("kid", &self.kid)
            .field("pem_len", &self.pem.len())
            .field("decoding_key", &"<rsa>")
            .finish()
    }
}

impl PublicKeyMaterial {
    /// Build key material from a published entry
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyRetrieval`] when the entry has no `x5c`
    /// chain, the certificate is not valid base64 DER X.509, or its public
    /// key is not RSA.
    pub fn from_certificate(certificate: &SigningCertificate) -> Result<Self> {
        let der_base64 = certificate.certificate().ok_or_else(|| {
            AuthError::key_retrieval(format!(
                "key {} carries no x5c certificate",
                certificate.kid.as_deref().unwrap_or("<no kid>")
            ))
        })?;

        Self::from_base64_der(certificate.kid.clone(), der_base64)
    }

    /// Frame a base64 DER certificate as PEM and extract its RSA public key
    ///
    /// # Errors
    ///
    /// See [`PublicKeyMaterial::from_certificate`].
    pub fn from_base64_der(kid: Option<String>, der_base64: &str) -> Result<Self> {
        let pem = to_pem(der_base64);

        let (_, parsed_pem) = parse_x509_pem(pem.as_bytes())
            .map_err(|e| AuthError::key_retrieval(format!("invalid certificate encoding: {e}")))?;

        if parsed_pem.label != "CERTIFICATE" {
            return Err(AuthError::key_retrieval(format!(
                "unexpected PEM label '{}'",
                parsed_pem.label
            )));
        }

        let (_, certificate) = parse_x509_certificate(&parsed_pem.contents)
            .map_err(|e| AuthError::key_retrieval(format!("invalid X.509 certificate: {e}")))?;

        let spki = certificate.public_key();
        match spki.parsed() {
            Ok(PublicKey::RSA(_)) => {}
            Ok(_) => {
                return Err(AuthError::key_retrieval(
                    "signing certificate does not hold an RSA public key",
                ));
            }
            Err(e) => {
                return Err(AuthError::key_retrieval(format!(
                    "unreadable certificate public key: {e}"
                )));
            }
        }

        // The SPKI bit string of an RSA key is the PKCS#1 RSAPublicKey DER
        let decoding_key = DecodingKey::from_rsa_der(&spki.subject_public_key.data);

        Ok(Self {
            kid,
            pem,
            decoding_key,
        })
    }

    /// Key ID of the published entry
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// `-----BEGIN CERTIFICATE-----` framed certificate
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Verification key
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Wrap base64 DER in PEM delimiters with 64 column lines
fn to_pem(der_base64: &str) -> String {
    let body: String = der_base64.chars().filter(|c| !c.is_whitespace()).collect();

    let mut pem = String::with_capacity(body.len() + body.len() / 64 + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(64) {
        // chunks of an ASCII-only string stay valid UTF-8
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Pick the entry for `kid`, or the first signing entry when there is no `kid`
fn select<'a>(keys: &'a [SigningCertificate], kid: Option<&str>) -> Option<&'a SigningCertificate> {
    match kid {
        Some(kid) => keys.iter().find(|key| key.kid.as_deref() == Some(kid)),
        None => keys.iter().find(|key| key.is_signing_key()),
    }
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: Arc<[SigningCertificate]>,
    fetched_at: Instant,
}

impl CachedKeys {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Fetches the realm's signing certificates over HTTP
///
/// # Example
///
/// ```rust,no_run
/// # use keycloak_auth::{KeycloakConfig, jwt::{KeyProvider, RealmKeyProvider}};
/// # tokio_test::block_on(async {
/// let config = KeycloakConfig::new("https://sso.example.com", "acme");
/// let keys = RealmKeyProvider::new(&config)?;
///
/// let material = keys.fetch_public_key().await?;
/// println!("{}", material.pem());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct RealmKeyProvider {
    certs_uri: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
    /// Serializes fetches and remembers when the last one happened
    refresh: Mutex<Option<Instant>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
}

impl fmt::Debug for RealmKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmKeyProvider")
            .field("certs_uri", &self.certs_uri)
            .field("cache_ttl", &self.cache_ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl RealmKeyProvider {
    /// Create a provider with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &KeycloakConfig) -> Result<Self> {
        let http_client = crate::http::build_client(config)?;
        Ok(Self::with_client(config, http_client))
    }

    /// Create a provider sharing an existing HTTP client
    pub fn with_client(config: &KeycloakConfig, http_client: reqwest::Client) -> Self {
        Self {
            certs_uri: config.certs_endpoint(),
            http_client,
            cache: RwLock::new(None),
            refresh: Mutex::new(None),
            cache_ttl: config.key_cache_ttl(),
            min_refresh_interval: config.min_key_refresh(),
        }
    }

    /// Certificate endpoint URI
    pub fn certs_uri(&self) -> &str {
        &self.certs_uri
    }

    /// Drop cached keys; the next lookup fetches
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        debug!(certs_uri = %self.certs_uri, "Signing key cache cleared");
    }

    /// Published keys, from cache when fresh
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyRetrieval`] if a fetch is needed and fails.
    pub async fn keys(&self) -> Result<Arc<[SigningCertificate]>> {
        if let Some(keys) = self.cached().await {
            debug!(certs_uri = %self.certs_uri, "Using cached signing keys");
            return Ok(keys);
        }

        let mut last_refresh = self.refresh.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(keys) = self.cached().await {
            return Ok(keys);
        }

        let keys = self.fetch_and_store().await?;
        *last_refresh = Some(Instant::now());
        Ok(keys)
    }

    /// Refetch unless the last fetch was within the minimum refresh interval
    ///
    /// Returns `None` when the refresh was rate limited.
    async fn refresh_for_rotation(&self) -> Result<Option<Arc<[SigningCertificate]>>> {
        let mut last_refresh = self.refresh.lock().await;

        if let Some(last) = *last_refresh
            && last.elapsed() < self.min_refresh_interval
        {
            warn!(
                certs_uri = %self.certs_uri,
                since_last_ms = last.elapsed().as_millis(),
                "Signing key refresh rate limited"
            );
            return Ok(None);
        }

        let keys = self.fetch_and_store().await?;
        *last_refresh = Some(Instant::now());
        Ok(Some(keys))
    }

    async fn cached(&self) -> Option<Arc<[SigningCertificate]>> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.is_fresh(self.cache_ttl))
            .map(|cached| Arc::clone(&cached.keys))
    }

    async fn fetch_and_store(&self) -> Result<Arc<[SigningCertificate]>> {
        let keys = self.fetch().await?;

        if !self.cache_ttl.is_zero() {
            *self.cache.write().await = Some(CachedKeys {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            });
        }

        Ok(keys)
    }

    async fn fetch(&self) -> Result<Arc<[SigningCertificate]>> {
        info!(certs_uri = %self.certs_uri, "Fetching realm signing certificates");

        let response = self
            .http_client
            .get(&self.certs_uri)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!(certs_uri = %self.certs_uri, error = %e, "Failed to fetch signing certificates");
                AuthError::key_retrieval_with("certificate request failed", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                certs_uri = %self.certs_uri,
                status = %status,
                "Certificate endpoint returned error status"
            );
            return Err(AuthError::key_retrieval(format!(
                "certificate endpoint returned status {status}"
            )));
        }

        let set: CertificateSet = response.json().await.map_err(|e| {
            error!(certs_uri = %self.certs_uri, error = %e, "Failed to parse certificate response");
            AuthError::key_retrieval_with("invalid certificate response", e)
        })?;

        if set.keys.is_empty() {
            error!(certs_uri = %self.certs_uri, "Certificate endpoint published no keys");
            return Err(AuthError::key_retrieval("certificate endpoint returned an empty key list"));
        }

        info!(
            certs_uri = %self.certs_uri,
            key_count = set.keys.len(),
            "Fetched realm signing certificates"
        );

        Ok(set.keys.into())
    }
}

#[async_trait]
impl KeyProvider for RealmKeyProvider {
    async fn signing_key(&self, kid: Option<&str>) -> Result<PublicKeyMaterial> {
        let keys = self.keys().await?;

        if let Some(entry) = select(&keys, kid) {
            return PublicKeyMaterial::from_certificate(entry);
        }

        let Some(kid) = kid else {
            return Err(AuthError::key_retrieval(
                "certificate endpoint published no signing key",
            ));
        };

        debug!(kid = kid, "Key ID not in published set, refreshing");
        if let Some(fresh) = self.refresh_for_rotation().await?
            && let Some(entry) = select(&fresh, Some(kid))
        {
            return PublicKeyMaterial::from_certificate(entry);
        }

        warn!(kid = kid, certs_uri = %self.certs_uri, "Token signed with unknown key");
        Err(AuthError::verification(format!(
            "signing key '{kid}' is not published by the realm"
        )))
    }
}
