//! # Keycloak Auth - OpenID Connect helper for Keycloak realms
//!
//! Validates RS256 access tokens against a realm's published signing
//! certificate and wraps the token and admin endpoints a backend needs
//! around it.
//!
//! ## Key Features
//!
//! - **Token validation** - RS256 only, with signature, expiry, issuer,
//!   audience and subject checks against configured expectations
//! - **Signing keys** - `x5c` certificate retrieval, `kid` selection,
//!   in-memory cache with single-flight refresh and rotation handling
//! - **Grants** - password, authorization code and refresh token grants
//! - **Client administration** - list, find and create clients, read secrets
//! - **Strict TLS** - certificate verification stays on unless explicitly disabled
//!
//! ## Architecture
//!
//! - [`config`] - `KeycloakConfig`, built in code or loaded from file + environment
//! - [`error`] - `AuthError` and its `ErrorKind` classification
//! - [`jwt`] - key provider, unverified decoding and the validator
//! - [`token`] - token endpoint grants
//! - [`admin`] - admin REST client
//! - [`client`] - the `Keycloak` facade tying them together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keycloak_auth::{Keycloak, KeycloakConfig};
//!
//! # tokio_test::block_on(async {
//! let config = KeycloakConfig::new("https://sso.example.com", "acme")
//!     .with_expected_audience("my-app");
//! let keycloak = Keycloak::new(config)?;
//!
//! match keycloak.validate("eyJhbGciOiJSUzI1NiJ9...").await {
//!     Ok(token) => println!("subject: {:?}", token.claims.sub),
//!     Err(e) => println!("rejected ({}): {}", e.kind(), e),
//! }
//! # Ok::<(), keycloak_auth::AuthError>(())
//! # });
//! ```
//!
//! ## Standards
//!
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7517** - JSON Web Key (JWK), `x5c` certificate chains
//! - **RFC 6749** - OAuth 2.0 Authorization Framework

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
mod http;
pub mod jwt;
pub mod token;

#[doc(inline)]
pub use admin::{AdminClient, ClientRepresentation, ClientSecret};

#[doc(inline)]
pub use client::Keycloak;

#[doc(inline)]
pub use config::{ConfigError, KeycloakConfig};

#[doc(inline)]
pub use error::{AuthError, ErrorKind, Result};

#[doc(inline)]
pub use jwt::{
    KeyProvider, PublicKeyMaterial, RealmKeyProvider, TokenClaims, TokenValidator, VerifiedToken,
};

#[doc(inline)]
pub use token::{TokenClient, TokenResponse};
