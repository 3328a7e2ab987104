//! Common test utilities for integration tests
//!
//! A wiremock stand-in for a Keycloak realm plus helpers to mint RS256
//! tokens with the fixture keys.

#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use keycloak_auth::KeycloakConfig;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const REALM: &str = "test";
pub const ISSUER: &str = "https://idp.example/realms/test";
pub const AUDIENCE: &str = "my-client";
pub const SUBJECT: &str = "user-123";

pub const REALM_KEY_PEM: &str = include_str!("../fixtures/realm_signing_key.pem");
pub const REALM_CERT_PEM: &str = include_str!("../fixtures/realm_signing_cert.pem");
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_signing_key.pem");
pub const ROGUE_CERT_PEM: &str = include_str!("../fixtures/rogue_signing_cert.pem");
pub const EC_CERT_PEM: &str = include_str!("../fixtures/ec_signing_cert.pem");

/// Base64 DER body of a PEM certificate, as published in `x5c`
pub fn x5c(cert_pem: &str) -> String {
    cert_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect()
}

/// JWK set entry carrying `cert_pem`
pub fn jwk(kid: &str, cert_pem: &str) -> Value {
    json!({
        "kid": kid,
        "kty": "RSA",
        "alg": "RS256",
        "use": "sig",
        "x5c": [x5c(cert_pem)],
    })
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// Claims the default validator accepts
pub fn valid_claims() -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": SUBJECT,
        "azp": AUDIENCE,
        "iat": now(),
        "exp": now() + 300,
    })
}

/// Sign `claims` with `key_pem`
pub fn sign(alg: Algorithm, kid: Option<&str>, key_pem: &str, claims: &Value) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(key_pem.as_bytes()).expect("fixture key");
    encode(&header, claims, &key).expect("signing failed")
}

/// RS256 token from the realm key
pub fn realm_token(kid: Option<&str>, claims: &Value) -> String {
    sign(Algorithm::RS256, kid, REALM_KEY_PEM, claims)
}

/// Mock Keycloak realm
pub struct MockKeycloak {
    pub server: MockServer,
}

impl MockKeycloak {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_uri(&self) -> String {
        self.server.uri()
    }

    /// Client configuration against this realm with test expectations
    pub fn config(&self) -> KeycloakConfig {
        KeycloakConfig::new(self.base_uri(), REALM)
            .with_expected_issuer(ISSUER)
            .with_expected_audience(AUDIENCE)
            .with_expected_subject(SUBJECT)
    }

    pub fn certs_path() -> String {
        format!("/realms/{REALM}/protocol/openid-connect/certs")
    }

    pub fn token_path() -> String {
        format!("/realms/{REALM}/protocol/openid-connect/token")
    }

    pub fn clients_path() -> String {
        format!("/admin/realms/{REALM}/clients")
    }

    /// Publish `keys` at the certs endpoint
    pub async fn mock_certs(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    /// Publish `keys`, asserting the endpoint is hit exactly `times` times
    pub async fn mock_certs_expect(&self, keys: Vec<Value>, times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Publish `keys` with a response delay, to widen race windows
    pub async fn mock_certs_delayed(&self, keys: Vec<Value>, delay: Duration, times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "keys": keys }))
                    .set_delay(delay),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Certs endpoint answering with `status`
    pub async fn mock_certs_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(ResponseTemplate::new(status).set_body_string("unavailable"))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint returning `body` with `status`
    pub async fn mock_token(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
