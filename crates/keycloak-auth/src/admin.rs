//! Realm client administration
//!
//! A thin client over `{base}/admin/realms/{realm}/clients`. Every call is
//! authenticated with a bearer token, normally the one returned by
//! [`crate::TokenClient::login`].

use std::collections::HashMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::KeycloakConfig;
use crate::error::{AuthError, Result};
use crate::http;

/// A Keycloak client as returned by the admin API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    /// Internal id, used in admin URLs
    pub id: String,

    /// Public client id, e.g. `my-app`
    pub client_id: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the client is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Public clients have no secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_client: Option<bool>,

    /// Allowed redirect URIs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,

    /// Everything else
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// Client secret credential
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    /// Credential type, normally `secret`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Secret value
    pub value: SecretString,
}

/// Admin REST client for realm clients
#[derive(Clone)]
pub struct AdminClient {
    clients_uri: String,
    realm: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("clients_uri", &self.clients_uri)
            .field("realm", &self.realm)
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl AdminClient {
    /// Create an admin client with its own HTTP client
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &KeycloakConfig) -> Result<Self> {
        Ok(Self::with_client(config, http::build_client(config)?))
    }

    /// Create an admin client sharing an existing HTTP client
    pub fn with_client(config: &KeycloakConfig, http_client: reqwest::Client) -> Self {
        Self {
            clients_uri: config.admin_clients_endpoint(),
            realm: config.realm.clone(),
            http_client,
        }
    }

    /// List every client in the realm
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when Keycloak refuses the request or returns
    /// an unreadable list, [`AuthError::Transport`] on transport failure.
    pub async fn list_clients(&self, auth: &str) -> Result<Vec<ClientRepresentation>> {
        let response = self
            .http_client
            .get(&self.clients_uri)
            .bearer_auth(auth)
            .send()
            .await?;

        let clients: Vec<ClientRepresentation> = Self::read_json(response, "client list").await?;
        debug!(realm = %self.realm, client_count = clients.len(), "Listed clients");
        Ok(clients)
    }

    /// Find a client by its public `clientId`
    ///
    /// # Errors
    ///
    /// See [`AdminClient::list_clients`]. A missing client is `Ok(None)`.
    pub async fn find_client(
        &self,
        auth: &str,
        client_id: &str,
    ) -> Result<Option<ClientRepresentation>> {
        debug!(realm = %self.realm, client_id, "Finding client");
        let clients = self.list_clients(auth).await?;
        Ok(clients.into_iter().find(|c| c.client_id == client_id))
    }

    /// Create a client and return its representation
    ///
    /// Keycloak answers the POST with `201 Created` and a `Location` header;
    /// the created client is read back from there.
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when the client cannot be created (for example
    /// a `409` for a duplicate `clientId`) or the response has no `Location`.
    pub async fn create_client(&self, auth: &str, client_id: &str) -> Result<ClientRepresentation> {
        info!(realm = %self.realm, client_id, "Creating client");
        let response = self
            .http_client
            .post(&self.clients_uri)
            .bearer_auth(auth)
            .json(&serde_json::json!({ "clientId": client_id }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err = http::provider_error(response).await;
            warn!(realm = %self.realm, client_id, status = status.as_u16(), error = %err, "Failed to create client");
            return Err(err);
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AuthError::provider(
                    Some(status.as_u16()),
                    "client created but no Location header was returned",
                )
            })?;
        let location = self.resolve(location)?;

        let response = self
            .http_client
            .get(location)
            .bearer_auth(auth)
            .send()
            .await?;

        let client: ClientRepresentation = Self::read_json(response, "created client").await?;
        info!(realm = %self.realm, client_id, id = %client.id, "Client created");
        Ok(client)
    }

    /// Read a confidential client's secret
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when Keycloak refuses the request.
    pub async fn client_secret(&self, auth: &str, client: &ClientRepresentation) -> Result<ClientSecret> {
        info!(realm = %self.realm, client_id = %client.client_id, "Retrieving client secret");
        let response = self
            .http_client
            .get(format!("{}/{}/client-secret", self.clients_uri, client.id))
            .bearer_auth(auth)
            .send()
            .await?;

        Self::read_json(response, "client secret").await
    }

    /// `Location` may be absolute or relative to the clients endpoint
    fn resolve(&self, location: &str) -> Result<Url> {
        Url::parse(&self.clients_uri)
            .and_then(|base| base.join(location))
            .map_err(|e| AuthError::provider(None, format!("invalid Location header '{location}': {e}")))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let err = http::provider_error(response).await;
            warn!(status = status.as_u16(), error = %err, "Failed to get {what}");
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AuthError::provider(Some(status.as_u16()), format!("unusable {what}: {e}")))
    }
}
