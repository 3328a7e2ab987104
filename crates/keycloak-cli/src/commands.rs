//! Command implementations

use std::collections::HashMap;

use keycloak_auth::{Keycloak, KeycloakConfig};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::cli::{Cli, ClientCommand, Command, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output;

/// Build the client configuration from `--config`, the environment and flags
///
/// Flags override `KEYCLOAK_*` variables, which override the file.
/// Credentials are only checked by the commands that log in.
///
/// # Errors
///
/// Returns [`CliError::Config`] when no usable configuration can be assembled.
pub fn resolve_config(cli: &Cli) -> CliResult<KeycloakConfig> {
    resolve_config_with_env(cli, None)
}

fn resolve_config_with_env(
    cli: &Cli,
    env: Option<HashMap<String, String>>,
) -> CliResult<KeycloakConfig> {
    let flags = [
        ("base_uri", &cli.base_uri),
        ("realm", &cli.realm),
        ("username", &cli.username),
        ("password", &cli.password),
    ];
    let overrides: Vec<(&str, &str)> = flags
        .iter()
        .filter_map(|(key, value)| value.as_deref().map(|value| (*key, value)))
        .collect();

    let mut config = KeycloakConfig::load(cli.config.as_deref(), env, &overrides)?;

    if cli.danger_accept_invalid_certs {
        config = config.danger_accept_invalid_certs(true);
    }

    debug!(base_uri = %config.base_uri, realm = %config.realm, "Resolved configuration");
    Ok(config)
}

/// Run one subcommand
///
/// # Errors
///
/// Returns [`CliError::TokenRejected`] when `validate` rejects the token and
/// [`CliError::Auth`] for any provider failure.
pub async fn execute(command: Command, keycloak: &Keycloak, format: OutputFormat) -> CliResult<()> {
    match command {
        Command::Validate { token } => match keycloak.validate(&token).await {
            Ok(verified) => output::verified(&verified, format),
            Err(e) => Err(CliError::TokenRejected {
                kind: e.kind(),
                reason: e.to_string(),
            }),
        },

        Command::Login => {
            let token = keycloak.login().await?;
            output::access_token(&token, format)
        }

        Command::Token {
            client_id,
            client_secret,
        } => {
            let token = keycloak.tokens().access_token(&client_id, &client_secret).await?;
            output::access_token(&token, format)
        }

        Command::Clients(command) => clients(command, keycloak, format).await,

        Command::Exchange {
            client_id,
            code,
            redirect_uri,
        } => {
            let admin_token = keycloak.login().await?;
            let tokens = keycloak
                .token_exchange(&admin_token, &client_id, &code, &redirect_uri)
                .await?;
            output::tokens(&tokens, format)
        }

        Command::Refresh { refresh_token } => {
            let admin_token = keycloak.login().await?;
            let tokens = keycloak.refresh_token(&admin_token, &refresh_token).await?;
            output::tokens(&tokens, format)
        }

        Command::Certs => {
            let material = keycloak.fetch_public_key().await?;
            output::certificate(&material, format)
        }
    }
}

async fn clients(command: ClientCommand, keycloak: &Keycloak, format: OutputFormat) -> CliResult<()> {
    let admin_token = keycloak.login().await?;
    let admin = keycloak.admin();

    match command {
        ClientCommand::List => {
            let clients = admin.list_clients(&admin_token).await?;
            output::clients(&clients, format)
        }
        ClientCommand::Create { client_id } => {
            let client = admin.create_client(&admin_token, &client_id).await?;
            output::client(&client, format)
        }
        ClientCommand::Secret { client_id } => {
            let client = admin
                .find_client(&admin_token, &client_id)
                .await?
                .ok_or_else(|| {
                    CliError::InvalidArguments(format!("client '{client_id}' not found"))
                })?;
            let secret = admin.client_secret(&admin_token, &client).await?;
            output::secret(&client.client_id, secret.value.expose_secret(), format)
        }
    }
}
