//! Output formatting for CLI results
//!
//! Results go to stdout; logs go to stderr so `--format json` stays parseable.

use std::time::UNIX_EPOCH;

use keycloak_auth::{ClientRepresentation, PublicKeyMaterial, TokenResponse, VerifiedToken};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::error::CliResult;

fn print_json(value: &serde_json::Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A validated token's claims
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn verified(token: &VerifiedToken, format: OutputFormat) -> CliResult<()> {
    let expires = token
        .expires_at
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    match format {
        OutputFormat::Json => print_json(&json!({
            "valid": true,
            "kid": token.key_id,
            "expires_at": expires,
            "claims": token.claims,
        })),
        OutputFormat::Human => {
            let claims = &token.claims;
            println!("Token is valid");
            println!("  subject:  {}", claims.sub.as_deref().unwrap_or("-"));
            println!("  issuer:   {}", claims.iss.as_deref().unwrap_or("-"));
            let audience = claims
                .aud
                .as_ref()
                .map(|aud| aud.to_vec().join(", "))
                .unwrap_or_else(|| "-".to_string());
            println!("  audience: {audience}");
            println!("  key id:   {}", token.key_id.as_deref().unwrap_or("-"));
            if let Some(exp) = expires {
                println!("  expires:  {exp}");
            }
            Ok(())
        }
    }
}

/// A bare access token
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn access_token(token: &str, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "access_token": token })),
        OutputFormat::Human => {
            println!("{token}");
            Ok(())
        }
    }
}

/// A full token endpoint response
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn tokens(tokens: &TokenResponse, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(tokens)?),
        OutputFormat::Human => {
            println!("access_token:  {}", tokens.access_token);
            if let Some(refresh) = &tokens.refresh_token {
                println!("refresh_token: {refresh}");
            }
            if let Some(expires_in) = tokens.expires_in {
                println!("expires_in:    {expires_in}s");
            }
            if let Some(scope) = &tokens.scope {
                println!("scope:         {scope}");
            }
            Ok(())
        }
    }
}

/// One client per line, or a JSON array
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn clients(clients: &[ClientRepresentation], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(clients)?),
        OutputFormat::Human => {
            for client in clients {
                let state = match client.enabled {
                    Some(false) => "disabled",
                    _ => "enabled",
                };
                println!("{}\t{}\t{state}", client.client_id, client.id);
            }
            Ok(())
        }
    }
}

/// A single client
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn client(client: &ClientRepresentation, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(client)?),
        OutputFormat::Human => {
            println!("Created client '{}' (id {})", client.client_id, client.id);
            Ok(())
        }
    }
}

/// A client secret value
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn secret(client_id: &str, value: &str, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "clientId": client_id, "value": value })),
        OutputFormat::Human => {
            println!("{value}");
            Ok(())
        }
    }
}

/// The realm signing certificate
///
/// # Errors
///
/// [`crate::CliError::Json`] if the JSON rendering fails.
pub fn certificate(material: &PublicKeyMaterial, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "kid": material.kid(), "pem": material.pem() })),
        OutputFormat::Human => {
            print!("{}", material.pem());
            Ok(())
        }
    }
}
