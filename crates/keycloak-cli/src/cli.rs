//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "keycloak-cli",
    version,
    about = "Validate access tokens and manage clients in a Keycloak realm",
    long_about = "Talks to one Keycloak realm: validates RS256 access tokens against the realm\n\
                  signing certificate, runs token grants and manages realm clients.\n\n\
                  Connection settings come from --config layered with KEYCLOAK_* environment\n\
                  variables, or from the environment alone. --base-uri, --realm and the\n\
                  credential flags override both.\n\n\
                  SECURITY WARNINGS:\n\
                  - --danger-accept-invalid-certs disables TLS verification toward Keycloak\n\
                  - Passwords and client secrets given as flags may end up in shell history;\n\
                    prefer KEYCLOAK_PASSWORD and KEYCLOAK_CLIENT_SECRET"
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Keycloak base URI, e.g. https://sso.example.com
    #[arg(long, global = true)]
    pub base_uri: Option<String>,

    /// Realm name
    #[arg(long, global = true)]
    pub realm: Option<String>,

    /// Username for the admin login
    #[arg(long, global = true, env = "KEYCLOAK_USERNAME")]
    pub username: Option<String>,

    /// Password for the admin login
    #[arg(long, global = true, env = "KEYCLOAK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate verification (development only)
    #[arg(long, global = true)]
    pub danger_accept_invalid_certs: bool,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate an access token against the realm signing key
    Validate {
        /// Access token (compact JWT)
        token: String,
    },

    /// Log in through admin-cli and print the access token
    Login,

    /// Password grant for a confidential client
    Token {
        /// Client id
        #[arg(long)]
        client_id: String,

        /// Client secret
        #[arg(long, env = "KEYCLOAK_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
    },

    /// Realm client administration
    #[command(subcommand)]
    Clients(ClientCommand),

    /// Exchange an authorization code for tokens
    Exchange {
        /// Client id the code was issued to
        #[arg(long)]
        client_id: String,

        /// Authorization code
        #[arg(long)]
        code: String,

        /// Redirect URI used in the authorization request
        #[arg(long)]
        redirect_uri: String,
    },

    /// Refresh tokens for the client named in the refresh token
    Refresh {
        /// Refresh token
        refresh_token: String,
    },

    /// Print the current realm signing certificate
    Certs,
}

/// Client administration commands
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// List clients
    List,

    /// Create a client
    Create {
        /// Public client id
        client_id: String,
    },

    /// Print a client's secret
    Secret {
        /// Public client id
        client_id: String,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Human,
    /// JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_parsing() {
        let cli = Cli::try_parse_from([
            "keycloak-cli",
            "--base-uri",
            "https://sso.example.com",
            "--realm",
            "acme",
            "validate",
            "a.b.c",
        ])
        .unwrap();

        assert_eq!(cli.base_uri.as_deref(), Some("https://sso.example.com"));
        assert_eq!(cli.realm.as_deref(), Some("acme"));
        assert!(matches!(cli.command, Command::Validate { ref token } if token == "a.b.c"));
        assert_eq!(cli.format, OutputFormat::Human);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["keycloak-cli", "certs", "-vv", "--format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["keycloak-cli", "-q", "-v", "login"]).is_err());
    }

    #[test]
    fn test_clients_subcommands() {
        let cli = Cli::try_parse_from(["keycloak-cli", "clients", "create", "my-app"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Clients(ClientCommand::Create { ref client_id }) if client_id == "my-app"
        ));

        let cli = Cli::try_parse_from(["keycloak-cli", "clients", "list"]).unwrap();
        assert!(matches!(cli.command, Command::Clients(ClientCommand::List)));
    }

    #[test]
    fn test_exchange_requires_all_arguments() {
        assert!(
            Cli::try_parse_from(["keycloak-cli", "exchange", "--client-id", "my-app"]).is_err()
        );

        let cli = Cli::try_parse_from([
            "keycloak-cli",
            "exchange",
            "--client-id",
            "my-app",
            "--code",
            "xyz",
            "--redirect-uri",
            "https://app.example/callback",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Exchange { ref code, .. } if code == "xyz"));
    }

    #[test]
    fn test_tls_opt_out_is_explicit() {
        let cli = Cli::try_parse_from(["keycloak-cli", "certs"]).unwrap();
        assert!(!cli.danger_accept_invalid_certs);

        let cli =
            Cli::try_parse_from(["keycloak-cli", "--danger-accept-invalid-certs", "certs"]).unwrap();
        assert!(cli.danger_accept_invalid_certs);
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
