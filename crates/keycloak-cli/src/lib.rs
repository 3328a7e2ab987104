//! # Keycloak CLI
//!
//! Command-line access to one Keycloak realm: token validation, token
//! grants, client administration and signing certificate inspection.
//!
//! ## Usage
//!
//! ```bash
//! # Validate a token
//! keycloak-cli --base-uri https://sso.example.com --realm acme validate "$TOKEN"
//!
//! # List clients (logs in through admin-cli first)
//! KEYCLOAK_PASSWORD=... keycloak-cli --config keycloak.toml --username admin clients list
//!
//! # Show the signing certificate as JSON
//! keycloak-cli --config keycloak.toml certs --format json
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

use clap::Parser;
use keycloak_auth::Keycloak;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, ClientCommand, Command, OutputFormat};
pub use error::{CliError, CliResult};

/// Parse arguments and run the selected command
///
/// # Errors
///
/// Returns the command's [`CliError`]; the binary prints it and exits with 1.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = commands::resolve_config(&cli)?;
    let keycloak = Keycloak::new(config)?;

    commands::execute(cli.command, &keycloak, cli.format).await
}

/// Map -v/-q to a default level; `RUST_LOG` still wins when set
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
