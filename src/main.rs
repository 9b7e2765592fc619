//! OpenCloud Auth - discovery and login CLI
//!
#![doc = "OpenCloud Auth - discovery and login CLI"]
#![doc = "Main entry point for the opencloud-auth application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use opencloud_auth::cli::{Cli, Commands};
use opencloud_auth::commands;
use opencloud_auth::commands::login::LoginOptions;
use opencloud_auth::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Discover { server } => {
            tracing::info!("Starting discovery for {}", server);
            commands::discover::run_discover(config, server).await?;
            Ok(())
        }
        Commands::Login {
            server,
            no_browser,
            logout,
            skip_idp_logout,
        } => {
            tracing::info!("Starting login for {}", server);
            if skip_idp_logout {
                tracing::debug!("IdP logout disabled");
            }
            let options = LoginOptions {
                no_browser,
                logout,
                skip_idp_logout,
            };
            commands::login::run_login(config, server, options).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "opencloud_auth=debug"
    } else {
        "opencloud_auth=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
