//! Command-line interface definition for OpenCloud Auth
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for server discovery and interactive login.

use clap::{Parser, Subcommand};

use crate::config::Platform;

/// OpenCloud Auth - OpenCloud discovery and OpenID Connect login
#[derive(Parser, Debug, Clone)]
#[command(name = "opencloud-auth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging (includes HTTP response details)
    #[arg(short, long)]
    pub verbose: bool,

    /// Client platform whose registered identity is used (ios, android)
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for OpenCloud Auth
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve a server's OIDC issuer and print its endpoints
    Discover {
        /// Server address as a user would type it (e.g. `cloud.example.com`)
        server: String,
    },

    /// Log in through the browser and exchange the authorization code
    Login {
        /// Server address as a user would type it (e.g. `cloud.example.com`)
        server: String,

        /// Print the authorization URL without trying to open a browser
        #[arg(long)]
        no_browser: bool,

        /// Log out again once the login completed
        #[arg(long)]
        logout: bool,

        /// Only clear the local session on logout; do not contact the IdP
        #[arg(long, requires = "logout")]
        skip_idp_logout: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
