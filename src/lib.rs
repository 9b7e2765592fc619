//! OpenCloud Auth - server discovery and OpenID Connect login library
//!
//! This library implements the authentication core of an OpenCloud client:
//! normalizing the server address the user typed, discovering the OIDC
//! issuer through WebFinger, fetching the provider configuration, running
//! the authorization-code login and ending the session at the IdP.
//!
//! # Architecture
//!
//! - `auth`: discovery, login and logout, owned by [`AuthSessionManager`]
//! - `http`: the shared HTTP transport with request correlation and logging
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli` / `commands`: command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use opencloud_auth::{AuthSessionManager, Config, InMemorySessionStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut manager =
//!         AuthSessionManager::new(Config::default(), Arc::new(InMemorySessionStore::new()))?;
//!     manager.initialize("cloud.example.com").await?;
//!     println!("{}", manager.get_authorization_url()?.url);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;

// Re-export commonly used types
pub use auth::logout::LogoutOutcome;
pub use auth::manager::{AuthSessionManager, InitializeOutcome};
pub use auth::session::{AuthSession, InMemorySessionStore, SessionStore};
pub use config::Config;
pub use error::{OpenCloudError, Result};
