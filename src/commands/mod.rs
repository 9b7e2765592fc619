/*!
Command handlers for the CLI

- `discover` -- resolve a server's issuer and print its provider endpoints
- `login`    -- interactive browser login, optionally followed by logout

Handlers print user-facing text; the library modules only log.
*/

use std::sync::Arc;

use crate::auth::logout::LogoutOutcome;
use crate::auth::manager::AuthSessionManager;
use crate::auth::session::{AuthSession, InMemorySessionStore};
use crate::config::Config;
use crate::error::{OpenCloudError, Result};

/// Message shown for every initialization failure.
pub const INITIALIZE_FAILED_MESSAGE: &str =
    "Failed to connect to the server. Could not discover the login configuration.";

fn new_manager(config: Config) -> Result<AuthSessionManager> {
    AuthSessionManager::new(config, Arc::new(InMemorySessionStore::new()))
}

/// Initializes the manager, mapping any failure to the generic message.
async fn initialize(manager: &mut AuthSessionManager, server: &str) -> Result<()> {
    match manager.initialize(server).await {
        Ok(outcome) => {
            if outcome.insecure_warning {
                eprintln!("Warning: this server uses an insecure connection (http://).");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Initialization for {} failed: {:#}", server, e);
            Err(anyhow::anyhow!(INITIALIZE_FAILED_MESSAGE))
        }
    }
}

/// Renders a login failure for the user.
///
/// Token endpoint failures show the HTTP status; debug builds also show
/// the correlation id so it can be quoted in a support request.
pub fn describe_login_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<OpenCloudError>() {
        Some(OpenCloudError::TokenExchange {
            status,
            status_text,
            request_id,
            ..
        }) => {
            let mut message = format!("Login failed: the server answered {} {}", status, status_text);
            if cfg!(debug_assertions) {
                message.push_str(&format!(" (request id: {})", request_id));
            }
            message
        }
        Some(OpenCloudError::Callback(reason)) => format!("Login failed: {}", reason),
        _ => format!("Login failed: {}", err),
    }
}

/// Renders a logout outcome for the user.
pub fn describe_logout(outcome: &LogoutOutcome) -> String {
    match (&outcome.redirect_url, outcome.status) {
        (None, 0) => "Logged out locally.".to_string(),
        (Some(url), 0) => format!(
            "Logged out locally. The identity provider could not be reached; open this page to finish logging out:\n{}",
            url
        ),
        (Some(url), status) => format!(
            "Logged out ({}). The identity provider offers a confirmation page:\n{}",
            status, url
        ),
        (None, status) if (200..300).contains(&status) => {
            "Logged out locally and at the identity provider.".to_string()
        }
        (None, status) => format!(
            "Logged out locally. The identity provider answered {}.",
            status
        ),
    }
}

// Discover command handler
pub mod discover {
    //! Prints the issuer and endpoints discovered for a server.

    use super::*;

    /// Run the `discover` command
    ///
    /// # Arguments
    ///
    /// * `config` - Effective configuration (consumed)
    /// * `server` - Server address as typed by the user
    pub async fn run_discover(config: Config, server: String) -> Result<()> {
        let mut manager = new_manager(config)?;
        initialize(&mut manager, &server).await?;

        if let (Some(server), Some(provider)) = (manager.server(), manager.provider_config()) {
            println!("Server:                 {}", server.normalized_url);
            println!("Issuer:                 {}", provider.issuer);
            println!("Authorization endpoint: {}", provider.authorization_endpoint);
            println!("Token endpoint:         {}", provider.token_endpoint);
            println!(
                "End session endpoint:   {}",
                provider.end_session_endpoint.as_deref().unwrap_or("(none)")
            );
            if let Some(userinfo) = &provider.userinfo_endpoint {
                println!("Userinfo endpoint:      {}", userinfo);
            }
        }
        Ok(())
    }
}

// Login command handler
pub mod login {
    //! Browser login: print the authorization URL, read the redirect back
    //! from stdin and exchange the code.

    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// Options of the `login` command
    #[derive(Debug, Clone, Default)]
    pub struct LoginOptions {
        /// Do not try to open a browser
        pub no_browser: bool,
        /// Log out once logged in
        pub logout: bool,
        /// Skip the IdP on logout
        pub skip_idp_logout: bool,
    }

    /// Run the `login` command
    ///
    /// # Arguments
    ///
    /// * `config` - Effective configuration (consumed)
    /// * `server` - Server address as typed by the user
    /// * `options` - Command flags
    pub async fn run_login(config: Config, server: String, options: LoginOptions) -> Result<()> {
        let mut manager = new_manager(config)?;
        initialize(&mut manager, &server).await?;

        let request = manager.get_authorization_url()?;
        println!("Open the following URL to log in:\n\n{}\n", request.url);
        if !options.no_browser {
            try_open_browser(&request.url);
        }

        println!("After logging in, paste the full redirect URL here:");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(OpenCloudError::Io)?;

        if let Err(e) = manager.complete_login(line.trim()).await {
            eprintln!("{}", describe_login_error(&e));
            return Err(e);
        }

        if let Some(session) = manager.session() {
            println!("{}", describe_session(session));
        }

        if options.logout {
            let outcome = manager.logout(!options.skip_idp_logout).await;
            println!("{}", describe_logout(&outcome));
        }

        Ok(())
    }

    /// Attempts to open `url` in the default browser. A failure is only
    /// logged since the URL has already been printed.
    fn try_open_browser(url: &str) {
        let Some(opener) = browser_command() else {
            tracing::debug!("No browser opener for this platform");
            return;
        };
        match std::process::Command::new(opener).arg(url).spawn() {
            Ok(mut child) => {
                if let Ok(Some(status)) = child.try_wait() {
                    if !status.success() {
                        tracing::debug!("{} exited with {}", opener, status);
                    }
                }
            }
            Err(e) => tracing::debug!("Could not start {}: {}", opener, e),
        }
    }

    fn browser_command() -> Option<&'static str> {
        if cfg!(target_os = "macos") {
            Some("open")
        } else if cfg!(target_os = "linux") {
            Some("xdg-open")
        } else {
            None
        }
    }

    /// Text shown for a freshly committed session.
    pub fn describe_session(session: &AuthSession) -> String {
        let mut text = format!(
            "Logged in to {} as client {}",
            session.server_url, session.client_id
        );
        if let Some(expires_at) = session.expires_at {
            if session.is_expired() {
                text.push_str(&format!(
                    "\nWarning: the access token already expired at {}",
                    expires_at.to_rfc3339()
                ));
            } else {
                text.push_str(&format!("\nAccess token expires at {}", expires_at.to_rfc3339()));
            }
        }
        text
    }

}
