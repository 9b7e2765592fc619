//! Authentication session manager
//!
//! [`AuthSessionManager`] owns everything one login attempt needs: the
//! HTTP transport, the resolved server, the provider configuration, the
//! pending `state` and, once logged in, the [`AuthSession`]. It is the
//! only place these are mutated.
//!
//! # Lifecycle
//!
//! 1. [`initialize`](AuthSessionManager::initialize) normalizes the server
//!    input and discovers the provider configuration.
//! 2. [`get_authorization_url`](AuthSessionManager::get_authorization_url)
//!    yields the URL to open in a browser.
//! 3. [`complete_login`](AuthSessionManager::complete_login) (or
//!    [`exchange_code_for_tokens`](AuthSessionManager::exchange_code_for_tokens)
//!    with a code obtained elsewhere) commits the session.
//! 4. [`logout`](AuthSessionManager::logout) clears local state and then
//!    optionally ends the IdP session.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use opencloud_auth::auth::manager::AuthSessionManager;
//! use opencloud_auth::auth::session::InMemorySessionStore;
//! use opencloud_auth::config::Config;
//!
//! # async fn example() -> opencloud_auth::error::Result<()> {
//! let mut manager = AuthSessionManager::new(Config::default(), Arc::new(InMemorySessionStore::new()))?;
//! manager.initialize("cloud.example.com").await?;
//!
//! let request = manager.get_authorization_url()?;
//! println!("Open {}", request.url);
//!
//! // ... the browser redirects to oc://android.opencloud.eu?code=...&state=...
//! manager.complete_login("oc://android.opencloud.eu?code=abc&state=...").await?;
//! assert!(manager.is_authenticated());
//!
//! let outcome = manager.logout(true).await;
//! println!("IdP answered {}", outcome.status);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::auth::authorize::{self, AuthorizationRequest};
use crate::auth::discovery::{discover_configuration, OidcProviderConfig};
use crate::auth::locator::{normalize, ServerReference};
use crate::auth::logout::{build_end_session_url, end_session, LogoutOutcome};
use crate::auth::session::{AuthSession, SessionStore};
use crate::auth::token::{exchange_code, TokenResponse};
use crate::config::Config;
use crate::error::{OpenCloudError, Result};
use crate::http::HttpTransport;

/// What [`AuthSessionManager::initialize`] reports besides success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeOutcome {
    /// The user explicitly asked for plain `http://`
    pub insecure_warning: bool,
}

/// Owns the authentication state of one client.
///
/// Mutating operations take `&mut self`: a second initialization cannot
/// race the first on the same manager. Share it across tasks behind a
/// `tokio::sync::Mutex` if needed.
pub struct AuthSessionManager {
    http: HttpTransport,
    config: Config,
    store: Arc<dyn SessionStore>,
    server: Option<ServerReference>,
    provider: Option<OidcProviderConfig>,
    pending_state: Option<String>,
    session: Option<AuthSession>,
}

impl AuthSessionManager {
    /// Creates a manager with no server selected.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let http = HttpTransport::new(&config.api)?;
        Ok(Self::with_transport(http, config, store))
    }

    /// Creates a manager around an existing transport.
    pub fn with_transport(http: HttpTransport, config: Config, store: Arc<dyn SessionStore>) -> Self {
        Self {
            http,
            config,
            store,
            server: None,
            provider: None,
            pending_state: None,
            session: None,
        }
    }

    /// Resolves a server and fetches its provider configuration.
    ///
    /// Either the server and configuration are both set, or, on failure,
    /// both are cleared. An existing session is left alone; it is only
    /// replaced by the next successful token exchange.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::InvalidServerUrl`] if the input has no
    /// usable host, and the errors of
    /// [`discover_configuration`](crate::auth::discovery::discover_configuration)
    /// if the configuration cannot be fetched.
    pub async fn initialize(&mut self, input: &str) -> Result<InitializeOutcome> {
        self.server = None;
        self.provider = None;
        self.pending_state = None;

        let server = normalize(input);
        if server.is_insecure {
            tracing::warn!(
                "Connecting to {} over plain HTTP; credentials are not protected in transit",
                server.normalized_url
            );
        }

        let resource = server.webfinger_resource(&self.config.auth.webfinger_account)?;
        let provider =
            discover_configuration(&self.http, &server.normalized_url, &resource).await?;

        tracing::info!(
            "Initialized {} with issuer {}",
            server.normalized_url,
            provider.issuer
        );

        let outcome = InitializeOutcome {
            insecure_warning: server.is_insecure,
        };
        self.server = Some(server);
        self.provider = Some(provider);
        Ok(outcome)
    }

    /// Returns `true` once [`initialize`](Self::initialize) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.server.is_some() && self.provider.is_some()
    }

    /// The discovered provider configuration.
    pub fn provider_config(&self) -> Option<&OidcProviderConfig> {
        self.provider.as_ref()
    }

    /// The server selected by the last successful initialization.
    pub fn server(&self) -> Option<&ServerReference> {
        self.server.as_ref()
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds the authorization URL with a fresh `state`.
    ///
    /// The state is remembered and checked by
    /// [`complete_login`](Self::complete_login).
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::NotInitialized`] before a successful
    /// initialization.
    pub fn get_authorization_url(&mut self) -> Result<AuthorizationRequest> {
        let provider = self.provider.as_ref().ok_or(OpenCloudError::NotInitialized)?;

        let state = authorize::generate_state();
        let url = authorize::build_authorization_url(
            provider,
            &self.config.auth.client_id(),
            &self.config.auth.redirect_uri(),
            &self.config.auth.default_scopes,
            Some(&state),
        );
        self.pending_state = Some(state.clone());

        Ok(AuthorizationRequest { url, state })
    }

    /// Exchanges a code and commits the session.
    ///
    /// The session store is written first; the in-memory session is only
    /// replaced once that succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::NotInitialized`] before a successful
    /// initialization, the errors of
    /// [`exchange_code`](crate::auth::token::exchange_code), and
    /// [`OpenCloudError::Session`] if the store rejects the credentials.
    pub async fn exchange_code_for_tokens(&mut self, code: &str) -> Result<TokenResponse> {
        let (token_endpoint, server_url) = match (&self.provider, &self.server) {
            (Some(provider), Some(server)) => (
                provider.token_endpoint.clone(),
                server.normalized_url.clone(),
            ),
            _ => return Err(OpenCloudError::NotInitialized.into()),
        };

        let client_id = self.config.auth.client_id();
        let redirect_uri = self.config.auth.redirect_uri();
        let token =
            exchange_code(&self.http, &token_endpoint, &client_id, &redirect_uri, code).await?;

        let session =
            AuthSession::from_token_response(&token, &server_url, &client_id, &redirect_uri);
        self.store
            .set_credentials(&session.access_token, &session.server_url)?;
        self.session = Some(session);
        self.pending_state = None;

        tracing::info!("Authenticated against {}", server_url);
        Ok(token)
    }

    /// Extracts the code from a redirect callback and exchanges it.
    ///
    /// When an authorization URL was issued, the callback's `state` must
    /// match it.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::NotInitialized`] before a successful
    /// initialization, [`OpenCloudError::Callback`] for a bad callback and
    /// otherwise the errors of
    /// [`exchange_code_for_tokens`](Self::exchange_code_for_tokens).
    pub async fn complete_login(&mut self, callback_url: &str) -> Result<TokenResponse> {
        if !self.is_initialized() {
            return Err(OpenCloudError::NotInitialized.into());
        }
        let code = authorize::parse_callback(callback_url, self.pending_state.as_deref())?;
        self.exchange_code_for_tokens(&code).await
    }

    /// The current session, if logged in.
    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// Returns `true` when a session with an access token is committed.
    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.access_token.is_empty())
            && self.store.is_authenticated()
    }

    /// Logs out locally and, if asked, at the IdP.
    ///
    /// Local state is cleared before any network call and regardless of
    /// what follows. The IdP is contacted only when `initiate_idp_logout`
    /// is set and the provider advertised an `end_session_endpoint`.
    /// Never fails; see [`LogoutOutcome`].
    pub async fn logout(&mut self, initiate_idp_logout: bool) -> LogoutOutcome {
        let provider = self.provider.take();
        let id_token = self.session.take().and_then(|s| s.id_token);
        let client_id = self.config.auth.client_id();

        self.server = None;
        self.pending_state = None;
        if let Err(e) = self.store.clear() {
            tracing::error!("Failed to clear session store: {}", e);
        }
        tracing::info!("Local session cleared");

        if !initiate_idp_logout {
            return LogoutOutcome::local_only();
        }

        let Some(endpoint) = provider.and_then(|p| p.end_session_endpoint) else {
            tracing::debug!("Provider has no end_session_endpoint; skipping IdP logout");
            return LogoutOutcome::local_only();
        };

        let logout_url = match build_end_session_url(
            &endpoint,
            &client_id,
            id_token.as_deref(),
            self.config.auth.post_logout_redirect_uri.as_deref(),
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot build IdP logout URL: {}", e);
                return LogoutOutcome::local_only();
            }
        };

        end_session(&self.http, &logout_url, self.config.api.logout_timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::InMemorySessionStore;

    fn manager() -> AuthSessionManager {
        AuthSessionManager::new(Config::default(), Arc::new(InMemorySessionStore::new())).unwrap()
    }

    fn is_not_initialized(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<OpenCloudError>(),
            Some(OpenCloudError::NotInitialized)
        )
    }

    #[test]
    fn test_new_manager_is_empty() {
        let manager = manager();
        assert!(!manager.is_initialized());
        assert!(!manager.is_authenticated());
        assert!(manager.provider_config().is_none());
        assert!(manager.server().is_none());
        assert!(manager.session().is_none());
    }

    #[test]
    fn test_authorization_url_requires_initialization() {
        let err = manager().get_authorization_url().unwrap_err();
        assert!(is_not_initialized(&err));
    }

    #[tokio::test]
    async fn test_exchange_requires_initialization() {
        let err = manager().exchange_code_for_tokens("abc").await.unwrap_err();
        assert!(is_not_initialized(&err));
    }

    #[tokio::test]
    async fn test_complete_login_requires_initialization() {
        let err = manager()
            .complete_login("oc://android.opencloud.eu?code=abc")
            .await
            .unwrap_err();
        assert!(is_not_initialized(&err));
    }

    #[tokio::test]
    async fn test_logout_without_session_is_local_only() {
        let mut manager = manager();
        let outcome = manager.logout(true).await;
        assert_eq!(outcome, LogoutOutcome::local_only());
        assert!(!manager.is_authenticated());
    }
}
