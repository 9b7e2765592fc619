//! Authenticated session state
//!
//! [`AuthSession`] is what a successful token exchange produces. The
//! [`SessionStore`] trait is the seam to whatever holds credentials for the
//! rest of the application; [`InMemorySessionStore`] is the default.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::auth::token::TokenResponse;
use crate::error::{OpenCloudError, Result};

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// The result of a completed login.
///
/// Created only by a successful token exchange and destroyed on logout.
/// The `Debug` impl never prints token values.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Normalized server URL the session belongs to.
    pub server_url: String,
    /// Access token used for API requests.
    pub access_token: String,
    /// ID token, sent as `id_token_hint` on IdP logout.
    pub id_token: Option<String>,
    /// Client id the tokens were issued to.
    pub client_id: String,
    /// Redirect URI used during login.
    pub redirect_uri: String,
    /// When the token exchange completed.
    pub authenticated_at: DateTime<Utc>,
    /// When the access token expires, if the provider said.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Builds a session from a token response.
    pub fn from_token_response(
        token: &TokenResponse,
        server_url: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            server_url: server_url.to_string(),
            access_token: token.access_token.clone(),
            id_token: token.id_token.clone(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            authenticated_at: now,
            expires_at: token.expires_at(now),
        }
    }

    /// Returns `true` once `expires_at` has passed. Sessions without an
    /// expiry never expire locally.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("server_url", &self.server_url)
            .field("access_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("authenticated_at", &self.authenticated_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Credentials held by a [`SessionStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    /// Access token
    pub access_token: String,
    /// Server the token is valid for
    pub server_url: String,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &"<redacted>")
            .field("server_url", &self.server_url)
            .finish()
    }
}

/// Holds the credentials of the current session for the rest of the app.
///
/// `set_credentials` replaces any previous credentials as a whole.
pub trait SessionStore: Send + Sync {
    /// Replaces the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::Session`] if the backing store fails.
    fn set_credentials(&self, access_token: &str, server_url: &str) -> Result<()>;

    /// Removes the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::Session`] if the backing store fails.
    fn clear(&self) -> Result<()>;

    /// Returns the stored credentials, if any.
    fn credentials(&self) -> Option<StoredCredentials>;

    /// Returns `true` when credentials with a non-empty token are stored.
    fn is_authenticated(&self) -> bool {
        self.credentials()
            .is_some_and(|c| !c.access_token.is_empty())
    }
}

/// Process-local [`SessionStore`] with no persistence.
///
/// # Examples
///
/// ```
/// use opencloud_auth::auth::session::{InMemorySessionStore, SessionStore};
///
/// let store = InMemorySessionStore::new();
/// store.set_credentials("tok1", "https://cloud.example.com").unwrap();
/// assert!(store.is_authenticated());
///
/// store.clear().unwrap();
/// assert!(!store.is_authenticated());
/// ```
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Option<StoredCredentials>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn set_credentials(&self, access_token: &str, server_url: &str) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OpenCloudError::Session("session store lock poisoned".to_string()))?;
        *guard = Some(StoredCredentials {
            access_token: access_token.to_string(),
            server_url: server_url.to_string(),
        });
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OpenCloudError::Session("session store lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }

    fn credentials(&self) -> Option<StoredCredentials> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }
}
