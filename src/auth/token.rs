//! Authorization code exchange
//!
//! POSTs the authorization code to the provider's token endpoint and
//! parses the token response. Committing the resulting session is the
//! job of [`AuthSessionManager`](super::manager::AuthSessionManager).

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer};

use crate::error::{OpenCloudError, Result};
use crate::http::{HttpTransport, RequestBody, RequestOptions, FORM_CONTENT_TYPE};

const LOG_PREFIX: &str = "Token";

/// Token endpoint response.
///
/// Only `access_token` is required. The optional fields are read
/// leniently: a value of an unexpected type becomes `None` instead of
/// failing the whole response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token issued by the provider.
    pub access_token: String,

    /// Token type, typically `Bearer`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds. Accepts a number or a numeric
    /// string.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,

    /// Refresh token. Kept but not used.
    #[serde(default, deserialize_with = "lenient_string")]
    pub refresh_token: Option<String>,

    /// ID token, retained as the `id_token_hint` for logout.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id_token: Option<String>,

    /// Granted scopes.
    #[serde(default, deserialize_with = "lenient_string")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry computed from `expires_in` relative to `issued_at`.
    ///
    /// A lifetime too large to represent is treated as no expiry.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        let lifetime = chrono::Duration::try_seconds(secs)?;
        issued_at.checked_add_signed(lifetime)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(value)) => Some(value),
        _ => None,
    })
}

fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Exchanges an authorization code for tokens.
///
/// Sends `grant_type=authorization_code`, `code`, `client_id` and
/// `redirect_uri` as a URL-encoded form.
///
/// # Arguments
///
/// * `http` - Shared transport
/// * `token_endpoint` - The provider's token endpoint
/// * `client_id` - Registered client id
/// * `redirect_uri` - Redirect URI used in the authorization request
/// * `code` - Authorization code from the callback
///
/// # Errors
///
/// Returns [`OpenCloudError::TokenExchange`] on a non-success status (the
/// body is captured for diagnostics), [`OpenCloudError::Http`] on
/// transport failure and [`OpenCloudError::InvalidTokenResponse`] when a
/// success body lacks an `access_token`.
pub async fn exchange_code(
    http: &HttpTransport,
    token_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenResponse> {
    let body = RequestBody::form([
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
    ]);

    let response = http
        .perform_request(
            Method::POST,
            token_endpoint,
            RequestOptions::new(LOG_PREFIX)
                .content_type(FORM_CONTENT_TYPE)
                .body(body),
        )
        .await?;

    if !response.is_success() {
        let status = response.status.as_u16();
        let status_text = response.status_text();
        let body = response.text();
        tracing::error!(
            "[{}:{}] Token exchange failed: {} {}: {}",
            LOG_PREFIX,
            response.request_id,
            status,
            status_text,
            body
        );
        return Err(OpenCloudError::TokenExchange {
            status,
            status_text,
            body,
            request_id: response.request_id,
        }
        .into());
    }

    let token: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|e| OpenCloudError::InvalidTokenResponse(e.to_string()))?;

    if token.access_token.is_empty() {
        return Err(
            OpenCloudError::InvalidTokenResponse("access_token is empty".to_string()).into(),
        );
    }

    tracing::info!(
        "[{}:{}] Token exchange succeeded (id_token: {})",
        LOG_PREFIX,
        response.request_id,
        token.id_token.is_some()
    );

    Ok(token)
}
