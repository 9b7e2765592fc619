//! IdP-side logout (OpenID Connect RP-Initiated Logout)
//!
//! Builds the `end_session_endpoint` URL and calls it without following
//! redirects, so a confirmation page the IdP redirects to can be handed
//! back to the caller. Nothing here ever fails: every outcome is a
//! [`LogoutOutcome`].
//!
//! Clearing local state is the manager's job and always happens before
//! [`end_session`] is called.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::{OpenCloudError, Result};
use crate::http::{HttpTransport, RequestOptions};

const LOG_PREFIX: &str = "Logout";

/// `Accept` header sent to the logout endpoint, which answers with HTML.
pub const LOGOUT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Result of a logout.
///
/// `status` is `0` when the IdP was not contacted or could not be reached.
/// `redirect_url` is set when the caller may want to open a page in an
/// external browser: the `Location` of a redirect, or the logout URL
/// itself after a transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogoutOutcome {
    /// Page the caller can optionally show the user
    pub redirect_url: Option<String>,
    /// HTTP status of the IdP response, `0` if there was none
    pub status: u16,
}

impl LogoutOutcome {
    /// Outcome for a logout that never contacted the IdP.
    pub fn local_only() -> Self {
        Self::default()
    }
}

/// Builds the end-session URL.
///
/// Query parameters, in order: `client_id`, then `id_token_hint` and
/// `post_logout_redirect_uri` when provided.
///
/// # Errors
///
/// Returns [`OpenCloudError::InvalidServerUrl`] if `endpoint` is not an
/// absolute URL.
pub fn build_end_session_url(
    endpoint: &str,
    client_id: &str,
    id_token_hint: Option<&str>,
    post_logout_redirect_uri: Option<&str>,
) -> Result<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| OpenCloudError::InvalidServerUrl(format!("{}: {}", endpoint, e)))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        if let Some(hint) = id_token_hint {
            query.append_pair("id_token_hint", hint);
        }
        if let Some(redirect) = post_logout_redirect_uri {
            query.append_pair("post_logout_redirect_uri", redirect);
        }
    }

    Ok(url)
}

/// Maps the IdP's response to a [`LogoutOutcome`].
///
/// A relative `Location` is resolved against `logout_url`.
pub fn interpret_response(
    logout_url: &Url,
    status: StatusCode,
    location: Option<&str>,
) -> LogoutOutcome {
    let code = status.as_u16();

    if status.is_redirection() {
        let redirect_url = location.and_then(|loc| match logout_url.join(loc) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                tracing::warn!("Ignoring unusable logout redirect {:?}: {}", loc, e);
                None
            }
        });
        if redirect_url.is_none() {
            tracing::warn!("IdP logout returned {} without a usable Location header", code);
        }
        return LogoutOutcome {
            redirect_url,
            status: code,
        };
    }

    if status.is_success() {
        tracing::info!("IdP logout completed with status {}", code);
    } else {
        tracing::warn!(
            "IdP logout failed: {} {}",
            code,
            status.canonical_reason().unwrap_or_default()
        );
    }

    LogoutOutcome {
        redirect_url: None,
        status: code,
    }
}

/// Calls the IdP logout URL and interprets the answer.
///
/// Redirects are not followed and cookies are sent. The whole round trip
/// is bounded by `timeout`; a transport failure or timeout returns the
/// logout URL itself with status `0` so the caller can retry it in a
/// browser.
pub async fn end_session(http: &HttpTransport, logout_url: &Url, timeout: Duration) -> LogoutOutcome {
    let request = http.perform_request(
        Method::GET,
        logout_url.as_str(),
        RequestOptions::new(LOG_PREFIX).header("Accept", LOGOUT_ACCEPT),
    );

    let failure = match tokio::time::timeout(timeout, request).await {
        Ok(Ok(response)) => {
            return interpret_response(logout_url, response.status, response.location());
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}ms", timeout.as_millis()),
    };

    tracing::warn!(
        "IdP logout request failed ({}); local session already cleared",
        failure
    );
    LogoutOutcome {
        redirect_url: Some(logout_url.to_string()),
        status: 0,
    }
}
