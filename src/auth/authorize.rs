//! Authorization request construction and callback parsing
//!
//! Builds the authorization-code redirect URL, generates the anti-CSRF
//! `state` value, and extracts the authorization code from the redirect the
//! browser delivers back to the client.

use base64::Engine as _;
use url::Url;

use crate::auth::discovery::OidcProviderConfig;
use crate::error::{OpenCloudError, Result};

/// An authorization URL together with the `state` it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// URL to open in the user's browser
    pub url: String,
    /// State value that the callback must echo back
    pub state: String,
}

/// Generates a random `state` value.
///
/// 16 bytes from the thread-local CSPRNG, encoded as base64url without
/// padding.
pub fn generate_state() -> String {
    use rand::RngCore as _;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Builds the authorization-code request URL.
///
/// Query parameters, in order: `client_id`, `redirect_uri`,
/// `response_type=code`, `scope`, and `state` when provided. Pure; the
/// caller must already hold a provider configuration.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use opencloud_auth::auth::authorize::build_authorization_url;
/// use opencloud_auth::auth::discovery::OidcProviderConfig;
///
/// let config = OidcProviderConfig {
///     issuer: "https://idp.example.com".to_string(),
///     authorization_endpoint: "https://idp.example.com/authorize".to_string(),
///     token_endpoint: "https://idp.example.com/token".to_string(),
///     end_session_endpoint: None,
///     userinfo_endpoint: None,
///     jwks_uri: None,
///     response_types_supported: None,
///     grant_types_supported: None,
///     scopes_supported: None,
///     subject_types_supported: None,
///     id_token_signing_alg_values_supported: None,
///     extra: HashMap::new(),
/// };
///
/// let url = build_authorization_url(&config, "OpenCloudAndroid", "oc://android.opencloud.eu", "openid", None);
/// assert!(url.starts_with("https://idp.example.com/authorize?client_id=OpenCloudAndroid"));
/// assert!(url.contains("response_type=code"));
/// ```
pub fn build_authorization_url(
    config: &OidcProviderConfig,
    client_id: &str,
    redirect_uri: &str,
    scopes: &str,
    state: Option<&str>,
) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("client_id", client_id);
    query.append_pair("redirect_uri", redirect_uri);
    query.append_pair("response_type", "code");
    query.append_pair("scope", scopes);
    if let Some(state) = state {
        query.append_pair("state", state);
    }

    let endpoint = config.authorization_endpoint.as_str();
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}{}", endpoint, separator, query.finish())
}

/// Extracts the authorization code from a redirect callback URL.
///
/// This is the only place a code is read out of a callback: the URL is
/// parsed, its query parameters are read, and any of an `error` parameter,
/// a `state` mismatch, or a missing `code` is a single
/// [`OpenCloudError::Callback`].
///
/// # Arguments
///
/// * `callback_url` - Full redirect URL, e.g. `oc://android.opencloud.eu?code=...&state=...`
/// * `expected_state` - State sent with the authorization request, if any
///
/// # Errors
///
/// Returns [`OpenCloudError::Callback`] as described above.
pub fn parse_callback(callback_url: &str, expected_state: Option<&str>) -> Result<String> {
    let url = Url::parse(callback_url.trim())
        .map_err(|e| OpenCloudError::Callback(format!("invalid callback URL: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let message = match error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(OpenCloudError::Callback(format!("authorization denied ({message})")).into());
    }

    if let Some(expected) = expected_state {
        if state.as_deref() != Some(expected) {
            return Err(
                OpenCloudError::Callback("state mismatch in authorization callback".to_string())
                    .into(),
            );
        }
    }

    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        OpenCloudError::Callback("authorization code missing from callback".to_string()).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with_endpoint(endpoint: &str) -> OidcProviderConfig {
        OidcProviderConfig {
            issuer: "https://example.com/auth".to_string(),
            authorization_endpoint: endpoint.to_string(),
            token_endpoint: "https://example.com/auth/token".to_string(),
            end_session_endpoint: None,
            userinfo_endpoint: None,
            jwks_uri: None,
            response_types_supported: None,
            grant_types_supported: None,
            scopes_supported: None,
            subject_types_supported: None,
            id_token_signing_alg_values_supported: None,
            extra: HashMap::new(),
        }
    }

    fn query_map(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_generate_state_is_random_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 22);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_build_authorization_url_required_parameters() {
        let config = config_with_endpoint("https://example.com/auth/authorize");
        let url = build_authorization_url(
            &config,
            "test-client",
            "oc://callback/path",
            "openid profile email",
            None,
        );

        assert!(url.starts_with("https://example.com/auth/authorize?"));
        assert!(url.contains("redirect_uri=oc%3A%2F%2Fcallback%2Fpath"));
        let params = query_map(&url);
        assert_eq!(params["client_id"], "test-client");
        assert_eq!(params["redirect_uri"], "oc://callback/path");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid profile email");
        assert!(!params.contains_key("state"));
    }

    #[test]
    fn test_build_authorization_url_includes_state_when_provided() {
        let config = config_with_endpoint("https://example.com/auth/authorize");
        let url = build_authorization_url(&config, "c", "oc://cb", "openid", Some("xyz"));
        assert_eq!(query_map(&url)["state"], "xyz");
        assert!(url.ends_with("&state=xyz"));
    }

    #[test]
    fn test_build_authorization_url_appends_to_existing_query() {
        let config = config_with_endpoint("https://example.com/authorize?tenant=a");
        let url = build_authorization_url(&config, "c", "oc://cb", "openid", None);
        assert!(url.starts_with("https://example.com/authorize?tenant=a&client_id=c"));
    }

    #[test]
    fn test_parse_callback_extracts_code() {
        let code =
            parse_callback("oc://android.opencloud.eu?code=abc123&state=s1", Some("s1")).unwrap();
        assert_eq!(code, "abc123");
    }

    #[test]
    fn test_parse_callback_decodes_values() {
        let code = parse_callback("oc://cb/path?code=a%2Fb+c", None).unwrap();
        assert_eq!(code, "a/b c");
    }

    #[test]
    fn test_parse_callback_state_mismatch() {
        let err = parse_callback("oc://cb?code=abc&state=other", Some("expected")).unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
    }

    #[test]
    fn test_parse_callback_missing_state_when_expected() {
        assert!(parse_callback("oc://cb?code=abc", Some("expected")).is_err());
    }

    #[test]
    fn test_parse_callback_missing_code() {
        let err = parse_callback("oc://cb?state=s1", Some("s1")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OpenCloudError>(),
            Some(OpenCloudError::Callback(_))
        ));
    }

    #[test]
    fn test_parse_callback_error_parameter() {
        let err = parse_callback(
            "oc://cb?error=access_denied&error_description=User+cancelled&state=s1",
            Some("s1"),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("access_denied"));
        assert!(message.contains("User cancelled"));
    }

    #[test]
    fn test_parse_callback_invalid_url() {
        assert!(parse_callback("code=abc", None).is_err());
    }
}
