//! OpenID Connect Discovery
//!
//! Fetches the issuer's `/.well-known/openid-configuration` document and
//! composes it with WebFinger issuer discovery.
//!
//! # Discovery sequence
//!
//! 1. [`discover_issuer`] asks the server's WebFinger endpoint for the
//!    issuer, falling back to the server URL itself.
//! 2. [`fetch_configuration`] retrieves the provider configuration from
//!    that issuer. Failures here are not recovered.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::auth::webfinger::discover_issuer;
use crate::error::{OpenCloudError, Result};
use crate::http::{HttpTransport, RequestOptions};

const LOG_PREFIX: &str = "OIDC";

/// OpenID provider configuration document.
///
/// Only the issuer and the authorization and token endpoints are required;
/// everything else is tolerated when absent and checked by consumers.
///
/// # Examples
///
/// ```
/// use opencloud_auth::auth::discovery::OidcProviderConfig;
///
/// let json = r#"{
///     "issuer": "https://idp.example.com",
///     "authorization_endpoint": "https://idp.example.com/authorize",
///     "token_endpoint": "https://idp.example.com/token"
/// }"#;
///
/// let config: OidcProviderConfig = serde_json::from_str(json).unwrap();
/// assert!(config.end_session_endpoint.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OidcProviderConfig {
    /// The issuer identifier URI.
    pub issuer: String,

    /// The URL of the authorization endpoint.
    pub authorization_endpoint: String,

    /// The URL of the token endpoint.
    pub token_endpoint: String,

    /// RP-initiated logout endpoint, if the provider supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// The URL of the userinfo endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// The URL of the provider's JSON Web Key Set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Supported `response_type` values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    /// Supported `grant_type` values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    /// Supported scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Supported subject identifier types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_types_supported: Option<Vec<String>>,

    /// Supported ID token signing algorithms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,

    /// Additional provider metadata not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Builds `{issuer}/.well-known/openid-configuration`, stripping one
/// trailing `/` from the issuer first.
pub fn configuration_url(issuer_url: &str) -> String {
    let base = issuer_url.strip_suffix('/').unwrap_or(issuer_url);
    format!("{}/.well-known/openid-configuration", base)
}

/// Fetches the provider configuration from an issuer.
///
/// # Arguments
///
/// * `http` - Shared transport
/// * `issuer_url` - Issuer identifier URL
///
/// # Errors
///
/// Returns [`OpenCloudError::Discovery`] carrying the status and reason
/// phrase on a non-success response, and
/// [`OpenCloudError::DiscoveryFailed`] if the request cannot be made or
/// the document does not parse.
pub async fn fetch_configuration(
    http: &HttpTransport,
    issuer_url: &str,
) -> Result<OidcProviderConfig> {
    let url = configuration_url(issuer_url);

    let response = http
        .perform_request(Method::GET, &url, RequestOptions::new(LOG_PREFIX))
        .await
        .map_err(|e| OpenCloudError::DiscoveryFailed(format!("{}: {}", url, e)))?;

    if !response.is_success() {
        let status = response.status.as_u16();
        let status_text = response.status_text();
        tracing::error!(
            "OpenID Connect configuration request to {} failed: {} {}",
            url,
            status,
            status_text
        );
        return Err(OpenCloudError::Discovery {
            status,
            status_text,
        }
        .into());
    }

    let config: OidcProviderConfig = serde_json::from_slice(&response.body).map_err(|e| {
        OpenCloudError::DiscoveryFailed(format!("invalid configuration document at {}: {}", url, e))
    })?;

    tracing::debug!(
        "Loaded OIDC configuration for issuer {} (end_session_endpoint: {})",
        config.issuer,
        config.end_session_endpoint.is_some()
    );

    Ok(config)
}

/// Runs WebFinger issuer discovery, then fetches the configuration.
///
/// When WebFinger yields no issuer the server URL is used as issuer and
/// the configuration fetch is still attempted against it; a failure of
/// that fetch propagates.
///
/// # Errors
///
/// See [`fetch_configuration`].
///
/// # Examples
///
/// ```no_run
/// use opencloud_auth::auth::discovery::discover_configuration;
/// use opencloud_auth::config::ApiConfig;
/// use opencloud_auth::http::HttpTransport;
///
/// # async fn example() -> opencloud_auth::error::Result<()> {
/// let http = HttpTransport::new(&ApiConfig::default())?;
/// let config = discover_configuration(
///     &http,
///     "https://cloud.example.com",
///     "acct:opencloud@cloud.example.com",
/// )
/// .await?;
/// println!("token endpoint: {}", config.token_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn discover_configuration(
    http: &HttpTransport,
    server_url: &str,
    resource: &str,
) -> Result<OidcProviderConfig> {
    let issuer = discover_issuer(http, server_url, resource).await;
    fetch_configuration(http, &issuer).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_url() {
        assert_eq!(
            configuration_url("https://idp.example.com"),
            "https://idp.example.com/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_configuration_url_strips_one_trailing_slash() {
        assert_eq!(
            configuration_url("https://idp.example.com/realms/oc/"),
            "https://idp.example.com/realms/oc/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_provider_config_deserializes() {
        let json = r#"{
            "issuer": "https://example.com/auth",
            "authorization_endpoint": "https://example.com/auth/authorize",
            "token_endpoint": "https://example.com/auth/token",
            "end_session_endpoint": "https://example.com/auth/logout",
            "userinfo_endpoint": "https://example.com/auth/userinfo",
            "jwks_uri": "https://example.com/auth/jwks",
            "response_types_supported": ["code"],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": ["RS256"]
        }"#;

        let config: OidcProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.issuer, "https://example.com/auth");
        assert_eq!(
            config.end_session_endpoint.as_deref(),
            Some("https://example.com/auth/logout")
        );
        assert_eq!(config.jwks_uri.as_deref(), Some("https://example.com/auth/jwks"));
        assert_eq!(
            config.response_types_supported,
            Some(vec!["code".to_string()])
        );
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_provider_config_captures_extra_fields() {
        let json = r#"{
            "issuer": "https://example.com",
            "authorization_endpoint": "https://example.com/authorize",
            "token_endpoint": "https://example.com/token",
            "check_session_iframe": "https://example.com/session"
        }"#;

        let config: OidcProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.extra["check_session_iframe"],
            serde_json::Value::String("https://example.com/session".to_string())
        );
    }

    #[test]
    fn test_provider_config_requires_token_endpoint() {
        let json = r#"{
            "issuer": "https://example.com",
            "authorization_endpoint": "https://example.com/authorize"
        }"#;
        assert!(serde_json::from_str::<OidcProviderConfig>(json).is_err());
    }
}
