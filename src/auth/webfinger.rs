//! WebFinger issuer discovery (RFC 7033)
//!
//! OpenCloud servers advertise their OpenID Connect issuer through
//! WebFinger. [`discover_issuer`] asks the server for the
//! `http://openid.net/specs/connect/1.0/issuer` link of an `acct:` resource
//! and, when the lookup yields nothing usable, falls back to treating the
//! server itself as the issuer.

use std::collections::HashMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OpenCloudError, Result};
use crate::http::{HttpTransport, RequestOptions};

/// Link relation identifying an OpenID Connect issuer.
pub const OIDC_ISSUER_REL: &str = "http://openid.net/specs/connect/1.0/issuer";

const LOG_PREFIX: &str = "WebFinger";

/// A JSON Resource Descriptor returned by a WebFinger endpoint.
///
/// # Examples
///
/// ```
/// use opencloud_auth::auth::webfinger::{WebFingerResponse, OIDC_ISSUER_REL};
///
/// let json = r#"{
///     "subject": "acct:opencloud@cloud.example.com",
///     "links": [
///         {"rel": "http://openid.net/specs/connect/1.0/issuer", "href": "https://idp.example.com"}
///     ]
/// }"#;
///
/// let jrd: WebFingerResponse = serde_json::from_str(json).unwrap();
/// assert_eq!(jrd.issuer(), Some("https://idp.example.com"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebFingerResponse {
    /// The resource the descriptor is about.
    #[serde(default)]
    pub subject: String,

    /// Alternative identifiers for the subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,

    /// Subject properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, serde_json::Value>>,

    /// Links related to the subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<WebFingerLink>>,
}

/// One link of a [`WebFingerResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebFingerLink {
    /// Link relation type.
    pub rel: String,

    /// Target URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    /// Media type of the target.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Human-readable titles keyed by language tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titles: Option<HashMap<String, String>>,

    /// Link properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

impl WebFingerResponse {
    /// Returns the first link with the given relation.
    pub fn find_link(&self, rel: &str) -> Option<&WebFingerLink> {
        self.links.as_ref()?.iter().find(|link| link.rel == rel)
    }

    /// Returns the `href` of the first issuer link that carries one.
    pub fn issuer(&self) -> Option<&str> {
        self.links
            .as_ref()?
            .iter()
            .filter(|link| link.rel == OIDC_ISSUER_REL)
            .filter_map(|link| link.href.as_deref())
            .find(|href| !href.is_empty())
    }
}

/// Builds `{server_url}/.well-known/webfinger?resource={resource}`.
///
/// # Errors
///
/// Returns [`OpenCloudError::InvalidServerUrl`] if `server_url` is not an
/// absolute URL.
pub fn webfinger_url(server_url: &str, resource: &str) -> Result<Url> {
    let base = server_url.strip_suffix('/').unwrap_or(server_url);
    let mut url = Url::parse(&format!("{}/.well-known/webfinger", base))
        .map_err(|e| OpenCloudError::InvalidServerUrl(format!("{}: {}", server_url, e)))?;
    url.query_pairs_mut().append_pair("resource", resource);
    Ok(url)
}

/// Performs a WebFinger lookup.
///
/// # Arguments
///
/// * `http` - Shared transport
/// * `server_url` - Normalized server base URL
/// * `resource` - Resource to describe, e.g. `acct:opencloud@host`
///
/// # Errors
///
/// Returns [`OpenCloudError::WebFinger`] on a non-success status,
/// [`OpenCloudError::Http`] on transport failure and
/// [`OpenCloudError::Serialization`] if the body is not a descriptor.
pub async fn webfinger(
    http: &HttpTransport,
    server_url: &str,
    resource: &str,
) -> Result<WebFingerResponse> {
    let url = webfinger_url(server_url, resource)?;

    let response = http
        .perform_request(Method::GET, url.as_str(), RequestOptions::new(LOG_PREFIX))
        .await?;

    if !response.is_success() {
        return Err(OpenCloudError::WebFinger {
            status: response.status.as_u16(),
            status_text: response.status_text(),
        }
        .into());
    }

    response.json()
}

/// Resolves the OIDC issuer for a server, falling back to the server.
///
/// Never fails: any lookup failure, non-success status, unparseable body,
/// or missing issuer link yields `server_url` itself, logged at `warn`.
///
/// # Examples
///
/// ```no_run
/// use opencloud_auth::auth::webfinger::discover_issuer;
/// use opencloud_auth::config::ApiConfig;
/// use opencloud_auth::http::HttpTransport;
///
/// # async fn example() -> opencloud_auth::error::Result<()> {
/// let http = HttpTransport::new(&ApiConfig::default())?;
/// let issuer = discover_issuer(
///     &http,
///     "https://cloud.example.com",
///     "acct:opencloud@cloud.example.com",
/// )
/// .await;
/// println!("issuer: {issuer}");
/// # Ok(())
/// # }
/// ```
pub async fn discover_issuer(http: &HttpTransport, server_url: &str, resource: &str) -> String {
    match webfinger(http, server_url, resource).await {
        Ok(jrd) => match jrd.issuer() {
            Some(issuer) => {
                tracing::info!("Discovered OIDC issuer {} for {}", issuer, server_url);
                issuer.to_string()
            }
            None => {
                tracing::warn!(
                    "No OIDC issuer link in WebFinger response for {}; using server as issuer",
                    server_url
                );
                server_url.to_string()
            }
        },
        Err(e) => {
            tracing::warn!(
                "WebFinger discovery failed for {}: {}; using server as issuer",
                server_url,
                e
            );
            server_url.to_string()
        }
    }
}
