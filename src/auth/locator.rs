//! Server address normalization
//!
//! Turns whatever the user typed into the server field into a well-formed
//! base URL and flags plain-HTTP servers.

use url::Url;

use crate::error::{OpenCloudError, Result};

/// A normalized server address for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReference {
    /// The input exactly as the user entered it
    pub raw_input: String,
    /// Base URL with a scheme and without a trailing slash
    pub normalized_url: String,
    /// `true` when the user explicitly asked for `http://`
    pub is_insecure: bool,
}

impl ServerReference {
    /// Returns the hostname of the normalized URL.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::InvalidServerUrl`] if the normalized URL
    /// does not parse or has no host.
    pub fn host(&self) -> Result<String> {
        let url = Url::parse(&self.normalized_url)
            .map_err(|e| OpenCloudError::InvalidServerUrl(format!("{}: {}", self.normalized_url, e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| {
                OpenCloudError::InvalidServerUrl(format!("{} has no host", self.normalized_url))
                    .into()
            })
    }

    /// Builds the WebFinger resource `acct:{account}@{host}`.
    ///
    /// # Errors
    ///
    /// Same as [`ServerReference::host`].
    pub fn webfinger_resource(&self, account: &str) -> Result<String> {
        Ok(format!("acct:{}@{}", account, self.host()?))
    }
}

/// Normalizes user input into a [`ServerReference`].
///
/// Trims whitespace, keeps an explicit `http://` (marking the reference
/// insecure), prepends `https://` when no scheme is given, and strips one
/// trailing `/`. Never fails and is idempotent on its own output.
///
/// # Examples
///
/// ```
/// use opencloud_auth::auth::locator::normalize;
///
/// let server = normalize("  cloud.example.com/ ");
/// assert_eq!(server.normalized_url, "https://cloud.example.com");
/// assert!(!server.is_insecure);
///
/// let insecure = normalize("http://localhost:9200");
/// assert!(insecure.is_insecure);
/// ```
pub fn normalize(input: &str) -> ServerReference {
    let trimmed = input.trim();
    let mut is_insecure = false;

    let mut url = if trimmed.starts_with("http://") {
        is_insecure = true;
        trimmed.to_string()
    } else if trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    if url.ends_with('/') {
        url.pop();
    }

    ServerReference {
        raw_input: input.to_string(),
        normalized_url: url,
        is_insecure,
    }
}
