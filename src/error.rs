//! Error types for OpenCloud Auth
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling. Fallible functions
//! return [`Result`], an `anyhow` alias; callers that need to branch on a
//! specific failure downcast to [`OpenCloudError`].

use thiserror::Error;

/// Main error type for OpenCloud Auth operations
///
/// Recoverable conditions (the WebFinger issuer fallback and IdP logout
/// network failures) are deliberately absent: they are reported through
/// logs and return values, never as errors.
#[derive(Error, Debug)]
pub enum OpenCloudError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server reference could not be turned into a usable URL
    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    /// WebFinger endpoint answered with a non-success status
    #[error("WebFinger discovery failed: {status} {status_text}")]
    WebFinger {
        /// HTTP status code returned by the server
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
    },

    /// OpenID configuration endpoint answered with a non-success status
    #[error("Failed to fetch OIDC configuration: {status} {status_text}")]
    Discovery {
        /// HTTP status code returned by the issuer
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
    },

    /// OpenID configuration could not be retrieved or parsed
    #[error("Failed to discover OIDC configuration: {0}")]
    DiscoveryFailed(String),

    /// An operation that needs discovered provider configuration ran first
    #[error("Auth service not initialized")]
    NotInitialized,

    /// Token endpoint answered with a non-success status
    #[error("Token exchange failed: {status} {status_text}")]
    TokenExchange {
        /// HTTP status code returned by the token endpoint
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
        /// Raw response body, kept for diagnostics only
        body: String,
        /// Correlation id sent with the failed request
        request_id: String,
    },

    /// Token endpoint answered 2xx with an unusable body
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// The authorization redirect did not carry a usable code
    #[error("Authorization callback error: {0}")]
    Callback(String),

    /// Session store failures
    #[error("Session store error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for OpenCloud Auth operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
