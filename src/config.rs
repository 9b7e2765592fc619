//! Configuration management for OpenCloud Auth
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Client identity (client id, redirect URIs, scopes) is injected here and
//! never computed by the authentication core.

use crate::error::{OpenCloudError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for OpenCloud Auth
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OIDC client identity and login parameters
    #[serde(default)]
    pub auth: AuthConfig,
    /// HTTP transport and request logging settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Client platform, used to select the registered client identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// iOS client registration
    Ios,
    /// Android client registration
    #[default]
    Android,
}

impl Platform {
    /// Client id registered with the OpenCloud IdP for this platform
    pub fn default_client_id(self) -> &'static str {
        match self {
            Platform::Ios => "OpenCloudIOS",
            Platform::Android => "OpenCloudAndroid",
        }
    }

    /// Redirect URI registered with the OpenCloud IdP for this platform
    pub fn default_redirect_uri(self) -> &'static str {
        match self {
            Platform::Ios => "oc://ios.opencloud.eu",
            Platform::Android => "oc://android.opencloud.eu",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = OpenCloudError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(OpenCloudError::Config(format!(
                "Invalid platform: {}. Must be one of: ios, android",
                other
            ))),
        }
    }
}

/// OIDC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Platform whose registered client identity is used by default
    #[serde(default)]
    pub platform: Platform,

    /// Explicit client id; overrides the platform default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Explicit redirect URI; overrides the platform default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Where the IdP should send the browser after an IdP-side logout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,

    /// Space-separated scopes requested during login
    #[serde(default = "default_scopes")]
    pub default_scopes: String,

    /// Account name used to build the WebFinger `acct:` resource
    #[serde(default = "default_webfinger_account")]
    pub webfinger_account: String,
}

fn default_scopes() -> String {
    "openid profile email".to_string()
}

fn default_webfinger_account() -> String {
    "opencloud".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            client_id: None,
            redirect_uri: None,
            post_logout_redirect_uri: None,
            default_scopes: default_scopes(),
            webfinger_account: default_webfinger_account(),
        }
    }
}

impl AuthConfig {
    /// Effective client id: the explicit override or the platform default
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| self.platform.default_client_id().to_string())
    }

    /// Effective redirect URI: the explicit override or the platform default
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| self.platform.default_redirect_uri().to_string())
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Timeout applied to every HTTP request (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Upper bound on the IdP logout round trip (seconds)
    #[serde(default = "default_logout_timeout_seconds")]
    pub logout_timeout_seconds: u64,

    /// `User-Agent` header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request/response logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_logout_timeout_seconds() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!(
        "OpenCloudAuth/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            logout_timeout_seconds: default_logout_timeout_seconds(),
            user_agent: default_user_agent(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Per-request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// IdP logout timeout as a [`Duration`]
    pub fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_seconds)
    }
}

/// HTTP request/response logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log response headers and bodies in addition to the request summary
    #[serde(default)]
    pub enable_debug_logging: bool,

    /// Maximum number of body characters written to the log
    #[serde(default = "default_max_body_log_length")]
    pub max_body_log_length: usize,

    /// Log an equivalent `curl` command for every request
    #[serde(default)]
    pub generate_curl_commands: bool,
}

fn default_max_body_log_length() -> usize {
    1000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_debug_logging: false,
            max_body_log_length: default_max_body_log_length(),
            generate_curl_commands: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OpenCloudError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| OpenCloudError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(platform) = std::env::var("OPENCLOUD_PLATFORM") {
            match platform.parse() {
                Ok(value) => self.auth.platform = value,
                Err(_) => tracing::warn!("Invalid OPENCLOUD_PLATFORM: {}", platform),
            }
        }

        if let Ok(client_id) = std::env::var("OPENCLOUD_CLIENT_ID") {
            self.auth.client_id = Some(client_id);
        }

        if let Ok(redirect_uri) = std::env::var("OPENCLOUD_REDIRECT_URI") {
            self.auth.redirect_uri = Some(redirect_uri);
        }

        if let Ok(uri) = std::env::var("OPENCLOUD_POST_LOGOUT_REDIRECT_URI") {
            self.auth.post_logout_redirect_uri = Some(uri);
        }

        if let Ok(scopes) = std::env::var("OPENCLOUD_SCOPES") {
            self.auth.default_scopes = scopes;
        }

        if let Ok(timeout) = std::env::var("OPENCLOUD_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid OPENCLOUD_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(debug) = std::env::var("OPENCLOUD_DEBUG_HTTP") {
            self.api.logging.enable_debug_logging = parse_flag(&debug);
        }

        if let Ok(curl) = std::env::var("OPENCLOUD_CURL_COMMANDS") {
            self.api.logging.generate_curl_commands = parse_flag(&curl);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(platform) = cli.platform {
            self.auth.platform = platform;
        }
        if cli.verbose {
            self.api.logging.enable_debug_logging = true;
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::Config`] if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.auth.client_id().trim().is_empty() {
            return Err(OpenCloudError::Config("client_id cannot be empty".to_string()).into());
        }

        if self.auth.default_scopes.trim().is_empty() {
            return Err(
                OpenCloudError::Config("default_scopes cannot be empty".to_string()).into(),
            );
        }

        if self.auth.webfinger_account.trim().is_empty() {
            return Err(
                OpenCloudError::Config("webfinger_account cannot be empty".to_string()).into(),
            );
        }

        let redirect_uri = self.auth.redirect_uri();
        if url::Url::parse(&redirect_uri).is_err() {
            return Err(OpenCloudError::Config(format!(
                "redirect_uri is not a valid URI: {}",
                redirect_uri
            ))
            .into());
        }

        if let Some(ref uri) = self.auth.post_logout_redirect_uri {
            if url::Url::parse(uri).is_err() {
                return Err(OpenCloudError::Config(format!(
                    "post_logout_redirect_uri is not a valid URI: {}",
                    uri
                ))
                .into());
            }
        }

        if self.api.timeout_seconds == 0 {
            return Err(
                OpenCloudError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.api.logout_timeout_seconds == 0 {
            return Err(OpenCloudError::Config(
                "logout_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.api.logging.max_body_log_length == 0 {
            return Err(OpenCloudError::Config(
                "logging.max_body_log_length must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
