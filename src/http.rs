//! Shared HTTP transport with request correlation and structured logging
//!
//! Every request made by the authentication core goes through
//! [`HttpTransport::perform_request`]. The transport:
//!
//! - generates a fresh UUID v4 correlation id per request and sends it as
//!   `X-Request-ID`
//! - attaches the standard headers (`Accept`, `Content-Type`, `User-Agent`,
//!   optional bearer `Authorization`), which callers may override
//! - never follows redirects, so `3xx` responses and their `Location`
//!   header reach the caller untouched
//! - keeps a cookie store so IdP session cookies are sent on logout
//! - logs the request (with `Authorization` redacted), the response status
//!   and timing, and, when debug logging is enabled, response headers and a
//!   truncated body
//!
//! Responses are fully buffered into an [`HttpResponse`].

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{ApiConfig, LoggingConfig};
use crate::error::{OpenCloudError, Result};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// `Accept` value sent unless the caller overrides it.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// `Content-Type` used when the caller neither sets one nor sends a body
/// that implies one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// `Content-Type` of URL-encoded form bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const REDACTED_CREDENTIALS: &str = "[REDACTED_FOR_SECURITY]";

/// Generates a UUID v4 correlation id.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Request description
// ---------------------------------------------------------------------------

/// Body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Serialized as JSON
    Json(serde_json::Value),
    /// Serialized as `application/x-www-form-urlencoded`, keeping pair order
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Builds a form body from borrowed key/value pairs.
    pub fn form<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn implied_content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => DEFAULT_CONTENT_TYPE,
            RequestBody::Form(_) => FORM_CONTENT_TYPE,
        }
    }

    fn encode(&self) -> Result<String> {
        match self {
            RequestBody::Json(value) => Ok(serde_json::to_string(value)?),
            RequestBody::Form(pairs) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in pairs {
                    serializer.append_pair(key, value);
                }
                Ok(serializer.finish())
            }
        }
    }
}

/// Per-request options for [`HttpTransport::perform_request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Log prefix identifying the caller (e.g. `WebFinger`, `OIDC`)
    pub prefix: String,
    /// Headers merged over the standard headers (case-insensitive)
    pub headers: Vec<(String, String)>,
    /// Bearer token for the `Authorization` header
    pub token: Option<String>,
    /// Request body
    pub body: Option<RequestBody>,
    /// Explicit `Content-Type`; otherwise implied by the body
    pub content_type: Option<String>,
}

impl RequestOptions {
    /// Creates options with the given log prefix and nothing else set.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            headers: Vec::new(),
            token: None,
            body: None,
            content_type: None,
        }
    }

    /// Adds (or overrides) a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a bearer token.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets an explicit `Content-Type`.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status
    pub status: StatusCode,
    /// Response headers, including `Location` on redirects
    pub headers: HeaderMap,
    /// Raw response body
    pub body: Bytes,
    /// Correlation id that was sent with the request
    pub request_id: String,
    /// Time from send to headers received
    pub duration: Duration,
}

impl HttpResponse {
    /// Returns `true` for `2xx` statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Canonical reason phrase for the status, or an empty string.
    pub fn status_text(&self) -> String {
        self.status.canonical_reason().unwrap_or_default().to_string()
    }

    /// Returns a header value if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::Serialization`] if the body is not valid
    /// JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| OpenCloudError::Serialization(e).into())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// HTTP client shared by every component of the authentication core.
///
/// # Examples
///
/// ```no_run
/// use opencloud_auth::config::ApiConfig;
/// use opencloud_auth::http::{HttpTransport, RequestOptions};
///
/// # async fn example() -> opencloud_auth::error::Result<()> {
/// let http = HttpTransport::new(&ApiConfig::default())?;
/// let response = http
///     .perform_request(
///         reqwest::Method::GET,
///         "https://cloud.example.com/.well-known/openid-configuration",
///         RequestOptions::new("OIDC"),
///     )
///     .await?;
/// println!("{} ({})", response.status, response.request_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
    logging: LoggingConfig,
}

impl HttpTransport {
    /// Builds the transport from API configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::Http`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .timeout(config.timeout())
            .build()
            .map_err(OpenCloudError::Http)?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            logging: config.logging.clone(),
        })
    }

    /// Performs a request with standard headers and logging.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `url` - Absolute request URL
    /// * `options` - Prefix, extra headers, token and body
    ///
    /// # Returns
    ///
    /// The buffered response for any status, including `3xx`, `4xx` and
    /// `5xx`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenCloudError::Http`] on transport failure (connection,
    /// TLS, timeout, invalid URL or header) and
    /// [`OpenCloudError::Serialization`] if a JSON body cannot be encoded.
    pub async fn perform_request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let request_id = generate_request_id();
        let prefix = options.prefix.as_str();

        let body = options.body.as_ref().map(RequestBody::encode).transpose()?;
        let content_type = options
            .content_type
            .as_deref()
            .or_else(|| options.body.as_ref().map(RequestBody::implied_content_type))
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let headers = merge_headers(
            standard_headers(
                &request_id,
                options.token.as_deref(),
                content_type,
                &self.user_agent,
            ),
            options.headers.clone(),
        );

        self.log_request(&request_id, prefix, url, &method, &headers, body.as_deref());

        if self.logging.generate_curl_commands {
            tracing::debug!(
                "[{}:{}] Equivalent curl command for debugging:\n{}",
                prefix,
                request_id,
                curl_command(&method, url, &headers, body.as_deref(), true)
            );
        }

        let mut builder = self.client.request(method, url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("[{}:{}] Request failed: {}", prefix, request_id, e);
                return Err(OpenCloudError::Http(e).into());
            }
        };
        let duration = started.elapsed();

        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            tracing::warn!("[{}:{}] Reading response body failed: {}", prefix, request_id, e);
            OpenCloudError::Http(e)
        })?;

        let response = HttpResponse {
            status,
            headers: response_headers,
            body,
            request_id,
            duration,
        };
        self.log_response(prefix, &response);

        Ok(response)
    }

    fn log_request(
        &self,
        request_id: &str,
        prefix: &str,
        url: &str,
        method: &Method,
        headers: &[(String, String)],
        body: Option<&str>,
    ) {
        tracing::debug!("[{}:{}] Request URL: {}", prefix, request_id, url);
        tracing::debug!("[{}:{}] Request method: {}", prefix, request_id, method);
        tracing::debug!(
            "[{}:{}] Request headers: {:?}",
            prefix,
            request_id,
            redact_headers(headers)
        );

        if let Some(body) = body {
            let max = self.logging.max_body_log_length;
            tracing::debug!(
                "[{}:{}] Request body (first {} chars): {}",
                prefix,
                request_id,
                max,
                truncate_for_log(body, max)
            );
        }
    }

    fn log_response(&self, prefix: &str, response: &HttpResponse) {
        let request_id = response.request_id.as_str();
        tracing::debug!(
            "[{}:{}] Response received in {}ms",
            prefix,
            request_id,
            response.duration.as_millis()
        );
        tracing::debug!(
            "[{}:{}] Response status: {} {}",
            prefix,
            request_id,
            response.status.as_u16(),
            response.status_text()
        );

        if let Some(returned) = response.header(REQUEST_ID_HEADER) {
            if returned == request_id {
                tracing::debug!("[{}:{}] Server returned matching X-Request-ID", prefix, request_id);
            } else {
                tracing::debug!(
                    "[{}:{}] Server returned different X-Request-ID: {}",
                    prefix,
                    request_id,
                    returned
                );
            }
        }

        if !self.logging.enable_debug_logging {
            return;
        }

        let header_pairs: Vec<(String, String)> = response
            .headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        tracing::debug!(
            "[{}:{}] Response headers: {:?}",
            prefix,
            request_id,
            redact_headers(&header_pairs)
        );

        let max = self.logging.max_body_log_length;
        let content_type = response.header("content-type").unwrap_or_default();
        if content_type.contains("application/json") {
            let rendered = serde_json::from_slice::<serde_json::Value>(&response.body)
                .ok()
                .and_then(|v| serde_json::to_string_pretty(&v).ok())
                .unwrap_or_else(|| response.text());
            tracing::debug!(
                "[{}:{}] Response body (JSON): {}",
                prefix,
                request_id,
                truncate_for_log(&rendered, max)
            );
        } else if content_type.contains("text/") {
            tracing::debug!(
                "[{}:{}] Response body (text, first {} chars): {}",
                prefix,
                request_id,
                max,
                truncate_for_log(&response.text(), max)
            );
        } else {
            tracing::debug!(
                "[{}:{}] Response body not logged (content-type: {})",
                prefix,
                request_id,
                content_type
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Header and logging helpers
// ---------------------------------------------------------------------------

/// Builds the headers sent with every request.
pub fn standard_headers(
    request_id: &str,
    token: Option<&str>,
    content_type: &str,
    user_agent: &str,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), DEFAULT_ACCEPT.to_string()),
        (REQUEST_ID_HEADER.to_string(), request_id.to_string()),
    ];

    if !content_type.is_empty() {
        headers.push(("Content-Type".to_string(), content_type.to_string()));
    }

    if let Some(token) = token {
        headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }

    if !user_agent.is_empty() {
        headers.push(("User-Agent".to_string(), user_agent.to_string()));
    }

    headers
}

/// Merges `extra` over `base`; names compare case-insensitively and keep
/// their original position when overridden.
pub fn merge_headers(
    mut base: Vec<(String, String)>,
    extra: Vec<(String, String)>,
) -> Vec<(String, String)> {
    for (name, value) in extra {
        match base.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.1 = value,
            None => base.push((name, value)),
        }
    }
    base
}

/// Replaces `Authorization` credentials with a placeholder, keeping the
/// scheme.
pub fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case("authorization") {
                let scheme = value.split_whitespace().next().unwrap_or("Bearer");
                (name.clone(), format!("{} {}", scheme, REDACTED_CREDENTIALS))
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Truncates `text` to at most `max` characters.
pub fn truncate_for_log(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}... ({} chars total)", &text[..idx], text.chars().count()),
        None => text.to_string(),
    }
}

/// Renders an equivalent `curl` command for a request.
///
/// With `redact_auth`, bearer tokens are replaced by a placeholder.
pub fn curl_command(
    method: &Method,
    url: &str,
    headers: &[(String, String)],
    body: Option<&str>,
    redact_auth: bool,
) -> String {
    let mut command = format!("curl -v \"{}\"", url);

    for (name, value) in headers {
        if redact_auth && name.eq_ignore_ascii_case("authorization") {
            command.push_str(&format!(" -H \"{}: Bearer YOUR_TOKEN_HERE\"", name));
        } else {
            command.push_str(&format!(" -H \"{}: {}\"", name, value));
        }
    }

    if *method != Method::GET {
        command.push_str(&format!(" -X {}", method));
    }

    if let Some(body) = body {
        command.push_str(&format!(" -d '{}'", body.replace('\'', "'\\''")));
    }

    command
}
