use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opencloud_auth::auth::session::InMemorySessionStore;
use opencloud_auth::config::{ApiConfig, Config};
use opencloud_auth::http::HttpTransport;
use opencloud_auth::AuthSessionManager;

#[allow(dead_code)]
pub fn transport() -> HttpTransport {
    HttpTransport::new(&ApiConfig::default()).expect("failed to build transport")
}

#[allow(dead_code)]
pub fn manager_with_store(store: Arc<InMemorySessionStore>) -> AuthSessionManager {
    AuthSessionManager::new(Config::default(), store).expect("failed to build manager")
}

/// WebFinger resource the manager derives for a mock server.
#[allow(dead_code)]
pub fn mock_resource() -> &'static str {
    "acct:opencloud@127.0.0.1"
}

/// Provider configuration whose endpoints live under `issuer`.
#[allow(dead_code)]
pub fn provider_body(issuer: &str, with_end_session: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{}/authorize", issuer),
        "token_endpoint": format!("{}/token", issuer),
        "userinfo_endpoint": format!("{}/userinfo", issuer),
        "jwks_uri": format!("{}/jwks", issuer),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"]
    });
    if with_end_session {
        body["end_session_endpoint"] = serde_json::Value::String(format!("{}/logout", issuer));
    }
    body
}

/// WebFinger descriptor pointing at `issuer`.
#[allow(dead_code)]
pub fn webfinger_body(issuer: &str) -> serde_json::Value {
    serde_json::json!({
        "subject": mock_resource(),
        "links": [
            {"rel": "http://openid.net/specs/connect/1.0/issuer", "href": issuer}
        ]
    })
}

/// Mounts WebFinger and provider configuration for an IdP at `{uri}/idp`.
///
/// Returns the issuer URL.
#[allow(dead_code)]
pub async fn mount_discovery(server: &MockServer, with_end_session: bool) -> String {
    let issuer = format!("{}/idp", server.uri());

    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .and(query_param("resource", mock_resource()))
        .respond_with(ResponseTemplate::new(200).set_body_json(webfinger_body(&issuer)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/idp/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(provider_body(&issuer, with_end_session)),
        )
        .mount(server)
        .await;

    issuer
}

/// A URL nothing listens on.
#[allow(dead_code)]
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let port = listener.local_addr().expect("no local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
