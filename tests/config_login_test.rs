//! Configuration flowing into the login requests
//!
//! Loads a YAML file the way the binary does and checks that the client
//! identity, scopes and post-logout redirect reach the IdP.

mod common;

use std::sync::Arc;

use clap::Parser;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opencloud_auth::auth::session::InMemorySessionStore;
use opencloud_auth::cli::Cli;
use opencloud_auth::config::{Config, Platform};
use opencloud_auth::AuthSessionManager;

use common::{mount_discovery, temp_config_file};

const CONFIG_YAML: &str = r#"
auth:
  platform: ios
  default_scopes: "openid profile"
  post_logout_redirect_uri: "oc://ios.opencloud.eu/logged-out"
api:
  timeout_seconds: 10
  logout_timeout_seconds: 2
"#;

fn load(contents: &str) -> Config {
    let (_dir, config_path) = temp_config_file(contents);
    let cli = Cli::try_parse_from(["opencloud-auth", "discover", "example.com"]).unwrap();
    let config = Config::load(config_path.to_str().unwrap(), &cli).unwrap();
    config.validate().unwrap();
    config
}

#[test]
fn test_yaml_selects_platform_identity() {
    let config = load(CONFIG_YAML);
    assert_eq!(config.auth.platform, Platform::Ios);
    assert_eq!(config.auth.client_id(), "OpenCloudIOS");
    assert_eq!(config.auth.redirect_uri(), "oc://ios.opencloud.eu");
    assert_eq!(config.api.timeout_seconds, 10);
}

#[tokio::test]
async fn test_configured_identity_reaches_idp() {
    let server = MockServer::start().await;
    mount_discovery(&server, true).await;
    Mock::given(method("POST"))
        .and(path("/idp/token"))
        .and(body_string_contains("client_id=OpenCloudIOS"))
        .and(body_string_contains("redirect_uri=oc%3A%2F%2Fios.opencloud.eu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok1",
            "id_token": "idt"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/idp/logout"))
        .and(query_param("client_id", "OpenCloudIOS"))
        .and(query_param(
            "post_logout_redirect_uri",
            "oc://ios.opencloud.eu/logged-out",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager =
        AuthSessionManager::new(load(CONFIG_YAML), Arc::new(InMemorySessionStore::new()))
            .unwrap();
    manager.initialize(&server.uri()).await.unwrap();

    let request = manager.get_authorization_url().unwrap();
    assert!(request.url.contains("client_id=OpenCloudIOS"));
    assert!(request.url.contains("scope=openid+profile"));

    manager.exchange_code_for_tokens("abc").await.unwrap();
    let outcome = manager.logout(true).await;
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.redirect_url, None);
}
