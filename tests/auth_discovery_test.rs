//! OIDC configuration discovery integration tests using wiremock
//!
//! Verifies `fetch_configuration` error reporting and that
//! `discover_configuration` runs WebFinger before the configuration fetch,
//! including the server-as-issuer fallback.

mod common;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opencloud_auth::auth::discovery::{discover_configuration, fetch_configuration};
use opencloud_auth::error::OpenCloudError;

use common::{mock_resource, mount_discovery, provider_body, transport, unreachable_url};

#[tokio::test]
async fn test_fetch_configuration_parses_document() {
    let server = MockServer::start().await;
    let issuer = server.uri();
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_body(&issuer, true)))
        .mount(&server)
        .await;

    // A trailing slash on the issuer is stripped before appending the path.
    let config = fetch_configuration(&transport(), &format!("{}/", issuer))
        .await
        .unwrap();

    assert_eq!(config.issuer, issuer);
    assert_eq!(config.token_endpoint, format!("{}/token", issuer));
    assert_eq!(
        config.end_session_endpoint,
        Some(format!("{}/logout", issuer))
    );
    assert_eq!(
        config.grant_types_supported,
        Some(vec![
            "authorization_code".to_string(),
            "refresh_token".to_string()
        ])
    );
}

#[tokio::test]
async fn test_fetch_configuration_error_carries_status_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = fetch_configuration(&transport(), &server.uri())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Failed to fetch OIDC configuration: 500 Internal Server Error"
    );
    match err.downcast_ref::<OpenCloudError>() {
        Some(OpenCloudError::Discovery {
            status,
            status_text,
        }) => {
            assert_eq!(*status, 500);
            assert_eq!(status_text, "Internal Server Error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_configuration_network_failure() {
    let err = fetch_configuration(&transport(), &unreachable_url())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OpenCloudError>(),
        Some(OpenCloudError::DiscoveryFailed(_))
    ));
}

#[tokio::test]
async fn test_fetch_configuration_invalid_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"issuer": "x"})),
        )
        .mount(&server)
        .await;

    let err = fetch_configuration(&transport(), &server.uri())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OpenCloudError>(),
        Some(OpenCloudError::DiscoveryFailed(_))
    ));
}

#[tokio::test]
async fn test_discover_configuration_uses_webfinger_issuer_first() {
    let server = MockServer::start().await;
    let issuer = mount_discovery(&server, false).await;

    let config = discover_configuration(&transport(), &server.uri(), mock_resource())
        .await
        .unwrap();
    assert_eq!(config.issuer, issuer);
    assert!(config.end_session_endpoint.is_none());

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(
        paths,
        vec!["/.well-known/webfinger", "/idp/.well-known/openid-configuration"]
    );
}

#[tokio::test]
async fn test_discover_configuration_falls_back_to_server_as_issuer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_body(&server.uri(), false)))
        .expect(1)
        .mount(&server)
        .await;

    let config = discover_configuration(&transport(), &server.uri(), mock_resource())
        .await
        .unwrap();
    assert_eq!(config.issuer, server.uri());
}

#[tokio::test]
async fn test_discover_configuration_fallback_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = discover_configuration(&transport(), &server.uri(), mock_resource())
        .await
        .unwrap_err();
    match err.downcast_ref::<OpenCloudError>() {
        Some(OpenCloudError::Discovery {
            status,
            status_text,
        }) => {
            assert_eq!(*status, 404);
            assert_eq!(status_text, "Not Found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
