//! WebFinger issuer discovery integration tests using wiremock
//!
//! Verifies that `discover_issuer` returns the advertised issuer and falls
//! back to the server URL on every kind of failure without raising.

mod common;

use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opencloud_auth::auth::webfinger::{discover_issuer, webfinger};
use opencloud_auth::error::OpenCloudError;

use common::{mock_resource, transport, unreachable_url, webfinger_body};

#[tokio::test]
async fn test_discover_issuer_returns_advertised_issuer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .and(query_param("resource", mock_resource()))
        .and(header_exists("X-Request-ID"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(webfinger_body("https://idp.example.com")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let issuer = discover_issuer(&transport(), &server.uri(), mock_resource()).await;
    assert_eq!(issuer, "https://idp.example.com");
}

#[tokio::test]
async fn test_discover_issuer_falls_back_without_matching_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "subject": mock_resource(),
            "links": [{"rel": "self", "href": "https://elsewhere.example.com"}]
        })))
        .mount(&server)
        .await;

    let issuer = discover_issuer(&transport(), &server.uri(), mock_resource()).await;
    assert_eq!(issuer, server.uri());
}

#[tokio::test]
async fn test_discover_issuer_falls_back_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let issuer = discover_issuer(&transport(), &server.uri(), mock_resource()).await;
    assert_eq!(issuer, server.uri());
}

#[tokio::test]
async fn test_discover_issuer_falls_back_on_invalid_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let issuer = discover_issuer(&transport(), &server.uri(), mock_resource()).await;
    assert_eq!(issuer, server.uri());
}

#[tokio::test]
async fn test_discover_issuer_falls_back_on_network_failure() {
    let server_url = unreachable_url();
    let issuer = discover_issuer(&transport(), &server_url, mock_resource()).await;
    assert_eq!(issuer, server_url);
}

#[tokio::test]
async fn test_webfinger_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/webfinger"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = webfinger(&transport(), &server.uri(), mock_resource())
        .await
        .unwrap_err();
    match err.downcast_ref::<OpenCloudError>() {
        Some(OpenCloudError::WebFinger {
            status,
            status_text,
        }) => {
            assert_eq!(*status, 503);
            assert_eq!(status_text, "Service Unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
