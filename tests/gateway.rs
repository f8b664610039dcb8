use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use job_finder::error::FetchError;
use job_finder::gateway::{
    extraction_rules_json, GatewaySettings, ScrapingBeeGateway, EXTRACTION_HEADER,
};
use job_finder::traits::FetchGateway;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "https://uk.indeed.com/viewjob?jk=abc";

fn gateway(server: &MockServer, timeout: Duration) -> ScrapingBeeGateway {
    let settings = GatewaySettings {
        api_url: format!("{}/api/v1/", server.uri()),
        timeout,
        retry_backoff: Duration::ZERO,
        ..GatewaySettings::new("test-key")
    };
    ScrapingBeeGateway::new(settings).expect("client builds")
}

#[tokio::test]
async fn returns_rendered_page_with_proxy_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("url", TARGET))
        .and(query_param("render_js", "true"))
        .and(query_param("premium_proxy", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway(&server, Duration::from_secs(5))
        .fetch(TARGET, false)
        .await
        .expect("fetch ok");

    assert_eq!(response.body, "<html>ok</html>");
    assert!(response.extracted.is_none());
}

#[tokio::test]
async fn reads_extraction_from_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("ai_extract_rules", extraction_rules_json().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(EXTRACTION_HEADER, r#"{"job_title":"Data Engineer","salary":"40k GBP"}"#)
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;

    let response = gateway(&server, Duration::from_secs(5))
        .fetch(TARGET, true)
        .await
        .expect("fetch ok");

    let extracted = response.extracted.expect("payload present");
    assert_eq!(extracted["salary"], "40k GBP");
}

#[tokio::test]
async fn reads_extraction_from_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"job_title":"Analyst","job_summary":"Crunch numbers."}"#),
        )
        .mount(&server)
        .await;

    let response = gateway(&server, Duration::from_secs(5))
        .fetch(TARGET, true)
        .await
        .expect("fetch ok");

    let extracted = response.extracted.expect("payload present");
    assert_eq!(extracted["job_summary"], "Crunch numbers.");
}

#[tokio::test]
async fn html_body_without_header_has_no_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>page</html>"))
        .mount(&server)
        .await;

    let response = gateway(&server, Duration::from_secs(5))
        .fetch(TARGET, true)
        .await
        .expect("fetch ok");

    assert_eq!(response.body, "<html>page</html>");
    assert!(response.extracted.is_none());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("quota exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server, Duration::from_secs(5))
        .fetch(TARGET, false)
        .await
        .expect_err("status should fail");

    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn timeout_is_retried_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;

    let err = gateway(&server, Duration::from_millis(200))
        .fetch(TARGET, false)
        .await
        .expect_err("should time out");

    assert!(matches!(err, FetchError::Timeout { attempts: 2 }), "{err}");
}

/// Answers every connection with headers and a truncated body, then goes quiet.
async fn stalling_body_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\n<html>partial")
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    (format!("http://{addr}/api/v1/"), connections)
}

#[tokio::test]
async fn body_read_timeout_is_retried_exactly_once() {
    let (api_url, connections) = stalling_body_server().await;
    let settings = GatewaySettings {
        api_url,
        timeout: Duration::from_millis(300),
        retry_backoff: Duration::ZERO,
        ..GatewaySettings::new("test-key")
    };

    let err = ScrapingBeeGateway::new(settings)
        .expect("client builds")
        .fetch(TARGET, false)
        .await
        .expect_err("stalled body should time out");

    assert!(matches!(err, FetchError::Timeout { attempts: 2 }), "{err}");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}
