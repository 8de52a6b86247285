//! End-to-end tests against a mock HTTP server, covering retry behavior,
//! rate limiting, pooling and response normalization.

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use courier::{
    AuthConfig, Client, ClientBuilder, ClientConfig, ErrorKind, HostConfig, HostKey, RequestSpec,
    ResponseBody,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with(config: ClientConfig) -> Client {
    ClientBuilder::builder()
        .config(config)
        .build()
        .client()
        .unwrap()
}

/// Retry config with short delays so tests stay fast
fn fast_retries(max_attempts: u32) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.retry.max_attempts = max_attempts;
    config.retry.base_delay = Duration::from_millis(50);
    config.retry.max_delay = Duration::from_millis(500);
    config
}

fn url_of(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(fast_retries(3));
    let result = client.get(url_of(&server)).await;

    let Err(ErrorKind::ClientError(response)) = result else {
        panic!("Expected a terminal client error");
    };
    assert_eq!(response.status.as_u16(), 404);
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_with(fast_retries(3));
    let start = Instant::now();
    let result = client.get(url_of(&server)).await;

    // Two backoff sleeps happened: ~50ms after the first attempt,
    // ~100ms after the second
    assert!(start.elapsed() >= Duration::from_millis(150));

    let Err(ErrorKind::RetryExhausted { attempts, source }) = result else {
        panic!("Expected retries to be exhausted");
    };
    assert_eq!(attempts, 3);
    assert!(matches!(*source, ErrorKind::ServerError(_)));
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(fast_retries(3));
    let response = client.get(url_of(&server)).await.unwrap();

    assert!(response.is_success());
}

#[tokio::test]
async fn test_retry_after_header_overrides_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Backoff alone would wait ~10ms; the header mandates a full second.
    // The delay cap must sit above that so the header value is not clamped.
    let mut config = fast_retries(2);
    config.retry.base_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_secs(5);
    let client = client_with(config);

    let start = Instant::now();
    let response = client.get(url_of(&server)).await.unwrap();

    assert!(response.is_success());
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_api_key_auth_sends_only_custom_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(ClientConfig::default());
    let spec = RequestSpec::builder()
        .url(url_of(&server))
        .auth(AuthConfig::api_key("secret", "X-API-Key"))
        .build();
    client.invoke(&spec).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_bearer_auth_sends_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(ClientConfig::default());
    let spec = RequestSpec::builder()
        .url(url_of(&server))
        .auth(AuthConfig::bearer("tok-123"))
        .build();

    assert!(client.invoke(&spec).await.is_ok());
}

#[tokio::test]
async fn test_per_host_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = url_of(&server);
    let key = HostKey::try_from(&url).unwrap();

    let mut headers = http::HeaderMap::new();
    headers.insert("X-Tenant", "acme".parse().unwrap());
    let mut config = ClientConfig::default();
    config.hosts.insert(
        key,
        HostConfig {
            headers,
            ..Default::default()
        },
    );

    let client = client_with(config);
    assert!(client.get(url).await.is_ok());
}

#[tokio::test]
async fn test_rate_limit_wait_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // One token, no meaningful refill, tiny wait budget
    let mut config = ClientConfig::default();
    config.rate_limit.capacity = NonZeroU32::new(1).unwrap();
    config.rate_limit.refill_interval = Duration::from_secs(60);
    config.rate_limit.wait_timeout = Duration::from_millis(50);
    let client = client_with(config);
    let url = url_of(&server);

    client.get(url.clone()).await.unwrap();

    let result = client.get(url).await;
    assert!(matches!(result, Err(ErrorKind::RateLimitTimeout { .. })));
}

#[tokio::test]
async fn test_burst_within_capacity_is_not_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&server)
        .await;

    let mut config = ClientConfig::default();
    config.rate_limit.capacity = NonZeroU32::new(5).unwrap();
    config.rate_limit.refill_interval = Duration::from_secs(60);
    config.rate_limit.wait_timeout = Duration::from_millis(100);
    let client = client_with(config);
    let url = url_of(&server);

    let start = Instant::now();
    for _ in 0..5 {
        client.get(url.clone()).await.unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_pool_exhaustion_fails_the_waiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut config = ClientConfig::default();
    config.pool.max_connections = 1;
    config.pool.wait_timeout = Duration::from_millis(100);
    let client = client_with(config);
    let url = url_of(&server);

    let (first, second) = tokio::join!(client.get(url.clone()), client.get(url.clone()));

    // One request holds the single connection for 500ms; the other gives
    // up waiting after 100ms
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(ErrorKind::PoolExhausted { .. })))
    );
}

#[tokio::test]
async fn test_json_response_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "ok": true})))
        .mount(&server)
        .await;

    let client = client_with(ClientConfig::default());
    let response = client.get(url_of(&server)).await.unwrap();

    assert_eq!(response.body.as_json().unwrap()["id"], json!(42));
}

#[tokio::test]
async fn test_malformed_json_falls_back_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&server)
        .await;

    let client = client_with(ClientConfig::default());
    let response = client.get(url_of(&server)).await.unwrap();

    assert_eq!(response.body, ResponseBody::Text("{not json".to_string()));
}

#[tokio::test]
async fn test_server_error_response_is_attached_to_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": "maintenance window"})),
        )
        .mount(&server)
        .await;

    let client = client_with(fast_retries(2));
    let err = client.get(url_of(&server)).await.unwrap_err();

    assert_eq!(err.status().unwrap().as_u16(), 503);
    let body = err.response().unwrap().body.as_json().unwrap();
    assert_eq!(body["error"], json!("maintenance window"));
}

#[tokio::test]
async fn test_network_error_against_closed_port() {
    // Bind a throwaway listener to find a port that is closed once dropped
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

    let client = client_with(fast_retries(2));
    let err = client.get(url).await.unwrap_err();

    // Connection refused is transient, so the retry budget gets spent
    let ErrorKind::RetryExhausted { attempts, source } = err else {
        panic!("Expected retries to be exhausted");
    };
    assert_eq!(attempts, 2);
    assert!(matches!(*source, ErrorKind::NetworkRequest(_)));
}

#[tokio::test]
async fn test_truncated_body_is_retried() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Advertises 100 body bytes, sends 5, then closes the connection
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nshort")
                .await;
        }
    });

    let client = client_with(fast_retries(2));
    let err = client.get(url.clone()).await.unwrap_err();

    let ErrorKind::RetryExhausted { attempts, source } = err else {
        panic!("Expected retries to be exhausted");
    };
    assert_eq!(attempts, 2);
    assert!(matches!(*source, ErrorKind::ReadResponseBody(_)));

    // Requests that died mid-body count as network errors, not responses
    let stats = client
        .host_stats(&HostKey::try_from(&url).unwrap())
        .unwrap();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.network_errors, 2);
    assert_eq!(stats.successful_requests, 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_host_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(8)
        .mount(&server)
        .await;

    let client = client_with(ClientConfig::default());
    let url = url_of(&server);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move { client.get(url).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let key = HostKey::try_from(&url).unwrap();
    let stats = client.host_stats(&key).unwrap();
    assert_eq!(stats.total_requests, 8);
    assert_eq!(stats.successful_requests, 8);
}
