use std::collections::HashMap;
use std::time::Duration;

use castgate::breaker::CircuitBreakerConfig;
use castgate::throttle::ThrottlerConfig;
use castgate::{is_fallback, ApiError, CircuitState, ClientConfig, ResilientClient};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

/// Captures crate logs in test output; `cargo test -- --nocapture` shows
/// request/retry/transition diagnostics on failure.
fn init_diagnostics() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config(base_url: &str) -> ClientConfig {
    init_diagnostics();
    ClientConfig::builder()
        .base_url(base_url)
        .api_key("test-key")
        .max_retries(0)
        .retry_base_delay(Duration::from_millis(10))
        .retry_max_delay(Duration::from_millis(50))
        .breaker(
            CircuitBreakerConfig::builder()
                .failure_threshold(5)
                .recovery_timeout(Duration::from_secs(60))
                .name("test")
                .build_config(),
        )
        .throttler(
            ThrottlerConfig::builder()
                .max_requests(100)
                .window(Duration::from_secs(10))
                .build(),
        )
        .build()
}

fn client(server: &ServerGuard) -> ResilientClient {
    ResilientClient::new(config(&server.url())).unwrap()
}

#[tokio::test]
async fn success_returns_parsed_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search/person")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"results":[{"id":1,"name":"Nicolas Cage"}],"total_results":1}"#)
        .create_async()
        .await;

    let client = client(&server);
    let mut params = HashMap::new();
    params.insert("query".to_string(), "nicolas cage".to_string());

    let body = client.request("search/person", &params).await;
    assert!(!is_fallback(&body));
    assert_eq!(body["total_results"], 1);
    assert_eq!(body["results"][0]["name"], "Nicolas Cage");
    mock.assert_async().await;
}

#[tokio::test]
async fn five_consecutive_503s_open_the_circuit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search/person")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(5)
        .create_async()
        .await;

    let client = client(&server);
    let params = HashMap::new();

    for _ in 0..5 {
        let body = client.request("search/person", &params).await;
        assert!(is_fallback(&body));
    }
    assert_eq!(client.circuit_status().state, CircuitState::Open);
    assert!(!client.healthy());

    // Sixth call fails fast: the search fallback comes back without a
    // single byte on the wire.
    let body = client.request("search/person", &params).await;
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["total_results"], 0);
    assert_eq!(body["total_pages"], 0);
    assert_eq!(body["page"], 1);
    assert!(is_fallback(&body));
    mock.assert_async().await;
}

#[tokio::test]
async fn exhausted_retries_synthesize_movie_credits_fallback() {
    // Nothing listens on the discard port: every attempt is a transport
    // failure, the retry budget drains, and the credits shape comes back.
    let mut cfg = ClientConfig::builder()
        .base_url("http://127.0.0.1:9")
        .api_key("test-key")
        .max_retries(3)
        .retry_base_delay(Duration::from_millis(5))
        .retry_max_delay(Duration::from_millis(20))
        .connect_timeout(Duration::from_millis(200));
    cfg = cfg.breaker(
        CircuitBreakerConfig::builder()
            .failure_threshold(100)
            .build_config(),
    );
    let client = ResilientClient::new(cfg.build()).unwrap();

    let body = client
        .request("person/123/movie_credits", &HashMap::new())
        .await;
    assert_eq!(body["cast"], json!([]));
    assert_eq!(body["crew"], json!([]));
    assert_eq!(body["id"], 0);
    assert!(is_fallback(&body));
    // 1 initial attempt + 3 retries all counted as failures.
    assert_eq!(client.circuit_status().failure_count, 4);
}

#[tokio::test]
async fn read_timeout_exhausts_retries_to_the_credits_fallback() {
    use std::io::Write as _;

    let mut server = Server::new_async().await;
    // The body writer stalls past the client's read timeout, so every
    // attempt classifies as a timeout and burns a retry.
    let mock = server
        .mock("GET", "/person/123/movie_credits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_chunked_body(|writer| {
            std::thread::sleep(Duration::from_millis(400));
            writer.write_all(br#"{"cast":[{"id":1}]}"#)
        })
        .expect(4)
        .create_async()
        .await;

    let client = ResilientClient::new(
        ClientConfig::builder()
            .base_url(&server.url())
            .api_key("test-key")
            .read_timeout(Duration::from_millis(100))
            .max_retries(3)
            .retry_base_delay(Duration::from_millis(5))
            .retry_max_delay(Duration::from_millis(20))
            .breaker(
                CircuitBreakerConfig::builder()
                    .failure_threshold(100)
                    .build_config(),
            )
            .build(),
    )
    .unwrap();

    let body = client
        .request("person/123/movie_credits", &HashMap::new())
        .await;
    assert_eq!(body["cast"], json!([]));
    assert_eq!(body["crew"], json!([]));
    assert_eq!(body["id"], 0);
    assert!(is_fallback(&body));
    // 1 initial attempt + 3 retries, every timeout counted by the breaker.
    assert_eq!(client.circuit_status().failure_count, 4);
    mock.assert_async().await;
}

#[tokio::test]
async fn not_found_is_terminal_and_does_not_trip_the_breaker() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/person/999")
        .match_query(Matcher::Any)
        .with_status(404)
        .expect(2)
        .create_async()
        .await;

    let client = client(&server);
    let err = client
        .try_request("person/999", &HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
    assert_eq!(client.circuit_status().state, CircuitState::Closed);
    assert_eq!(client.circuit_status().failure_count, 0);

    let body = client.request("person/999", &HashMap::new()).await;
    assert_eq!(body["name"], "Unknown Actor");
    assert!(is_fallback(&body));
    // One wire hit per call: 404 is never retried.
    mock.assert_async().await;
}

#[tokio::test]
async fn rate_limit_is_retried_exactly_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/person/1")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "0")
        .expect(2)
        .create_async()
        .await;

    let client = client(&server);
    let err = client
        .try_request("person/1", &HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::RateLimited { .. }));
    // Backpressure is not breakage.
    assert_eq!(client.circuit_status().failure_count, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn auth_failure_is_terminal() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/person/1")
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let client = client(&server);
    let err = client
        .try_request("person/1", &HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AuthFailed));
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_json_synthesizes_fallback() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/person/1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>definitely not json</html>")
        .create_async()
        .await;

    let client = client(&server);
    let body = client.request("person/1", &HashMap::new()).await;
    assert!(is_fallback(&body));
    assert_eq!(body["name"], "Unknown Actor");
    // A parse failure is not upstream unreliability.
    assert_eq!(client.circuit_status().failure_count, 0);
}

#[tokio::test]
async fn success_after_failures_resets_the_tally() {
    let mut server = Server::new_async().await;
    let failures = server
        .mock("GET", "/person/1")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let client = client(&server);
    for _ in 0..3 {
        let _ = client.request("person/1", &HashMap::new()).await;
    }
    assert_eq!(client.circuit_status().failure_count, 3);
    failures.remove_async().await;

    server
        .mock("GET", "/person/1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"id":1,"name":"Nicolas Cage"}"#)
        .create_async()
        .await;

    let body = client.request("person/1", &HashMap::new()).await;
    assert!(!is_fallback(&body));
    assert_eq!(client.circuit_status().failure_count, 0);
    assert_eq!(client.circuit_status().state, CircuitState::Closed);
}

#[tokio::test]
async fn operator_reset_reopens_traffic() {
    let client = ResilientClient::new(config("http://127.0.0.1:9")).unwrap();
    client.circuit_breaker().force_state(CircuitState::Open, 5);
    assert!(!client.healthy());

    client.circuit_breaker().reset();
    assert!(client.healthy());
    assert_eq!(client.circuit_status().state, CircuitState::Closed);
}

#[tokio::test]
async fn unknown_endpoints_get_the_default_shape() {
    let client = ResilientClient::new(
        ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .api_key("test-key")
            .max_retries(0)
            .connect_timeout(Duration::from_millis(200))
            .build(),
    )
    .unwrap();

    let body = client.request("configuration/languages", &HashMap::new()).await;
    assert_eq!(body["error"], "Service temporarily unavailable");
    assert_eq!(body["fallback"], true);
}

#[tokio::test]
async fn throttler_status_is_exposed() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/person/1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = client(&server);
    client.request("person/1", &HashMap::new()).await;

    let status = client.throttler_status();
    assert_eq!(status.recent_requests, 1);
    assert_eq!(status.queue_size, 0);
    assert_eq!(status.max_requests, 100);

    let body = serde_json::to_value(&status).unwrap();
    assert_eq!(body["recent_requests"], 1);
}
