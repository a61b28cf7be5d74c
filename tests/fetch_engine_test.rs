//! Integration tests for the fetch engine against a local mock HTTP
//! server, exercising retry, circuit breaker, and robots gate behavior end
//! to end rather than in isolation.

use std::sync::Arc;
use std::time::Duration;

use marketfetch::circuit_breaker::CircuitBreaker;
use marketfetch::error::ErrorKind;
use marketfetch::fetch_engine::{Ctx, FetchEngine, FetchRequest};
use marketfetch::rate_limiter::RateLimiter;
use marketfetch::retry::RetryPolicy;
use marketfetch::session_pool::SessionPool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine(retry: RetryPolicy, breaker: CircuitBreaker) -> FetchEngine {
    let rate_limiter = Arc::new(RateLimiter::new(100.0, 100, 100.0, 100).unwrap());
    let sessions = Arc::new(SessionPool::new(2, 10, Duration::from_millis(10), Duration::from_secs(5)).unwrap());
    FetchEngine::new(rate_limiter, sessions, Arc::new(breaker), retry, None)
}

#[tokio::test]
async fn successful_response_is_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(
        RetryPolicy::new(3, 10, 1_000).unwrap(),
        CircuitBreaker::new(10, 0.5, Duration::from_millis(50), 1),
    );
    let request = FetchRequest::get(format!("{}/ok", server.uri()), "quote");
    let response = engine.do_request(Ctx::with_timeout(Duration::from_secs(5)), &request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");
}

#[tokio::test]
async fn transient_5xx_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let engine = engine(
        RetryPolicy::new(5, 1, 50).unwrap(),
        CircuitBreaker::new(20, 0.9, Duration::from_millis(50), 1),
    );
    let request = FetchRequest::get(format!("{}/flaky", server.uri()), "quote");
    let response = engine.do_request(Ctx::with_timeout(Duration::from_secs(5)), &request).await.unwrap();
    assert_eq!(response.body, "recovered");
}

#[tokio::test]
async fn exhausted_retries_surface_the_classified_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/always-down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine = engine(
        RetryPolicy::new(2, 1, 10).unwrap(),
        CircuitBreaker::new(20, 0.9, Duration::from_millis(50), 1),
    );
    let request = FetchRequest::get(format!("{}/always-down", server.uri()), "quote");
    let err = engine
        .do_request(Ctx::with_timeout(Duration::from_secs(5)), &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn auth_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(
        RetryPolicy::new(5, 1, 50).unwrap(),
        CircuitBreaker::new(20, 0.9, Duration::from_millis(50), 1),
    );
    let request = FetchRequest::get(format!("{}/forbidden", server.uri()), "key-statistics");
    let err = engine
        .do_request(Ctx::with_timeout(Duration::from_secs(5)), &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AuthError);
}

#[tokio::test]
async fn rate_limited_response_honors_the_retry_after_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let engine = engine(
        RetryPolicy::new(3, 10, 1_000).unwrap(),
        CircuitBreaker::new(20, 0.9, Duration::from_millis(50), 1),
    );
    let request = FetchRequest::get(format!("{}/throttled", server.uri()), "quote");
    let started = std::time::Instant::now();
    let response = engine
        .do_request(Ctx::with_timeout(Duration::from_secs(5)), &request)
        .await
        .unwrap();
    assert_eq!(response.body, "ok");
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn open_breaker_rejects_before_hitting_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trip"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    // window=2, threshold=0.5: two failures trips the breaker open.
    let engine = engine(RetryPolicy::new(1, 1, 10).unwrap(), CircuitBreaker::new(2, 0.5, Duration::from_secs(30), 1));
    let request = FetchRequest::get(format!("{}/trip", server.uri()), "quote");

    let _ = engine.do_request(Ctx::with_timeout(Duration::from_secs(5)), &request).await;
    let _ = engine.do_request(Ctx::with_timeout(Duration::from_secs(5)), &request).await;

    let err = engine
        .do_request(Ctx::with_timeout(Duration::from_secs(5)), &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::CircuitOpen);
}
