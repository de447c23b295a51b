mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestApp;
use portfolio_tracker_api::config::AppConfig;

fn limited_app(trust_proxy: bool) -> TestApp {
    let mut config = AppConfig::for_tests();
    config.api.enable_rate_limiting = true;
    config.api.rate_limit_requests = 2;
    config.api.rate_limit_window_secs = 60;
    config.api.trust_proxy = trust_proxy;
    TestApp::with_config(config)
}

fn from(ip: &str) -> Request<Body> {
    Request::builder()
        .uri("/test")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn third_request_in_window_is_rejected() {
    let app = limited_app(true);

    assert_eq!(app.send(from("203.0.113.9")).await.status, StatusCode::OK);
    assert_eq!(app.send(from("203.0.113.9")).await.status, StatusCode::OK);

    let limited = app.send(from("203.0.113.9")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["message"], "Too many requests, please try again later.");
}

#[tokio::test]
async fn clients_have_separate_budgets() {
    let app = limited_app(true);

    app.send(from("203.0.113.9")).await;
    app.send(from("203.0.113.9")).await;

    assert_eq!(app.send(from("198.51.100.4")).await.status, StatusCode::OK);
}

#[tokio::test]
async fn forwarded_for_is_ignored_without_a_trusted_proxy() {
    let app = limited_app(false);

    app.send(from("203.0.113.9")).await;
    app.send(from("198.51.100.4")).await;

    let spoofed = app.send(from("192.0.2.77")).await;
    assert_eq!(spoofed.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn disabled_by_default_in_tests() {
    let app = TestApp::new();
    for _ in 0..5 {
        assert_eq!(app.get("/test", None).await.status, StatusCode::OK);
    }
}
