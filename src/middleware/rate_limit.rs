use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::ApiConfig;
use crate::error::ApiError;

// Expired windows are swept once the table grows past this
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trust_proxy: bool,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trust_proxy: false,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.rate_limit_requests, Duration::from_secs(config.rate_limit_window_secs))
            .trusting_proxy(config.trust_proxy)
    }

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer
    pub fn trusting_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    /// Counts one request; false once the client is over the limit
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = windows.entry(client).or_insert(Window { started: now, count: 0 });
        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count <= self.max_requests
    }
}

/// Client address: the first `X-Forwarded-For` hop when the proxy is
/// trusted, else the peer address
fn client_ip(headers: &HeaderMap, request: &Request, trust_proxy: bool) -> IpAddr {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    trust_proxy
        .then(forwarded)
        .flatten()
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip(&headers, &request, limiter.trust_proxy);
    if !limiter.check(client) {
        tracing::warn!(client = %client, "Rate limit exceeded");
        return Err(ApiError::too_many_requests("Too many requests, please try again later."));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_within_window_and_resets_after() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(limiter.check_at(client, start));
        assert!(limiter.check_at(client, start + Duration::from_secs(1)));
        assert!(!limiter.check_at(client, start + Duration::from_secs(2)));

        assert!(limiter.check_at(client, start + Duration::from_secs(61)));
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("10.0.0.1".parse().unwrap(), now));
        assert!(limiter.check_at("10.0.0.2".parse().unwrap(), now));
        assert!(!limiter.check_at("10.0.0.1".parse().unwrap(), now));
    }

    #[test]
    fn forwarded_for_only_behind_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let mut request = Request::new(axum::body::Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo("192.0.2.1:5000".parse::<SocketAddr>().unwrap()));

        assert_eq!(client_ip(&headers, &request, true), "203.0.113.7".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&headers, &request, false), "192.0.2.1".parse::<IpAddr>().unwrap());
        assert_eq!(
            client_ip(&HeaderMap::new(), &Request::new(axum::body::Body::empty()), true),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }
}
