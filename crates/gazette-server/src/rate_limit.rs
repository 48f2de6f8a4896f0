//! Per-client request rate limiting.
//!
//! Buckets are keyed by the caller's bearer token when one is present, so a
//! user keeps their own budget across networks; unauthenticated requests
//! fall back to the client IP.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

/// Identity a bucket is attached to.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum ClientKey {
    /// Authenticated caller, keyed by bearer token.
    Session(String),
    /// Unauthenticated caller, keyed by source address.
    Ip(IpAddr),
    /// Neither a token nor a resolvable address: one shared bucket.
    Unknown,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<ClientKey, TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity,
        }
    }

    async fn check(&self, key: ClientKey) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(self.rate, self.capacity)
    }

    /// Drop buckets idle for longer than `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10.0, 30.0)
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let key = client_key(&req);

    if !limiter.check(key.clone()).await {
        warn!(?key, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

/// Prefer the bearer token, then ConnectInfo, then X-Forwarded-For /
/// X-Real-IP.
fn client_key<B>(req: &Request<B>) -> ClientKey {
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(value) = auth.to_str() {
            let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
            if !token.is_empty() {
                return ClientKey::Session(token.to_string());
            }
        }
    }

    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return ClientKey::Ip(connect_info.0.ip());
    }

    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ClientKey::Ip(ip);
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return ClientKey::Ip(ip);
            }
        }
    }

    ClientKey::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_up_to_capacity() {
        let limiter = RateLimiter::new(10.0, 5.0);
        let key = ClientKey::Session("token-a".to_string());

        for _ in 0..5 {
            assert!(limiter.check(key.clone()).await);
        }

        assert!(!limiter.check(key).await);
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let limiter = RateLimiter::new(10.0, 2.0);
        let session = ClientKey::Session("token-a".to_string());
        let ip = ClientKey::Ip("10.0.0.1".parse().unwrap());

        assert!(limiter.check(session.clone()).await);
        assert!(limiter.check(session.clone()).await);
        assert!(!limiter.check(session).await);

        assert!(limiter.check(ip).await);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let limiter = RateLimiter::new(10.0, 5.0);
        assert!(limiter.check(ClientKey::Unknown).await);

        limiter.purge_stale(0.0).await;

        let buckets = limiter.buckets.lock().await;
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_client_key_prefers_token() {
        let req = Request::builder()
            .header("authorization", "Bearer abc")
            .header("x-forwarded-for", "10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_key(&req), ClientKey::Session("abc".to_string()));
    }

    #[test]
    fn test_client_key_falls_back_to_forwarded_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 192.168.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_key(&req), ClientKey::Ip("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_client_key_unknown_without_signals() {
        let req = Request::builder().body(()).unwrap();
        assert_eq!(client_key(&req), ClientKey::Unknown);
    }
}
