//! Inbound request rate limiting.
//!
//! A token bucket per client address refills at `requests_per_minute / 60`
//! tokens per second up to `requests_per_minute`. A request that finds its
//! bucket empty is rejected with 429 straight away; nothing is queued.
//! Buckets live in process memory only.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use log::{info, warn};
use tower::{Layer, Service};

use crate::config::RateLimiterConfig;
use crate::constants::RATE_LIMIT_BUCKET_TTL_SECS;
use crate::error::AppError;

/// Which bucket a request draws from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    Client(IpAddr),
    /// Used when the peer address is unknown (e.g. no connect info).
    Global,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

struct Buckets {
    entries: HashMap<BucketKey, Bucket>,
    last_sweep: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    ttl: Duration,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_ttl(
            requests_per_minute,
            Duration::from_secs(RATE_LIMIT_BUCKET_TTL_SECS),
        )
    }

    pub fn with_ttl(requests_per_minute: u32, ttl: Duration) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            ttl,
            buckets: Mutex::new(Buckets {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Spend one token from `key`'s bucket. Returns `false` when it is empty.
    pub fn check(&self, key: &BucketKey) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &BucketKey, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(buckets.last_sweep) >= self.ttl {
            let ttl = self.ttl;
            buckets
                .entries
                .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < ttl);
            buckets.last_sweep = now;
        }

        let capacity = self.capacity;
        let bucket = buckets.entries.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Number of buckets currently held in memory.
    pub fn tracked_keys(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// Tower layer wrapping every route with the rate limiter.
///
/// Built once from configuration. When disabled no limiter exists and the
/// service forwards requests untouched.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Option<Arc<RateLimiter>>,
}

impl RateLimitLayer {
    pub fn new(config: &RateLimiterConfig) -> Self {
        if !config.enabled {
            info!("rate_limit: disabled");
            return Self { limiter: None };
        }
        info!(
            "rate_limit: enabled at {} requests/minute per client",
            config.requests_per_minute
        );
        Self {
            limiter: Some(Arc::new(RateLimiter::new(config.requests_per_minute))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimit<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimit {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimit<S> {
    inner: S,
    limiter: Option<Arc<RateLimiter>>,
}

impl<S, B> Service<Request<B>> for RateLimit<S>
where
    S: Service<Request<B>, Response = Response>,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let limiter = match &self.limiter {
            Some(limiter) => limiter,
            None => return Box::pin(self.inner.call(req)),
        };

        let key = bucket_key(&req);
        if !limiter.check(&key) {
            warn!("rate_limit: rejected {} {} for {:?}", req.method(), req.uri().path(), key);
            let response = AppError::RateLimited.into_response();
            return Box::pin(futures::future::ok::<Response, S::Error>(response));
        }

        Box::pin(self.inner.call(req))
    }
}

fn bucket_key<B>(req: &Request<B>) -> BucketKey {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| BucketKey::Client(addr.ip()))
        .unwrap_or(BucketKey::Global)
}
