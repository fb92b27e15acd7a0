use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use dashmap::DashMap;
use metrics::{counter, gauge};
use tracing::debug;

const ANONYMOUS_CLIENT: &str = "anonymous";

/// Sliding-window request counter keyed by client and route.
///
/// Buckets whose newest request has left the window are swept at most once per window, so
/// clients that never return do not accumulate.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    trust_forwarded_for: bool,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            trust_forwarded_for: false,
            buckets: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Key clients on the first `X-Forwarded-For` hop. Only safe behind a proxy that
    /// overwrites the header.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Identify the caller: the forwarded client when trusted, else the peer address.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> String {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| self.trust_forwarded_for && !value.is_empty());

        match (forwarded, peer) {
            (Some(client), _) => client.to_string(),
            (None, Some(ip)) => ip.to_string(),
            (None, None) => ANONYMOUS_CLIENT.to_string(),
        }
    }

    /// Record a request and report whether it is allowed, plus the remaining budget.
    pub fn allow(&self, key: &str, route: &str) -> (bool, u32) {
        self.allow_at(key, route, Instant::now())
    }

    fn allow_at(&self, key: &str, route: &str, now: Instant) -> (bool, u32) {
        self.sweep_if_due(now);

        let bucket_key = format!("{key}:{route}");
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.saturating_duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            counter!("eventhub_registration_throttled_total").increment(1);
            return (false, 0);
        }

        entry.push(now);
        (true, remaining.saturating_sub(1))
    }

    // Must run before any bucket entry is held: `retain` locks every shard.
    fn sweep_if_due(&self, now: Instant) {
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last_sweep) < self.window {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);

        let window = self.window;
        let before = self.buckets.len();
        self.buckets.retain(|_, requests| {
            requests
                .last()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < window)
        });

        gauge!("eventhub_rate_limit_buckets").set(self.buckets.len() as f64);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            debug!(
                target = "eventhub::http::rate_limit",
                evicted,
                remaining = self.buckets.len(),
                "expired rate limit buckets evicted"
            );
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}
