use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{ForwardedFor, RateLimit};
use crate::error::AppError;
use crate::middleware::client_ip::resolve_client_ip;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    last_seen: Instant,
}

#[derive(Debug)]
struct Windows {
    entries: HashMap<String, Window>,
    last_prune: Instant,
}

impl Windows {
    /// Drops keys idle for longer than `window`. Runs at most once per window.
    fn prune(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.last_prune) <= window {
            return;
        }

        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= window);
        self.last_prune = now;

        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.entries.len(), "evicted idle rate limit keys");
        }
    }
}

/// Fixed-window request counter keyed by client IP.
///
/// A key's counter starts over once more than `window` has passed since it
/// was last touched. Counters live in this process only, so each instance of
/// a horizontally scaled deployment limits independently.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    forwarded_for: ForwardedFor,
    windows: Arc<Mutex<Windows>>,
}

impl RateLimiter {
    pub fn new(config: RateLimit) -> Self {
        Self {
            limit: config.limit,
            window: config.window,
            forwarded_for: ForwardedFor::default(),
            windows: Arc::new(Mutex::new(Windows {
                entries: HashMap::new(),
                last_prune: Instant::now(),
            })),
        }
    }

    pub fn with_forwarded_for(mut self, forwarded_for: ForwardedFor) -> Self {
        self.forwarded_for = forwarded_for;
        self
    }

    /// Number of keys currently holding a counter.
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Counts one request for `key`, returning whether it is within the limit.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.prune(now, self.window);

        let entry = windows.entries.entry(key.to_string()).or_insert(Window {
            count: 0,
            last_seen: now,
        });

        if now.saturating_duration_since(entry.last_seen) > self.window {
            entry.count = 0;
        }
        entry.last_seen = now;
        entry.count = entry.count.saturating_add(1);

        entry.count <= self.limit
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client_ip = resolve_client_ip(req.headers(), req.extensions(), limiter.forwarded_for);

    if !limiter.check(&client_ip) {
        tracing::warn!(
            client_ip = %client_ip,
            path = %req.uri().path(),
            limit = limiter.limit,
            window_secs = limiter.window.as_secs(),
            "rate limit exceeded"
        );
        return AppError::TooManyRequests.into_response();
    }

    next.run(req).await
}
