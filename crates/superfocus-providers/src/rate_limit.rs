//! In-process fixed-window rate limiter.
//!
//! Used when no shared counter store is configured. Counts are per process,
//! so limits only hold for a single instance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use superfocus_core::{RateLimitDecision, RateLimitPolicy, RateLimiter, Result};
use tokio::sync::Mutex;
use tracing::debug;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

#[derive(Debug, Clone, Copy)]
struct Window {
    index: u64,
    count: u64,
}

/// Fixed-window counters held in memory.
#[derive(Debug, Clone)]
pub struct MemoryRateLimiter {
    policy: RateLimitPolicy,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl MemoryRateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts a request at `now_secs` (Unix seconds).
    pub async fn check_at(&self, scope: &str, identity: &str, now_secs: u64) -> RateLimitDecision {
        let index = self.policy.window_index(now_secs);
        let mut windows = self.windows.lock().await;

        // Drop counters from finished windows
        windows.retain(|_, w| w.index == index);

        let window = windows
            .entry(format!("{scope}:{identity}"))
            .or_insert(Window { index, count: 0 });
        window.count += 1;

        let decision = self.policy.decide(window.count, now_secs);
        debug!(scope, count = window.count, allowed = decision.allowed, "Rate limit counted");
        decision
    }

    /// Number of live counters.
    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, scope: &str, identity: &str) -> Result<RateLimitDecision> {
        Ok(self.check_at(scope, identity, unix_now()).await)
    }
}
