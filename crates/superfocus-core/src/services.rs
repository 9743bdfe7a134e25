//! Seams to the external managed services.
//!
//! Each trait is implemented over HTTP in `superfocus-providers` and by
//! in-memory fakes in tests. Handlers only ever hold `Arc<dyn Trait>`.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::contracts::{SpeechRequest, Video};
use crate::error::{FocusError, Result};

// ============================================================================
// Speech & Video
// ============================================================================

/// Chunked audio as produced by the synthesis provider.
pub type AudioStream = BoxStream<'static, Result<Bytes>>;

/// Text-to-speech provider.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Starts synthesis and returns the audio as it arrives.
    ///
    /// Errors before the first byte (authentication, bad status) are returned
    /// directly; errors mid-stream surface as stream items.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioStream>;
}

/// Video search provider.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Runs `query` with strict safe-search and returns up to `max_results`
    /// raw (unfiltered) results.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Video>>;
}

// ============================================================================
// Authentication & Billing
// ============================================================================

/// An authenticated caller.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Stable user id issued by the auth backend.
    pub id: String,
    /// Email on record, if any.
    pub email: Option<String>,
    access_token: String,
}

impl AuthUser {
    /// Creates a user bound to the token that authenticated them.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        email: Option<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email,
            access_token: access_token.into(),
        }
    }

    /// The caller's bearer token, for calls made on their behalf.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Verifies bearer tokens against the auth backend.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Resolves `token` to a user, or fails with `Unauthorized`.
    async fn verify(&self, token: &str) -> Result<AuthUser>;
}

/// Read access to user profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The billing customer id on the caller's profile, if one exists.
    async fn billing_customer(&self, user: &AuthUser) -> Result<Option<String>>;
}

/// Payment provider's self-service portal.
#[async_trait]
pub trait BillingPortal: Send + Sync {
    /// Creates a portal session and returns its URL.
    async fn create_session(&self, customer_id: &str, return_url: &str) -> Result<String>;
}

// ============================================================================
// Rate Limiting
// ============================================================================

/// Fixed-window limit: at most `max_requests` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Index of the window containing `now_secs` (Unix seconds).
    #[must_use]
    pub const fn window_index(&self, now_secs: u64) -> u64 {
        now_secs / self.window_len()
    }

    /// Seconds until the window containing `now_secs` ends.
    #[must_use]
    pub const fn reset_after(&self, now_secs: u64) -> u64 {
        let len = self.window_len();
        len - now_secs % len
    }

    /// Counter key for `scope` and `identity` in the window of `now_secs`.
    #[must_use]
    pub fn key(&self, scope: &str, identity: &str, now_secs: u64) -> String {
        format!(
            "superfocus:ratelimit:{scope}:{identity}:{}",
            self.window_index(now_secs)
        )
    }

    /// Decision for a counter that has reached `count` in the current window.
    #[must_use]
    pub const fn decide(&self, count: u64, now_secs: u64) -> RateLimitDecision {
        let max = self.max_requests as u64;
        #[allow(clippy::cast_possible_truncation)]
        let remaining = max.saturating_sub(count) as u32;
        RateLimitDecision {
            allowed: count <= max,
            limit: self.max_requests,
            remaining,
            reset_after_secs: self.reset_after(now_secs),
        }
    }

    const fn window_len(&self) -> u64 {
        if self.window_secs == 0 {
            1
        } else {
            self.window_secs
        }
    }
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Configured limit for the window.
    pub limit: u32,
    /// Requests left in the window.
    pub remaining: u32,
    /// Seconds until the window resets.
    pub reset_after_secs: u64,
}

impl RateLimitDecision {
    /// Converts a denial into `RateLimited`.
    pub fn into_result(self) -> Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(FocusError::RateLimited {
                limit: self.limit,
                reset_after_secs: self.reset_after_secs,
            })
        }
    }
}

/// Shared request counter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one request for `scope`/`identity` and decides whether it may
    /// proceed.
    async fn check(&self, scope: &str, identity: &str) -> Result<RateLimitDecision>;
}

// ============================================================================
// Health
// ============================================================================

/// A dependency that can be pinged for connectivity.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    /// Short service name for reports.
    fn name(&self) -> &str;

    /// Succeeds if the service answered.
    async fn ping(&self) -> Result<()>;
}
