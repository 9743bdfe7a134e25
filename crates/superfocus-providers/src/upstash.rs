//! Fixed-window rate limiting on Upstash Redis (REST API).
//!
//! Each check sends one pipeline, `INCR key` then `EXPIRE key window`, so the
//! counter update is atomic on the server and keys clean themselves up.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use superfocus_core::{
    FocusError, ProviderErrorKind, RateLimitDecision, RateLimitPolicy, RateLimiter, Result,
};
use tracing::debug;

use crate::http::{self, check_status, read_json, transport_error};

const PROVIDER: &str = "upstash";

#[derive(Deserialize)]
struct PipelineResult {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Rate limiter backed by an Upstash Redis database.
#[derive(Clone)]
pub struct UpstashRateLimiter {
    client: Client,
    url: String,
    token: String,
    policy: RateLimitPolicy,
}

impl UpstashRateLimiter {
    /// Creates a limiter for the database at `url`.
    pub fn new(
        url: &str,
        token: impl Into<String>,
        policy: RateLimitPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            url: http::base_url(url),
            token: token.into(),
            policy,
        })
    }

    /// Counts a request at `now_secs` (Unix seconds).
    pub async fn check_at(
        &self,
        scope: &str,
        identity: &str,
        now_secs: u64,
    ) -> Result<RateLimitDecision> {
        let key = self.policy.key(scope, identity, now_secs);
        let commands = serde_json::json!([
            ["INCR", &key],
            ["EXPIRE", &key, self.policy.window_secs.to_string()],
        ]);

        let response = self
            .client
            .post(format!("{}/pipeline", self.url))
            .bearer_auth(&self.token)
            .json(&commands)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let results: Vec<PipelineResult> = read_json(PROVIDER, response).await?;

        let first = results.into_iter().next().ok_or_else(|| {
            FocusError::provider(
                PROVIDER,
                ProviderErrorKind::InvalidResponse,
                "empty pipeline reply",
            )
        })?;
        if let Some(error) = first.error {
            return Err(FocusError::provider(PROVIDER, ProviderErrorKind::Other, error));
        }
        let count = first
            .result
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                FocusError::provider(
                    PROVIDER,
                    ProviderErrorKind::InvalidResponse,
                    "INCR did not return an integer",
                )
            })?;

        let decision = self.policy.decide(count, now_secs);
        debug!(scope, count, allowed = decision.allowed, "Rate limit counted");
        Ok(decision)
    }
}

#[async_trait]
impl RateLimiter for UpstashRateLimiter {
    async fn check(&self, scope: &str, identity: &str) -> Result<RateLimitDecision> {
        self.check_at(scope, identity, crate::rate_limit::unix_now())
            .await
    }
}
