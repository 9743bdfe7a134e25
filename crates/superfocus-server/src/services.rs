//! Wiring of external services from configuration and environment.

use std::sync::Arc;

use superfocus_core::{
    AuthVerifier, BillingPortal, ChatModel, ProfileStore, RateLimitPolicy, RateLimiter, Result,
    ServiceProbe, SpeechSynthesizer, VideoSearch,
};
use superfocus_providers::{
    MemoryRateLimiter, OpenAiClient, OpenAiSettings, StripeClient, SupabaseClient, Unconfigured,
    UpstashRateLimiter, YouTubeClient,
};
use tracing::{info, warn};

use crate::config::{Config, Environment};

const OPENAI: Unconfigured = Unconfigured::new("openai", "OPENAI_API_KEY");
const SUPABASE: Unconfigured = Unconfigured::new("supabase", "SUPABASE_URL and SUPABASE_ANON_KEY");
const STRIPE: Unconfigured = Unconfigured::new("stripe", "STRIPE_SECRET_KEY");
const YOUTUBE: Unconfigured = Unconfigured::new("youtube", "YOUTUBE_API_KEY");

/// Handles to every external service a handler may call.
#[derive(Clone)]
pub struct Services {
    /// Structured generation.
    pub model: Arc<dyn ChatModel>,
    /// Speech synthesis.
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Video search.
    pub videos: Arc<dyn VideoSearch>,
    /// Session verification.
    pub auth: Arc<dyn AuthVerifier>,
    /// Profile reads.
    pub profiles: Arc<dyn ProfileStore>,
    /// Billing portal sessions.
    pub billing: Arc<dyn BillingPortal>,
    /// Request counters; `None` disables limiting.
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
    /// Connectivity probe for the auth/database backend.
    pub database: Arc<dyn ServiceProbe>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Services that all answer "not configured", with in-memory limiting
    /// under `policy`.
    #[must_use]
    pub fn unconfigured(policy: Option<RateLimitPolicy>) -> Self {
        Self {
            model: Arc::new(OPENAI),
            speech: Arc::new(OPENAI),
            videos: Arc::new(YOUTUBE),
            auth: Arc::new(SUPABASE),
            profiles: Arc::new(SUPABASE),
            billing: Arc::new(STRIPE),
            rate_limiter: policy
                .map(|p| Arc::new(MemoryRateLimiter::new(p)) as Arc<dyn RateLimiter>),
            database: Arc::new(SUPABASE),
        }
    }

    /// Builds real clients for every service whose credentials are present.
    /// Services without credentials answer 503 when used.
    pub fn from_environment(config: &Config, env: &Environment) -> Result<Self> {
        let timeout = config.request_timeout();
        let mut services = Self::unconfigured(None);

        if let Some(key) = &env.openai_api_key {
            let openai = Arc::new(OpenAiClient::new(
                key.clone(),
                OpenAiSettings {
                    base_url: config.providers.openai.clone(),
                    chat_model: config.chat_model.clone(),
                    tts_model: config.tts_model.clone(),
                    temperature: config.temperature,
                    timeout,
                },
            )?);
            services.model = openai.clone();
            services.speech = openai;
        }

        if let (Some(url), Some(anon_key)) = (&env.supabase_url, &env.supabase_anon_key) {
            let supabase = Arc::new(SupabaseClient::new(url, anon_key.clone(), timeout)?);
            services.auth = supabase.clone();
            services.profiles = supabase.clone();
            services.database = supabase;
        }

        if let Some(key) = &env.stripe_secret_key {
            services.billing = Arc::new(StripeClient::new(
                key.clone(),
                &config.providers.stripe,
                timeout,
            )?);
        }

        if let Some(key) = &env.youtube_api_key {
            services.videos = Arc::new(YouTubeClient::new(
                key.clone(),
                &config.providers.youtube,
                timeout,
            )?);
        }

        services.rate_limiter = match (
            config.rate_limit_policy(),
            &env.upstash_url,
            &env.upstash_token,
        ) {
            (None, _, _) => {
                info!("Rate limiting disabled");
                None
            }
            (Some(policy), Some(url), Some(token)) => {
                info!(
                    max_requests = policy.max_requests,
                    window_secs = policy.window_secs,
                    "Rate limiting with Upstash Redis"
                );
                let limiter = UpstashRateLimiter::new(url, token.clone(), policy, timeout)?;
                Some(Arc::new(limiter) as Arc<dyn RateLimiter>)
            }
            (Some(policy), _, _) => {
                warn!("Upstash not configured; rate limits are per process");
                Some(Arc::new(MemoryRateLimiter::new(policy)) as Arc<dyn RateLimiter>)
            }
        };

        for status in env.services().iter().filter(|s| !s.configured) {
            if status.required {
                warn!(service = status.name, env = status.env, "Required service not configured");
            } else {
                info!(service = status.name, env = status.env, "Optional service not configured");
            }
        }

        Ok(services)
    }
}
