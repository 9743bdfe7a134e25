//! Configuration for the SuperFocus server.
//!
//! Non-secret settings live in `superfocus.json` (camelCase, every field
//! optional). Credentials never go in that file: they are read from the
//! environment into [`Environment`], whose absence is reported by the health
//! endpoint rather than discovered at first use.

use std::path::Path;
use std::time::Duration;

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use superfocus_core::{FocusError, RateLimitPolicy, Result};
use superfocus_providers::{OPENAI_API_BASE, STRIPE_API_BASE, YOUTUBE_API_BASE};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "superfocus.json";

/// Site URL used when neither `SITE_URL` nor `NEXT_PUBLIC_SITE_URL` is set.
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

const fn default_temperature() -> f32 {
    0.4
}

const fn default_request_timeout() -> u64 {
    60
}

/// Room for an 8 MiB image once base64-encoded and wrapped in JSON.
const fn default_max_body_bytes() -> usize {
    12 * 1024 * 1024
}

const fn default_true() -> bool {
    true
}

const fn default_max_requests() -> u32 {
    20
}

const fn default_window_seconds() -> u64 {
    60
}

fn default_openai_url() -> String {
    OPENAI_API_BASE.to_string()
}

fn default_youtube_url() -> String {
    YOUTUBE_API_BASE.to_string()
}

fn default_stripe_url() -> String {
    STRIPE_API_BASE.to_string()
}

/// Main configuration for the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// OpenAI model for structured generation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// OpenAI model for speech synthesis.
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Sampling temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout for each outbound provider call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Per-client rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Enable only behind a proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,

    /// Provider API roots, overridable for testing and proxies.
    #[serde(default)]
    pub providers: ProviderUrls,

    /// Browser origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            chat_model: default_chat_model(),
            tts_model: default_tts_model(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            rate_limit: RateLimitConfig::default(),
            trust_proxy_headers: false,
            providers: ProviderUrls::default(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Loads `superfocus.json` from the current working directory, or
    /// defaults when it is absent.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            FocusError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `superfocus.json` from `dir`, or defaults when it is absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the validated defaults.
    ///
    /// # Errors
    ///
    /// `ConfigParseError` for unreadable files or invalid JSON,
    /// `ConfigValidationError` for out-of-range values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(FocusError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| FocusError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(FocusError::config_validation(
                "host must not be empty",
                "Set host to an address such as 127.0.0.1 or 0.0.0.0 in your superfocus.json",
            ));
        }

        if self.chat_model.trim().is_empty() || self.tts_model.trim().is_empty() {
            return Err(FocusError::config_validation(
                "chatModel and ttsModel must not be empty",
                "Remove them from your superfocus.json to use the defaults",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(FocusError::config_validation(
                format!("temperature must be between 0 and 2, got {}", self.temperature),
                "Set temperature to a value such as 0.4 in your superfocus.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(FocusError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your superfocus.json",
            ));
        }

        if self.max_body_bytes < 1024 {
            return Err(FocusError::config_validation(
                "maxBodyBytes must be at least 1024",
                "Leave room for an 8 MiB image: the default is 12582912",
            ));
        }

        if self.rate_limit.enabled
            && (self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0)
        {
            return Err(FocusError::config_validation(
                "rateLimit.maxRequests and rateLimit.windowSeconds must be greater than 0",
                "Set both to at least 1, or set rateLimit.enabled to false",
            ));
        }

        for (name, url) in [
            ("providers.openai", &self.providers.openai),
            ("providers.youtube", &self.providers.youtube),
            ("providers.stripe", &self.providers.stripe),
        ] {
            if !is_http_url(url) {
                return Err(FocusError::config_validation(
                    format!("{name} must be an http(s) URL, got '{url}'"),
                    format!("Fix or remove {name} in your superfocus.json"),
                ));
            }
        }

        for origin in &self.allowed_origins {
            if !is_http_url(origin) || HeaderValue::from_str(origin).is_err() {
                return Err(FocusError::config_validation(
                    format!("allowedOrigins entry '{origin}' is not a valid origin"),
                    "Use full origins such as https://app.superfocus.example",
                ));
            }
        }

        Ok(())
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Outbound call timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The fixed-window policy, or `None` when limiting is disabled.
    #[must_use]
    pub const fn rate_limit_policy(&self) -> Option<RateLimitPolicy> {
        if self.rate_limit.enabled {
            Some(RateLimitPolicy {
                max_requests: self.rate_limit.max_requests,
                window_secs: self.rate_limit.window_seconds,
            })
        } else {
            None
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Per-client rate limiting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Whether limiting is applied at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per client per window and endpoint group.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

/// API roots of the external providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUrls {
    /// OpenAI API root.
    #[serde(default = "default_openai_url")]
    pub openai: String,
    /// YouTube Data API root.
    #[serde(default = "default_youtube_url")]
    pub youtube: String,
    /// Stripe API root.
    #[serde(default = "default_stripe_url")]
    pub stripe: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            openai: default_openai_url(),
            youtube: default_youtube_url(),
            stripe: default_stripe_url(),
        }
    }
}

// ============================================================================
// Environment Secrets
// ============================================================================

/// Credentials and deployment URLs read from the environment.
///
/// Empty values count as unset.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `OPENAI_API_KEY`
    pub openai_api_key: Option<String>,
    /// `SUPABASE_URL`
    pub supabase_url: Option<String>,
    /// `SUPABASE_ANON_KEY`
    pub supabase_anon_key: Option<String>,
    /// `STRIPE_SECRET_KEY`
    pub stripe_secret_key: Option<String>,
    /// `YOUTUBE_API_KEY`
    pub youtube_api_key: Option<String>,
    /// `UPSTASH_REDIS_REST_URL`
    pub upstash_url: Option<String>,
    /// `UPSTASH_REDIS_REST_TOKEN`
    pub upstash_token: Option<String>,
    /// `SITE_URL`, falling back to `NEXT_PUBLIC_SITE_URL`
    pub site_url: Option<String>,
}

/// Whether one external service has what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Service name.
    pub name: &'static str,
    /// Environment variables it reads.
    pub env: &'static str,
    /// All of them are set.
    pub configured: bool,
    /// The service is needed for the core features.
    pub required: bool,
}

impl Environment {
    /// Reads the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            supabase_url: get("SUPABASE_URL"),
            supabase_anon_key: get("SUPABASE_ANON_KEY"),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            youtube_api_key: get("YOUTUBE_API_KEY"),
            upstash_url: get("UPSTASH_REDIS_REST_URL"),
            upstash_token: get("UPSTASH_REDIS_REST_TOKEN"),
            site_url: get("SITE_URL").or_else(|| get("NEXT_PUBLIC_SITE_URL")),
        }
    }

    /// Configuration state of every external service.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceStatus> {
        vec![
            ServiceStatus {
                name: "openai",
                env: "OPENAI_API_KEY",
                configured: self.openai_api_key.is_some(),
                required: true,
            },
            ServiceStatus {
                name: "supabase",
                env: "SUPABASE_URL, SUPABASE_ANON_KEY",
                configured: self.supabase_url.is_some() && self.supabase_anon_key.is_some(),
                required: true,
            },
            ServiceStatus {
                name: "stripe",
                env: "STRIPE_SECRET_KEY",
                configured: self.stripe_secret_key.is_some(),
                required: false,
            },
            ServiceStatus {
                name: "youtube",
                env: "YOUTUBE_API_KEY",
                configured: self.youtube_api_key.is_some(),
                required: false,
            },
            ServiceStatus {
                name: "upstash",
                env: "UPSTASH_REDIS_REST_URL, UPSTASH_REDIS_REST_TOKEN",
                configured: self.upstash_url.is_some() && self.upstash_token.is_some(),
                required: false,
            },
        ]
    }

    /// Names of required variables that are unset.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("OPENAI_API_KEY", self.openai_api_key.is_some()),
            ("SUPABASE_URL", self.supabase_url.is_some()),
            ("SUPABASE_ANON_KEY", self.supabase_anon_key.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| (!set).then_some(name))
        .collect()
    }

    /// Public site URL without a trailing slash.
    #[must_use]
    pub fn site_url(&self) -> String {
        self.site_url
            .as_deref()
            .unwrap_or(DEFAULT_SITE_URL)
            .trim_end_matches('/')
            .to_string()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Environment")
            .field("openai_api_key", &set(&self.openai_api_key))
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &set(&self.supabase_anon_key))
            .field("stripe_secret_key", &set(&self.stripe_secret_key))
            .field("youtube_api_key", &set(&self.youtube_api_key))
            .field("upstash_url", &self.upstash_url)
            .field("upstash_token", &set(&self.upstash_token))
            .field("site_url", &self.site_url)
            .finish()
    }
}
