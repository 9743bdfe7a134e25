//! SuperFocus Providers
//!
//! HTTP clients for the managed services SuperFocus delegates to: OpenAI,
//! YouTube, Supabase, Stripe and Upstash. Each implements a trait from
//! `superfocus_core::services`.

pub mod http;
pub mod openai;
pub mod rate_limit;
pub mod stripe;
pub mod supabase;
pub mod unconfigured;
pub mod upstash;
pub mod youtube;

pub use openai::{OpenAiClient, OpenAiSettings, OPENAI_API_BASE};
pub use rate_limit::MemoryRateLimiter;
pub use stripe::{StripeClient, STRIPE_API_BASE};
pub use supabase::SupabaseClient;
pub use unconfigured::Unconfigured;
pub use upstash::UpstashRateLimiter;
pub use youtube::{YouTubeClient, YOUTUBE_API_BASE};
