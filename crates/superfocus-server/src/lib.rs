//! SuperFocus Server
//!
//! HTTP API for the SuperFocus tutoring app: configuration, service wiring,
//! rate limiting, authentication and the feature endpoints.

pub mod api;
pub mod config;
pub mod handlers;
pub mod health;
pub mod services;

#[cfg(test)]
mod testing;

pub use api::{create_router, parse_body, ApiError, AppState, Caller, ErrorResponse};
pub use config::{
    Config, Environment, ProviderUrls, RateLimitConfig, ServiceStatus, CONFIG_FILE_NAME,
    DEFAULT_SITE_URL,
};
pub use health::{DependencyHealth, HealthResponse};
pub use services::Services;
