//! HTTP API for the SuperFocus service.
//!
//! Every feature endpoint runs the same pipeline before doing any work:
//! rate-limit check, bearer authentication (where required), then body
//! validation. Only then is a provider called.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Configuration and uptime report
//! - `GET /api/health/supabase` - Auth backend connectivity
//! - `POST /api/stt` - Speech-to-text (not implemented, answers 501)
//! - `POST /api/tts` - Streamed speech synthesis
//! - `GET /api/youtube-search` - Child-safe video search
//! - `POST /api/create-portal-session` - Billing portal link
//! - `POST /api/homework/feedback` - Feedback on a homework photo
//! - `POST /api/homework/plan` - Homework plan
//! - `POST /api/test-prep` - Quiz or flashcards
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use superfocus_server::{create_router, AppState, Config, Environment};
//!
//! # async fn example() -> superfocus_core::Result<()> {
//! let state = AppState::from_environment(Config::default(), Environment::from_env())?;
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use superfocus_core::{AuthUser, FocusError, Validate};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, warn};

use crate::config::{Config, Environment};
use crate::services::Services;
use crate::{handlers, health};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Secrets and deployment URLs.
    pub environment: Environment,
    /// External service handles.
    pub services: Services,
    /// When the state was created, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Creates state from explicit services.
    #[must_use]
    pub fn new(config: Config, environment: Environment, services: Services) -> Self {
        Self {
            config,
            environment,
            services,
            started_at: Instant::now(),
        }
    }

    /// Creates state with real clients for every configured service.
    pub fn from_environment(
        config: Config,
        environment: Environment,
    ) -> superfocus_core::Result<Self> {
        let services = Services::from_environment(&config, &environment)?;
        Ok(Self::new(config, environment, services))
    }

    /// Counts the request against `scope` and rejects it when over the limit.
    ///
    /// A failing counter store is logged and the request is let through.
    pub async fn admit(&self, scope: &'static str, caller: &Caller) -> Result<(), ApiError> {
        let Some(limiter) = &self.services.rate_limiter else {
            return Ok(());
        };
        match limiter.check(scope, &caller.identity).await {
            Ok(decision) => {
                if !decision.allowed {
                    warn!(
                        scope,
                        identity = %caller.identity,
                        limit = decision.limit,
                        "Rate limit exceeded"
                    );
                }
                decision.into_result()?;
                Ok(())
            }
            Err(e) => {
                warn!(scope, error = %e, "Rate limiter unavailable; allowing request");
                Ok(())
            }
        }
    }

    /// Resolves the caller's bearer token to a user.
    pub async fn authenticate(&self, caller: &Caller) -> Result<AuthUser, ApiError> {
        let token = caller
            .bearer()
            .ok_or_else(|| FocusError::unauthorized("missing bearer token"))?;
        let user = self.services.auth.verify(token).await?;
        debug!(user_id = %user.id, "Caller authenticated");
        Ok(user)
    }
}

// ============================================================================
// Caller
// ============================================================================

/// Who is calling: a rate-limit identity and the presented bearer token.
#[derive(Clone)]
pub struct Caller {
    /// Client address used as the rate-limit identity.
    pub identity: String,
    bearer: Option<String>,
}

impl Caller {
    /// Builds a caller from request headers and the socket peer, if known.
    ///
    /// Forwarding headers name the client only when `trust_proxy_headers`
    /// is set.
    #[must_use]
    pub fn from_headers(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trust_proxy_headers: bool,
    ) -> Self {
        let forwarded = if trust_proxy_headers {
            header_str(headers, "x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .or_else(|| header_str(headers, "x-real-ip"))
        } else {
            None
        };
        let identity = forwarded
            .map(str::to_string)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "anonymous".to_string());

        let bearer = header_str(headers, header::AUTHORIZATION.as_str())
            .and_then(|v| {
                v.get(..7)
                    .filter(|scheme| scheme.eq_ignore_ascii_case("bearer "))
                    .map(|_| v[7..].trim())
            })
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Self { identity, bearer }
    }

    /// The presented bearer token, if any.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("identity", &self.identity)
            .field("has_bearer", &self.bearer.is_some())
            .finish()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(
            &parts.headers,
            peer,
            state.config.trust_proxy_headers,
        ))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response body returned on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Structured detail, when there is any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error type for API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A domain error.
    Focus(FocusError),
    /// The body could not be read (too large, wrong encoding).
    Body {
        /// Status chosen by the body extractor.
        status: StatusCode,
        /// Its explanation.
        message: String,
    },
}

impl From<FocusError> for ApiError {
    fn from(err: FocusError) -> Self {
        Self::Focus(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

fn classify(err: &FocusError) -> (StatusCode, String, Option<serde_json::Value>) {
    use serde_json::json;

    match err {
        FocusError::InvalidRequest { issues } => (
            StatusCode::BAD_REQUEST,
            "Invalid request".to_string(),
            Some(json!({ "issues": issues })),
        ),
        FocusError::Unauthorized { .. } => {
            (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None)
        }
        FocusError::RateLimited {
            limit,
            reset_after_secs,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests".to_string(),
            Some(json!({ "limit": limit, "retryAfterSecs": reset_after_secs })),
        ),
        FocusError::NotFound { resource } => {
            (StatusCode::NOT_FOUND, format!("{resource} not found"), None)
        }
        FocusError::Provider { provider, .. } => (
            StatusCode::BAD_GATEWAY,
            "Upstream service error".to_string(),
            Some(json!({
                "kind": "provider",
                "provider": provider,
                "retryable": err.is_transient(),
            })),
        ),
        FocusError::SchemaMismatch { schema, .. } => (
            StatusCode::BAD_GATEWAY,
            "The AI response could not be understood".to_string(),
            Some(json!({
                "kind": "schema_mismatch",
                "schema": schema,
                "retryable": true,
            })),
        ),
        FocusError::NotImplemented { feature, reason } => (
            StatusCode::NOT_IMPLEMENTED,
            format!("{feature} is not implemented"),
            Some(json!({ "reason": reason })),
        ),
        FocusError::ServiceNotConfigured { service, .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{service} is not configured"),
            None,
        ),
        FocusError::ConfigParseError { .. }
        | FocusError::ConfigValidationError { .. }
        | FocusError::Io(_)
        | FocusError::Json(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
            None,
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Focus(err) => {
                let (status, message, details) = classify(&err);
                if status.is_server_error() {
                    error!(status = status.as_u16(), error = %err, "Request failed");
                } else {
                    debug!(status = status.as_u16(), error = %err, "Request rejected");
                }

                let body = Json(ErrorResponse {
                    error: message,
                    details,
                });
                let mut response = (status, body).into_response();
                if let FocusError::RateLimited {
                    reset_after_secs, ..
                } = err
                {
                    response
                        .headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from(reset_after_secs));
                }
                response
            }
            Self::Body { status, message } => {
                debug!(status = status.as_u16(), message = %message, "Request body rejected");
                let body = Json(ErrorResponse {
                    error: message,
                    details: None,
                });
                (status, body).into_response()
            }
        }
    }
}

/// Decodes and validates a JSON body.
pub fn parse_body<T: DeserializeOwned + Validate>(body: &[u8]) -> Result<T, ApiError> {
    let value: T = serde_json::from_slice(body)
        .map_err(|e| FocusError::invalid("body", e.to_string()))?;
    value.validate()?;
    Ok(value)
}

// ============================================================================
// Router Setup
// ============================================================================

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Creates the HTTP router with all API endpoints.
///
/// An axum `Router` configured with:
/// - All API routes under `/api`
/// - A body limit from `maxBodyBytes`
/// - CORS for the configured origins (any when none are listed)
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = state.config.max_body_bytes;

    let api_routes = Router::new()
        .route("/health", get(health::handle_health))
        .route("/health/supabase", get(health::handle_supabase_health))
        .route("/stt", post(handlers::handle_stt))
        .route("/tts", post(handlers::handle_tts))
        .route("/youtube-search", get(handlers::handle_youtube_search))
        .route(
            "/create-portal-session",
            post(handlers::handle_create_portal_session),
        )
        .route("/homework/feedback", post(handlers::handle_homework_feedback))
        .route("/homework/plan", post(handlers::handle_homework_plan))
        .route("/test-prep", post(handlers::handle_test_prep));

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

async fn handle_not_found() -> ApiError {
    FocusError::not_found("route").into()
}

// ============================================================================
// Tests
// ============================================================================
