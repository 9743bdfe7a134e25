//! Error types for the SuperFocus service.
//!
//! This module defines the error taxonomy shared by every layer: request
//! validation, authentication, rate limiting, upstream provider calls,
//! structured-output checks, and configuration loading.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A specialized `Result` type for SuperFocus operations.
pub type Result<T> = std::result::Result<T, FocusError>;

/// A single field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted path of the offending field (e.g. `tasks[2].topic`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldIssue {
    /// Creates a new issue for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur while serving a SuperFocus request.
///
/// Variants map one-to-one onto the HTTP error classes the API exposes.
#[derive(Debug, thiserror::Error)]
pub enum FocusError {
    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The request body or query failed validation.
    #[error("Invalid request: {}", summarize(issues))]
    InvalidRequest {
        /// Every problem found, in field order.
        issues: Vec<FieldIssue>,
    },

    /// The caller did not present a valid session.
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the session was rejected.
        reason: String,
    },

    /// The caller exceeded the configured request budget.
    #[error("Rate limit exceeded ({limit} requests per window), retry in {reset_after_secs}s")]
    RateLimited {
        /// Requests allowed per window.
        limit: u32,
        /// Seconds until the current window resets.
        reset_after_secs: u64,
    },

    /// A resource the request depends on does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        /// Human-readable description of the missing resource.
        resource: String,
    },

    // ========================================================================
    // Upstream Errors
    // ========================================================================
    /// An external provider (model, payments, search, auth) failed.
    #[error("{provider} error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    Provider {
        /// Name of the provider (e.g. "openai", "stripe").
        provider: String,
        /// Classification of the failure.
        kind: ProviderErrorKind,
        /// Detail from the provider; logged, never shown to end users.
        message: String,
        /// Actionable suggestion for operators.
        suggestion: String,
    },

    /// The model replied, but not in the shape the feature requires.
    #[error("Model output did not match schema '{schema}': {reason}")]
    SchemaMismatch {
        /// Name of the expected output schema.
        schema: String,
        /// Why the output was rejected.
        reason: String,
    },

    /// The feature exists in the API but has no backing service.
    #[error("{feature} is not implemented: {reason}")]
    NotImplemented {
        /// The feature that was requested.
        feature: String,
        /// What is missing.
        reason: String,
    },

    /// A required external service has no credentials configured.
    #[error("Service not configured: {service}\n\nSuggestion: Set the {env_hint} environment variable(s)")]
    ServiceNotConfigured {
        /// The unconfigured service.
        service: String,
        /// Environment variables that would enable it.
        env_hint: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your superfocus.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // General Errors
    // ========================================================================
    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn summarize(issues: &[FieldIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Categories of provider errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// The provider throttled us.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues or timeouts.
    Network,
    /// The provider answered with something we could not read.
    InvalidResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl ProviderErrorKind {
    /// Classifies an HTTP status returned by a provider.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the provider API key in the environment",
            Self::RateLimit => "Wait and retry, or raise the provider quota",
            Self::Server => "Retry later; the provider may be experiencing issues",
            Self::Network => "Check outbound network connectivity and the configured base URL",
            Self::InvalidResponse => "Check that the configured base URL points at the real API",
            Self::Other => "Check the provider's status page",
        }
    }
}

impl FocusError {
    /// Creates an `InvalidRequest` error with a single issue.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            issues: vec![FieldIssue::new(field, message)],
        }
    }

    /// Creates an `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a `Provider` error with automatic suggestion based on error kind.
    #[must_use]
    pub fn provider(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            kind,
            message: message.into(),
            suggestion: kind.suggestion().to_string(),
        }
    }

    /// Creates a `SchemaMismatch` error.
    #[must_use]
    pub fn schema_mismatch(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `NotImplemented` error.
    #[must_use]
    pub fn not_implemented(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ServiceNotConfigured` error.
    #[must_use]
    pub fn not_configured(service: impl Into<String>, env_hint: impl Into<String>) -> Self {
        Self::ServiceNotConfigured {
            service: service.into(),
            env_hint: env_hint.into(),
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns `true` if re-issuing the same request later may succeed.
    ///
    /// Nothing in the service retries on its own; this is surfaced to clients.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider {
                kind: ProviderErrorKind::RateLimit
                    | ProviderErrorKind::Server
                    | ProviderErrorKind::Network,
                ..
            } | Self::RateLimited { .. }
                | Self::SchemaMismatch { .. }
        )
    }
}
