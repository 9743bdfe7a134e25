//! SuperFocus Core
//!
//! Contracts, validation, structured generation and the feature flows of the
//! SuperFocus tutoring service, plus the traits the HTTP layer uses to reach
//! external services.

pub mod contracts;
pub mod error;
pub mod flows;
pub mod generation;
pub mod media;
pub mod safe_search;
pub mod services;
pub mod validate;

pub use contracts::{
    Flashcard, HomeworkFeedbackRequest, HomeworkFeedbackResponse, HomeworkPlanRequest,
    HomeworkPlanResponse, HomeworkTask, MaterialType, PlanEntry, PortalSessionRequest,
    PortalSessionResponse, QuizQuestion, SpeechRequest, SpeechToTextRequest, SpeechToTextResponse,
    TestPrepRequest, TestPrepResponse, Video, VideoSearchQuery, VideoSearchResponse, Voice,
};
pub use error::{FieldIssue, FocusError, ProviderErrorKind, Result};
pub use generation::{
    generate_structured, ChatMessage, ChatModel, ContentPart, GenerationRequest, MessageContent,
    ResponseSchema, Role, StructuredOutput,
};
pub use media::{DataUri, DataUriError, MediaKind, MAX_MEDIA_BYTES};
pub use services::{
    AudioStream, AuthUser, AuthVerifier, BillingPortal, ProfileStore, RateLimitDecision,
    RateLimitPolicy, RateLimiter, ServiceProbe, SpeechSynthesizer, VideoSearch,
};
pub use validate::{Issues, Validate};
