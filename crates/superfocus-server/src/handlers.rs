//! Feature endpoint handlers.
//!
//! Each handler admits the caller against its rate-limit scope, then
//! authenticates (everything except video search), then validates the body.
//! Providers are only reached once all three pass.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, Query, State},
    http::{header, Uri},
    response::{IntoResponse, Response},
    Json,
};
use superfocus_core::{
    flows, safe_search, FocusError, HomeworkFeedbackRequest, HomeworkFeedbackResponse,
    HomeworkPlanRequest, HomeworkPlanResponse, PortalSessionRequest, PortalSessionResponse,
    SpeechRequest, SpeechToTextRequest, SpeechToTextResponse, TestPrepRequest, TestPrepResponse,
    Validate, VideoSearchQuery, VideoSearchResponse,
};
use tracing::info;

use crate::api::{parse_body, ApiError, AppState, Caller};

/// Rate-limit scopes, one per endpoint family.
pub mod scope {
    /// Speech-to-text.
    pub const STT: &str = "stt";
    /// Text-to-speech.
    pub const TTS: &str = "tts";
    /// Video search.
    pub const YOUTUBE: &str = "youtube";
    /// Billing portal.
    pub const BILLING: &str = "billing";
    /// Homework feedback and planning.
    pub const HOMEWORK: &str = "homework";
    /// Quiz and flashcard generation.
    pub const TEST_PREP: &str = "test-prep";
}

type Shared = State<Arc<AppState>>;
type RawBody = Result<Bytes, BytesRejection>;

/// `POST /api/stt`
pub async fn handle_stt(
    State(state): Shared,
    caller: Caller,
    body: RawBody,
) -> Result<Json<SpeechToTextResponse>, ApiError> {
    state.admit(scope::STT, &caller).await?;
    state.authenticate(&caller).await?;
    let request: SpeechToTextRequest = parse_body(&body?)?;
    let response = flows::speech_to_text(&request).await?;
    Ok(Json(response))
}

/// `POST /api/tts`
///
/// Streams `audio/mpeg` as the provider produces it.
pub async fn handle_tts(
    State(state): Shared,
    caller: Caller,
    body: RawBody,
) -> Result<Response, ApiError> {
    state.admit(scope::TTS, &caller).await?;
    let user = state.authenticate(&caller).await?;
    let request: SpeechRequest = parse_body(&body?)?;

    let audio = state.services.speech.synthesize(&request).await?;
    info!(
        user_id = %user.id,
        chars = request.text.chars().count(),
        voice = request.voice.as_str(),
        "Streaming speech"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from_stream(audio),
    )
        .into_response())
}

/// `GET /api/youtube-search?q=..&subject=..&maxResults=..`
///
/// Open to anonymous callers; only allow-listed channels come back.
pub async fn handle_youtube_search(
    State(state): Shared,
    caller: Caller,
    uri: Uri,
) -> Result<Json<VideoSearchResponse>, ApiError> {
    state.admit(scope::YOUTUBE, &caller).await?;
    let Query(query) = Query::<VideoSearchQuery>::try_from_uri(&uri)
        .map_err(|e| FocusError::invalid("query", e.body_text()))?;
    query.validate()?;

    let limit = query.limit();
    let search = safe_search::build_search_query(&query.q, query.subject.as_deref());
    let fetched = state
        .services
        .videos
        .search(&search, safe_search::fetch_size(limit))
        .await?;
    let fetched_count = fetched.len();

    let mut videos = safe_search::filter_safe(fetched);
    videos.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    info!(
        fetched = fetched_count,
        returned = videos.len(),
        "Video search filtered"
    );
    Ok(Json(VideoSearchResponse { videos }))
}

/// `POST /api/create-portal-session`
///
/// The body is optional; without `returnUrl` the user lands on the dashboard.
pub async fn handle_create_portal_session(
    State(state): Shared,
    caller: Caller,
    body: RawBody,
) -> Result<Json<PortalSessionResponse>, ApiError> {
    state.admit(scope::BILLING, &caller).await?;
    let user = state.authenticate(&caller).await?;
    let body = body?;
    let request: PortalSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        PortalSessionRequest::default()
    } else {
        parse_body(&body)?
    };

    let customer = state
        .services
        .profiles
        .billing_customer(&user)
        .await?
        .ok_or_else(|| FocusError::not_found("billing customer"))?;
    let return_url = request
        .return_url
        .unwrap_or_else(|| format!("{}/dashboard", state.environment.site_url()));

    let url = state
        .services
        .billing
        .create_session(&customer, &return_url)
        .await?;
    Ok(Json(PortalSessionResponse { url }))
}

/// `POST /api/homework/feedback`
pub async fn handle_homework_feedback(
    State(state): Shared,
    caller: Caller,
    body: RawBody,
) -> Result<Json<HomeworkFeedbackResponse>, ApiError> {
    state.admit(scope::HOMEWORK, &caller).await?;
    state.authenticate(&caller).await?;
    let request: HomeworkFeedbackRequest = parse_body(&body?)?;
    let response = flows::homework_feedback(state.services.model.as_ref(), &request).await?;
    Ok(Json(response))
}

/// `POST /api/homework/plan`
pub async fn handle_homework_plan(
    State(state): Shared,
    caller: Caller,
    body: RawBody,
) -> Result<Json<HomeworkPlanResponse>, ApiError> {
    state.admit(scope::HOMEWORK, &caller).await?;
    state.authenticate(&caller).await?;
    let request: HomeworkPlanRequest = parse_body(&body?)?;
    let response = flows::homework_plan(state.services.model.as_ref(), &request).await?;
    Ok(Json(response))
}

/// `POST /api/test-prep`
pub async fn handle_test_prep(
    State(state): Shared,
    caller: Caller,
    body: RawBody,
) -> Result<Json<TestPrepResponse>, ApiError> {
    state.admit(scope::TEST_PREP, &caller).await?;
    state.authenticate(&caller).await?;
    let request: TestPrepRequest = parse_body(&body?)?;
    let response = flows::test_prep(state.services.model.as_ref(), &request).await?;
    Ok(Json(response))
}

// ============================================================================
// Tests
// ============================================================================
