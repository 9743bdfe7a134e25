//! Speech-to-text.
//!
//! No hosted transcription service is wired in yet, so this flow fails with
//! `NotImplemented` for every input. It never returns an empty transcript.
//! Request shape checks belong to the HTTP layer.

use tracing::warn;

use crate::contracts::{SpeechToTextRequest, SpeechToTextResponse};
use crate::error::{FocusError, Result};

/// Feature name reported in the `NotImplemented` error.
pub const FEATURE: &str = "speech-to-text";

/// Transcribes a recording. Always fails with `NotImplemented`.
#[allow(clippy::unused_async)]
pub async fn speech_to_text(request: &SpeechToTextRequest) -> Result<SpeechToTextResponse> {
    warn!(
        feature = FEATURE,
        audio_chars = request.audio.len(),
        "Transcription requested but no service is available"
    );
    Err(FocusError::not_implemented(
        FEATURE,
        "no hosted transcription service is configured",
    ))
}
