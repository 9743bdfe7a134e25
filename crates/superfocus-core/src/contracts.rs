//! Request and response contracts for every SuperFocus feature.
//!
//! Wire JSON uses camelCase. Request types implement [`Validate`]; types a
//! model produces implement [`StructuredOutput`] so their JSON Schema can be
//! sent to the provider and their semantics checked on the way back.

use std::ops::RangeInclusive;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::generation::StructuredOutput;
use crate::media::MediaKind;
use crate::validate::{Issues, Validate};

/// Bounds on the number of test-prep items per request.
pub const ITEM_COUNT: RangeInclusive<u8> = 1..=10;

/// Options per quiz question.
pub const QUIZ_OPTIONS: usize = 4;

/// Maximum length for subject/topic style labels.
pub const MAX_LABEL_CHARS: usize = 200;

/// Maximum length for a student's name.
pub const MAX_NAME_CHARS: usize = 100;

/// Bounds on the number of tasks in one homework plan.
pub const PLAN_TASKS: RangeInclusive<usize> = 1..=20;

/// Bounds on a single task's estimated minutes.
pub const TASK_MINUTES: RangeInclusive<u32> = 1..=240;

// ============================================================================
// Homework Feedback
// ============================================================================

/// Request body for homework feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkFeedbackRequest {
    /// Photo of the homework as an `image/*` data URI.
    pub image: String,
    /// Subject label, e.g. "Math".
    pub subject: String,
}

impl Validate for HomeworkFeedbackRequest {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        issues.data_uri("image", &self.image, MediaKind::Image);
        issues.text("subject", &self.subject, MAX_LABEL_CHARS);
        issues.finish()
    }
}

/// Feedback on a homework photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkFeedbackResponse {
    /// Encouraging, student-facing feedback.
    pub feedback: String,
    /// Whether a supplementary illustration would help.
    pub needs_illustration: bool,
    /// Topic to illustrate, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl StructuredOutput for HomeworkFeedbackResponse {
    const NAME: &'static str = "homework_feedback";

    fn check(&self) -> std::result::Result<(), String> {
        if self.feedback.trim().is_empty() {
            return Err("feedback must not be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Homework Planning
// ============================================================================

/// One task the student has to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkTask {
    /// Subject label.
    pub subject: String,
    /// What the task covers.
    pub topic: String,
    /// The student's own time estimate.
    pub estimated_minutes: u32,
}

/// Request body for homework planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkPlanRequest {
    /// Name used to address the student.
    pub student_name: String,
    /// Tasks in the order the student listed them.
    pub tasks: Vec<HomeworkTask>,
}

impl Validate for HomeworkPlanRequest {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        issues.text("studentName", &self.student_name, MAX_NAME_CHARS);
        if !PLAN_TASKS.contains(&self.tasks.len()) {
            issues.push(
                "tasks",
                format!(
                    "must contain between {} and {} tasks",
                    PLAN_TASKS.start(),
                    PLAN_TASKS.end()
                ),
            );
        }
        for (i, task) in self.tasks.iter().enumerate() {
            issues.text(format!("tasks[{i}].subject"), &task.subject, MAX_LABEL_CHARS);
            issues.text(format!("tasks[{i}].topic"), &task.topic, MAX_LABEL_CHARS);
            issues.within(
                format!("tasks[{i}].estimatedMinutes"),
                task.estimated_minutes,
                &TASK_MINUTES,
            );
        }
        issues.finish()
    }
}

/// One scheduled block in a homework plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Subject label, copied from the task.
    pub subject: String,
    /// Topic, copied from the task.
    pub topic: String,
    /// Minutes to spend.
    pub minutes: u32,
    /// A short motivating note.
    pub encouragement: String,
}

/// A homework plan, one entry per input task, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkPlanResponse {
    /// Entries, aligned index-for-index with the request's tasks.
    pub plan: Vec<PlanEntry>,
    /// Overall summary addressed to the student.
    pub summary: String,
}

impl StructuredOutput for HomeworkPlanResponse {
    const NAME: &'static str = "homework_plan";

    fn check(&self) -> std::result::Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("summary must not be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Test Prep
// ============================================================================

/// Kind of study material to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    /// Multiple-choice questions.
    Quiz,
    /// Term/definition pairs.
    Flashcards,
}

impl std::fmt::Display for MaterialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiz => write!(f, "quiz"),
            Self::Flashcards => write!(f, "flashcards"),
        }
    }
}

/// Request body for test-prep generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPrepRequest {
    /// Subject label.
    pub subject: String,
    /// Topic to study.
    pub topic: String,
    /// Quiz or flashcards.
    #[serde(rename = "type")]
    pub material: MaterialType,
    /// Number of items, 1 to 10.
    pub count: u8,
}

impl Validate for TestPrepRequest {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        issues.text("subject", &self.subject, MAX_LABEL_CHARS);
        issues.text("topic", &self.topic, MAX_LABEL_CHARS);
        issues.within("count", self.count, &ITEM_COUNT);
        issues.finish()
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// The question text.
    pub question: String,
    /// Exactly four answer options.
    pub options: [String; QUIZ_OPTIONS],
    /// The correct option, verbatim.
    pub answer: String,
}

/// A term and its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    /// The term.
    pub term: String,
    /// Its definition.
    pub definition: String,
}

/// Model output for quiz generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuizOutput {
    /// Generated questions.
    pub questions: Vec<QuizQuestion>,
}

impl StructuredOutput for QuizOutput {
    const NAME: &'static str = "test_prep_quiz";

    fn check(&self) -> std::result::Result<(), String> {
        for (i, q) in self.questions.iter().enumerate() {
            if q.question.trim().is_empty() {
                return Err(format!("questions[{i}].question is empty"));
            }
            if q.answer.trim().is_empty() {
                return Err(format!("questions[{i}].answer is empty"));
            }
            if q.options.iter().any(|o| o.trim().is_empty()) {
                return Err(format!("questions[{i}] has an empty option"));
            }
        }
        Ok(())
    }
}

/// Model output for flashcard generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FlashcardOutput {
    /// Generated cards.
    pub cards: Vec<Flashcard>,
}

impl StructuredOutput for FlashcardOutput {
    const NAME: &'static str = "test_prep_flashcards";

    fn check(&self) -> std::result::Result<(), String> {
        for (i, card) in self.cards.iter().enumerate() {
            if card.term.trim().is_empty() || card.definition.trim().is_empty() {
                return Err(format!("cards[{i}] has an empty term or definition"));
            }
        }
        Ok(())
    }
}

/// Test-prep material, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestPrepResponse {
    /// Multiple-choice questions.
    Quiz {
        /// Exactly `count` questions.
        questions: Vec<QuizQuestion>,
    },
    /// Term/definition cards.
    Flashcards {
        /// Exactly `count` cards.
        cards: Vec<Flashcard>,
    },
}

impl TestPrepResponse {
    /// Number of generated items.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Quiz { questions } => questions.len(),
            Self::Flashcards { cards } => cards.len(),
        }
    }

    /// Returns `true` if nothing was generated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Speech
// ============================================================================

/// Request body for speech-to-text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechToTextRequest {
    /// Recording as an `audio/*` data URI.
    pub audio: String,
}

impl Validate for SpeechToTextRequest {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        issues.data_uri("audio", &self.audio, MediaKind::Audio);
        issues.finish()
    }
}

/// Transcript of a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechToTextResponse {
    /// The recognized text.
    pub transcript: String,
}

/// Maximum characters per synthesis request.
pub const MAX_SPEECH_CHARS: usize = 4096;

/// Allowed playback speed multipliers.
pub const SPEECH_SPEED: RangeInclusive<f32> = 0.25..=4.0;

/// Voices offered by the synthesis provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    /// Neutral (default).
    #[default]
    Alloy,
    /// Echo.
    Echo,
    /// Fable.
    Fable,
    /// Onyx.
    Onyx,
    /// Nova.
    Nova,
    /// Shimmer.
    Shimmer,
}

impl Voice {
    /// Provider identifier for the voice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }
}

const fn default_speed() -> f32 {
    1.0
}

/// Request body for text-to-speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    /// Text to read aloud.
    pub text: String,
    /// Voice to use.
    #[serde(default)]
    pub voice: Voice,
    /// Playback speed multiplier.
    #[serde(default = "default_speed")]
    pub speed: f32,
}

impl Validate for SpeechRequest {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        issues.text("text", &self.text, MAX_SPEECH_CHARS);
        issues.within("speed", self.speed, &SPEECH_SPEED);
        issues.finish()
    }
}

// ============================================================================
// Video Search
// ============================================================================

/// Bounds on the number of videos returned.
pub const VIDEO_RESULTS: RangeInclusive<u32> = 1..=25;

/// Default number of videos returned.
pub const DEFAULT_VIDEO_RESULTS: u32 = 10;

/// Query string for the safe video search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchQuery {
    /// Free-text search.
    #[serde(default)]
    pub q: String,
    /// Optional subject to bias the search.
    #[serde(default)]
    pub subject: Option<String>,
    /// How many videos to return.
    #[serde(default)]
    pub max_results: Option<u32>,
}

impl VideoSearchQuery {
    /// Requested result count, defaulted.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.max_results.unwrap_or(DEFAULT_VIDEO_RESULTS)
    }
}

impl Validate for VideoSearchQuery {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        issues.text("q", &self.q, MAX_LABEL_CHARS);
        issues.optional_text("subject", self.subject.as_deref(), MAX_LABEL_CHARS);
        issues.within("maxResults", self.limit(), &VIDEO_RESULTS);
        issues.finish()
    }
}

/// One video search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Provider video id.
    pub video_id: String,
    /// Title.
    pub title: String,
    /// Description snippet.
    pub description: String,
    /// Thumbnail URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Name of the publishing channel.
    pub channel_title: String,
    /// Publication timestamp as reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// Response body for the safe video search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSearchResponse {
    /// Allow-listed videos, at most `maxResults`.
    pub videos: Vec<Video>,
}

// ============================================================================
// Billing
// ============================================================================

/// Request body for opening the billing portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalSessionRequest {
    /// Where the portal sends the user back to.
    #[serde(default)]
    pub return_url: Option<String>,
}

impl Validate for PortalSessionRequest {
    fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        if let Some(url) = &self.return_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                issues.push("returnUrl", "must be an absolute http(s) URL");
            }
        }
        issues.finish()
    }
}

/// Response body with the billing portal URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSessionResponse {
    /// One-time portal URL.
    pub url: String,
}
