//! Quiz and flashcard generation for test preparation.

use tracing::info;

use crate::contracts::{
    FlashcardOutput, MaterialType, QuizOutput, QuizQuestion, TestPrepRequest, TestPrepResponse,
};
use crate::error::{FocusError, Result};
use crate::generation::{generate_structured, ChatMessage, ChatModel, StructuredOutput};
use crate::validate::Validate;

use super::TUTOR_PREAMBLE;

const INSTRUCTIONS: &str = "Create study material for an upcoming test. \
Stay strictly on the requested topic, keep every item age-appropriate, and avoid trick questions.";

/// Renders the feature-specific request line.
pub fn build_prompt(request: &TestPrepRequest) -> String {
    let subject = request.subject.trim();
    let topic = request.topic.trim();
    match request.material {
        MaterialType::Quiz => format!(
            "Create {} multiple-choice quiz questions about {topic} in {subject}. \
Each question must have exactly 4 options and an answer copied exactly from one of the options.",
            request.count
        ),
        MaterialType::Flashcards => format!(
            "Create {} flashcards about {topic} in {subject}. \
Each card has a short term and a one-sentence definition.",
            request.count
        ),
    }
}

/// Builds the conversation for a test-prep request.
pub fn build_messages(request: &TestPrepRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!("{TUTOR_PREAMBLE}\n\n{INSTRUCTIONS}")),
        ChatMessage::user(build_prompt(request)),
    ]
}

/// Generates exactly `request.count` quiz questions or flashcards.
pub async fn test_prep(
    model: &dyn ChatModel,
    request: &TestPrepRequest,
) -> Result<TestPrepResponse> {
    request.validate()?;
    let count = usize::from(request.count);
    let messages = build_messages(request);

    let response = match request.material {
        MaterialType::Quiz => {
            let output: QuizOutput = generate_structured(model, messages).await?;
            let mut questions = exact_count::<QuizOutput, _>(output.questions, count)?;
            for (i, question) in questions.iter_mut().enumerate() {
                canonicalize_answer(question).map_err(|reason| {
                    FocusError::schema_mismatch(
                        QuizOutput::NAME,
                        format!("questions[{i}]: {reason}"),
                    )
                })?;
            }
            TestPrepResponse::Quiz { questions }
        }
        MaterialType::Flashcards => {
            let output: FlashcardOutput = generate_structured(model, messages).await?;
            TestPrepResponse::Flashcards {
                cards: exact_count::<FlashcardOutput, _>(output.cards, count)?,
            }
        }
    };

    info!(
        material = %request.material,
        count = response.len(),
        "Test prep generated"
    );
    Ok(response)
}

/// Truncates surplus items; too few items is a schema mismatch.
fn exact_count<S: StructuredOutput, T>(mut items: Vec<T>, count: usize) -> Result<Vec<T>> {
    if items.len() < count {
        return Err(FocusError::schema_mismatch(
            S::NAME,
            format!("expected {count} items, got {}", items.len()),
        ));
    }
    items.truncate(count);
    Ok(items)
}

/// Makes `answer` equal to one of the options verbatim.
///
/// Answers that differ from an option only in case or surrounding whitespace
/// are replaced by the option text.
fn canonicalize_answer(question: &mut QuizQuestion) -> std::result::Result<(), String> {
    if question.options.contains(&question.answer) {
        return Ok(());
    }
    let wanted = question.answer.trim().to_lowercase();
    let matched = question
        .options
        .iter()
        .find(|option| option.trim().to_lowercase() == wanted)
        .cloned();
    match matched {
        Some(option) => {
            question.answer = option;
            Ok(())
        }
        None => Err(format!("answer '{}' is not one of the options", question.answer)),
    }
}
