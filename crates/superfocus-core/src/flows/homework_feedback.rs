//! Feedback on a photographed homework page.

use tracing::info;

use crate::contracts::{HomeworkFeedbackRequest, HomeworkFeedbackResponse};
use crate::error::Result;
use crate::generation::{generate_structured, ChatMessage, ChatModel, ContentPart};
use crate::validate::Validate;

use super::TUTOR_PREAMBLE;

const INSTRUCTIONS: &str = "Look at the student's homework photo. Point out what they did well, \
then explain any mistakes step by step without simply giving away final answers. \
Set needsIllustration to true only when a simple diagram would clearly help, and name that concept in topic.";

/// Builds the conversation for a feedback request.
pub fn build_messages(request: &HomeworkFeedbackRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!("{TUTOR_PREAMBLE}\n\n{INSTRUCTIONS}")),
        ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: format!(
                    "Subject: {}. Please review my homework.",
                    request.subject.trim()
                ),
            },
            ContentPart::ImageUrl {
                url: request.image.trim().to_string(),
            },
        ]),
    ]
}

/// Generates feedback for a homework photo.
pub async fn homework_feedback(
    model: &dyn ChatModel,
    request: &HomeworkFeedbackRequest,
) -> Result<HomeworkFeedbackResponse> {
    request.validate()?;

    let mut response: HomeworkFeedbackResponse =
        generate_structured(model, build_messages(request)).await?;

    if response
        .topic
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        response.topic = None;
    }

    info!(
        subject = %request.subject,
        needs_illustration = response.needs_illustration,
        "Homework feedback generated"
    );
    Ok(response)
}
