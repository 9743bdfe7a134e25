//! Structured generation: one model call whose reply must decode into a
//! declared Rust type.
//!
//! Feature flows describe *what* answer they need by naming an output type
//! implementing [`StructuredOutput`]; [`ChatModel`] implementations decide
//! *how* to talk to a provider. [`generate_structured`] joins the two and is
//! the only call path flows use.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FocusError, Result};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole exchange.
    System,
    /// Content supplied on behalf of the student.
    User,
    /// A previous model turn.
    Assistant,
}

/// One piece of a multi-part message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// An image by URL; data URIs are accepted.
    ImageUrl {
        /// `https://` URL or `data:image/...;base64,...`.
        url: String,
    },
    /// Base64 audio embedded in the message.
    InputAudio {
        /// Base64 payload without the `data:` prefix.
        data: String,
        /// Container format, e.g. `wav` or `mp3`.
        format: String,
    },
}

/// Body of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// A single text body.
    Text(String),
    /// Mixed text and media.
    Parts(Vec<ContentPart>),
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: Role,
    /// What they said.
    pub content: MessageContent,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A text-only user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message made of several parts.
    #[must_use]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    /// Concatenated text of the message, ignoring media parts.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// JSON Schema describing the expected reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Schema name sent to the provider (`[a-zA-Z0-9_-]`).
    pub name: String,
    /// The JSON Schema document.
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    /// Derives the schema for `T`.
    pub fn of<T: StructuredOutput>() -> Result<Self> {
        let root = schemars::schema_for!(T);
        Ok(Self {
            name: T::NAME.to_string(),
            schema: serde_json::to_value(root)?,
        })
    }
}

/// A provider request: conversation plus the reply schema.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Ordered conversation, system prompt first.
    pub messages: Vec<ChatMessage>,
    /// Shape the reply must take.
    pub schema: ResponseSchema,
}

/// A hosted language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends the conversation and returns the raw text of the reply.
    ///
    /// Implementations make exactly one outbound call and do not retry.
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;
}

/// An output type a model can be asked to produce.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Schema name used in provider requests and error messages.
    const NAME: &'static str;

    /// Semantic checks that the type system cannot express.
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Asks `model` for a reply shaped like `T` and validates it.
///
/// # Errors
///
/// - `InvalidRequest` if `messages` is empty (no call is made).
/// - Whatever the model returns for provider failures.
/// - `SchemaMismatch` if the reply does not decode into `T` or fails
///   [`StructuredOutput::check`].
pub async fn generate_structured<T: StructuredOutput>(
    model: &dyn ChatModel,
    messages: Vec<ChatMessage>,
) -> Result<T> {
    if messages.is_empty() {
        return Err(FocusError::invalid(
            "messages",
            "at least one message is required",
        ));
    }

    let request = GenerationRequest {
        messages,
        schema: ResponseSchema::of::<T>()?,
    };
    debug!(
        schema = T::NAME,
        messages = request.messages.len(),
        "Requesting structured generation"
    );

    let raw = model.complete(&request).await?;
    parse_reply::<T>(&raw)
}

/// Decodes a raw model reply into `T`.
pub fn parse_reply<T: StructuredOutput>(raw: &str) -> Result<T> {
    let body = strip_code_fence(raw);
    let value: T = serde_json::from_str(body).map_err(|e| {
        warn!(schema = T::NAME, error = %e, "Model reply did not decode");
        FocusError::schema_mismatch(T::NAME, e.to_string())
    })?;
    value.check().map_err(|reason| {
        warn!(schema = T::NAME, reason = %reason, "Model reply failed checks");
        FocusError::schema_mismatch(T::NAME, reason)
    })?;
    Ok(value)
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the info string (e.g. "json") on the opening line.
    match rest.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('{') => body.trim(),
        _ => rest.trim(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted [`ChatModel`] for flow tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies with queued strings and records every request.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String>>>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedModel {
        pub fn replying(reply: impl Into<String>) -> Self {
            let model = Self::default();
            model.push(Ok(reply.into()));
            model
        }

        pub fn push(&self, reply: Result<String>) {
            if let Ok(mut replies) = self.replies.lock() {
                replies.push_back(reply);
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().map_or(0, |r| r.len())
        }

        pub fn last_request(&self) -> Option<GenerationRequest> {
            self.requests.lock().ok().and_then(|r| r.last().cloned())
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &GenerationRequest) -> Result<String> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            self.replies
                .lock()
                .ok()
                .and_then(|mut r| r.pop_front())
                .unwrap_or_else(|| {
                    Err(FocusError::provider(
                        "scripted",
                        crate::ProviderErrorKind::Other,
                        "no reply queued",
                    ))
                })
        }
    }
}
