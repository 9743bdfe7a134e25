//! OpenAI chat completions (structured output) and speech synthesis.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use superfocus_core::{
    AudioStream, ChatMessage, ChatModel, ContentPart, FocusError, GenerationRequest,
    MessageContent, ProviderErrorKind, Result, Role, SpeechRequest, SpeechSynthesizer,
};
use tracing::{debug, info, warn};

use crate::http::{self, check_status, read_json, send_within, transport_error};

const PROVIDER: &str = "openai";

/// Default API root.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Connection and model settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model used for structured generation.
    pub chat_model: String,
    /// Model used for speech synthesis.
    pub tts_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Timeout for a whole chat completion; for speech it bounds the wait
    /// for the audio to start.
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            temperature: 0.4,
            timeout: http::DEFAULT_TIMEOUT,
        }
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImage<'a> },
    InputAudio { input_audio: WireAudio<'a> },
}

#[derive(Serialize)]
struct WireImage<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct WireAudio<'a> {
    data: &'a str,
    format: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'static str,
    speed: f32,
    response_format: &'static str,
}

const fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn wire_message(message: &ChatMessage) -> WireMessage<'_> {
    let content = match &message.content {
        MessageContent::Text(text) => WireContent::Text(text),
        MessageContent::Parts(parts) => WireContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => WirePart::Text { text },
                    ContentPart::ImageUrl { url } => WirePart::ImageUrl {
                        image_url: WireImage { url },
                    },
                    ContentPart::InputAudio { data, format } => WirePart::InputAudio {
                        input_audio: WireAudio { data, format },
                    },
                })
                .collect(),
        ),
    };
    WireMessage {
        role: role_name(message.role),
        content,
    }
}

// ============================================================================
// Client
// ============================================================================

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    speech_client: Client,
    api_key: String,
    settings: OpenAiSettings,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Creates a client for `api_key`.
    pub fn new(api_key: impl Into<String>, settings: OpenAiSettings) -> Result<Self> {
        Ok(Self {
            client: http::build_client(settings.timeout)?,
            speech_client: http::build_streaming_client(settings.timeout)?,
            api_key: api_key.into(),
            settings: OpenAiSettings {
                base_url: http::base_url(&settings.base_url),
                ..settings
            },
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.settings.chat_model,
            messages: request.messages.iter().map(wire_message).collect(),
            temperature: self.settings.temperature,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &request.schema.name,
                    schema: &request.schema.schema,
                    strict: false,
                },
            },
        };

        debug!(
            model = %self.settings.chat_model,
            schema = %request.schema.name,
            "Sending chat completion"
        );

        let response = self
            .client
            .post(self.endpoint("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let completion: ChatCompletionResponse = read_json(PROVIDER, response).await?;

        if let Some(usage) = &completion.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion finished"
            );
        }

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(FocusError::provider(
                PROVIDER,
                ProviderErrorKind::InvalidResponse,
                "response contained no choices",
            ));
        };
        if let Some(refusal) = choice.message.refusal {
            warn!(schema = %request.schema.name, "Model refused the request");
            return Err(FocusError::schema_mismatch(
                &request.schema.name,
                format!("model refused: {refusal}"),
            ));
        }
        choice.message.content.ok_or_else(|| {
            FocusError::schema_mismatch(&request.schema.name, "reply had no content")
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioStream> {
        let body = SpeechBody {
            model: &self.settings.tts_model,
            input: &request.text,
            voice: request.voice.as_str(),
            speed: request.speed,
            response_format: "mp3",
        };

        debug!(
            model = %self.settings.tts_model,
            voice = request.voice.as_str(),
            chars = request.text.chars().count(),
            "Starting speech synthesis"
        );

        let request = self
            .speech_client
            .post(self.endpoint("/audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_within(PROVIDER, self.settings.timeout, request).await?;
        let response = check_status(PROVIDER, response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| transport_error(PROVIDER, &e)))
            .boxed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use superfocus_core::{ResponseSchema, Voice};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            "sk-test",
            OpenAiSettings {
                base_url: server.base_url(),
                ..OpenAiSettings::default()
            },
        )
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            messages: vec![
                ChatMessage::system("Be kind."),
                ChatMessage::user_parts(vec![
                    ContentPart::Text {
                        text: "Subject: Math".to_string(),
                    },
                    ContentPart::ImageUrl {
                        url: "data:image/png;base64,AAAA".to_string(),
                    },
                ]),
            ],
            schema: ResponseSchema {
                name: "homework_feedback".to_string(),
                schema: json!({"type": "object"}),
            },
        }
    }

    #[test]
    fn test_wire_message_shapes_parts() {
        let message = request().messages[1].clone();
        let json = serde_json::to_value(wire_message(&message)).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0], json!({"type": "text", "text": "Subject: Math"}));
        assert_eq!(
            json["content"][1],
            json!({"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}})
        );
    }

    #[test]
    fn test_wire_message_plain_text() {
        let json = serde_json::to_value(wire_message(&ChatMessage::system("hi"))).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "hi"}));
    }

    #[tokio::test]
    async fn test_complete_returns_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "{\"feedback\":\"ok\"}"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
                }));
            })
            .await;

        let reply = client(&server).complete(&request()).await.unwrap();
        assert_eq!(reply, r#"{"feedback":"ok"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_maps_auth_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401)
                    .json_body(json!({"error": {"message": "Incorrect API key provided"}}));
            })
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            FocusError::Provider {
                kind: ProviderErrorKind::Authentication,
                ref message,
                ..
            } if message == "Incorrect API key provided"
        ));
    }

    #[tokio::test]
    async fn test_complete_refusal_is_schema_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": null, "refusal": "I can't help with that."}}]
                }));
            })
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, FocusError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            FocusError::Provider {
                kind: ProviderErrorKind::InvalidResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_synthesize_streams_audio_bytes() {
        let server = MockServer::start_async().await;
        let audio: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
        let expected = audio.clone();
        server
            .mock_async(move |when, then| {
                when.method(POST).path("/audio/speech");
                then.status(200)
                    .header("content-type", "audio/mpeg")
                    .body(audio.clone());
            })
            .await;

        let speech = SpeechRequest {
            text: "Hello there".to_string(),
            voice: Voice::Nova,
            speed: 1.0,
        };
        let mut stream = client(&server).synthesize(&speech).await.unwrap();
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_synthesize_error_before_stream() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/audio/speech");
                then.status(500).body("upstream exploded");
            })
            .await;

        let speech = SpeechRequest {
            text: "Hello".to_string(),
            voice: Voice::Alloy,
            speed: 1.0,
        };
        let Err(err) = client(&server).synthesize(&speech).await else {
            unreachable!("500 must fail before streaming");
        };
        assert!(matches!(
            err,
            FocusError::Provider {
                kind: ProviderErrorKind::Server,
                ..
            }
        ));
    }

    fn client_with_timeout(server: &MockServer, timeout: Duration) -> OpenAiClient {
        OpenAiClient::new(
            "sk-test",
            OpenAiSettings {
                base_url: server.base_url(),
                timeout,
                ..OpenAiSettings::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_body_outlives_request_timeout() {
        let server = MockServer::start_async().await;
        let audio: Vec<u8> = (0u8..=255).cycle().take(1024).collect();
        let expected = audio.clone();
        server
            .mock_async(move |when, then| {
                when.method(POST).path("/audio/speech");
                then.status(200)
                    .header("content-type", "audio/mpeg")
                    .body(audio.clone());
            })
            .await;

        let speech = SpeechRequest {
            text: "A long story".to_string(),
            voice: Voice::Fable,
            speed: 1.0,
        };
        let timeout = Duration::from_millis(200);
        let mut stream = client_with_timeout(&server, timeout)
            .synthesize(&speech)
            .await
            .unwrap();

        // A slow listener keeps reading well after the timeout has passed.
        tokio::time::sleep(timeout * 3).await;
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_synthesize_times_out_waiting_for_headers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/audio/speech");
                then.status(200)
                    .delay(Duration::from_millis(800))
                    .body("late");
            })
            .await;

        let speech = SpeechRequest {
            text: "Hello".to_string(),
            voice: Voice::Echo,
            speed: 1.0,
        };
        let Err(err) = client_with_timeout(&server, Duration::from_millis(100))
            .synthesize(&speech)
            .await
        else {
            unreachable!("headers arrived after the timeout");
        };
        assert!(matches!(
            err,
            FocusError::Provider {
                kind: ProviderErrorKind::Network,
                ..
            }
        ));
    }
}
