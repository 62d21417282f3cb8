//! Language-model client speaking the OpenAI chat, streaming, and audio
//! transcription wire formats.

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::pin::Pin;
use thiserror::Error;

use crate::chat::types::ChatRole;
use crate::config::get_config;

/// Errors raised by language-model calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected model response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response did not match the expected shape.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// One turn of a model conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    /// Turn author.
    pub role: ChatRole,
    /// Turn text.
    pub content: String,
}

impl ChatTurn {
    /// Build a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Boxed stream of generated text deltas.
pub type TextDeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Interface implemented by generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Start a streamed completion, yielding text deltas as they arrive.
    async fn stream_completion(&self, turns: Vec<ChatTurn>) -> Result<TextDeltaStream, LlmError>;

    /// Run a buffered completion and return the full response text.
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, LlmError>;
}

/// Interface implemented by audio transcription backends.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio clip to text.
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible API.
pub struct OpenAiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

impl OpenAiClient {
    /// Construct a client from the process configuration.
    pub fn new() -> Result<Self, LlmError> {
        let config = get_config();
        let client = Client::builder().user_agent("studyrag/0.1").build()?;
        Ok(Self {
            client,
            base_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.chat_model.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn send_chat(
        &self,
        turns: &[ChatTurn],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": turns,
                "stream": stream,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Chat completion request failed");
            return Err(error);
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Outcome of parsing one line of a provider's event stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamLine {
    /// A text delta to forward.
    Delta(String),
    /// The provider's end-of-stream marker.
    Done,
    /// A keep-alive, empty delta, or other line to skip.
    Skip,
}

/// Parse one `data:` line of an OpenAI-style event stream.
pub(crate) fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(content) if !content.is_empty() => StreamLine::Delta(content),
            _ => StreamLine::Skip,
        },
        Err(err) => {
            tracing::debug!(error = %err, "Skipping unparseable stream line");
            StreamLine::Skip
        }
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn stream_completion(&self, turns: Vec<ChatTurn>) -> Result<TextDeltaStream, LlmError> {
        tracing::debug!(model = %self.model, turns = turns.len(), "Starting streamed completion");
        let response = self.send_chat(&turns, true).await?;

        let stream = async_stream::try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    match parse_stream_line(&line) {
                        StreamLine::Delta(delta) => yield delta,
                        StreamLine::Done => break 'outer,
                        StreamLine::Skip => {}
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, turns = turns.len(), "Running buffered completion");
        let response = self.send_chat(&turns, false).await?;
        let payload: ChatCompletionResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response carried no choices".into()))
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, LlmError> {
        tracing::debug!(bytes = audio.len(), filename, "Transcribing audio");
        let part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Transcription request failed");
            return Err(error);
        }

        let payload: TranscriptionResponse = response.json().await?;
        Ok(payload.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(base_url: String) -> OpenAiClient {
        OpenAiClient {
            client: Client::builder()
                .user_agent("studyrag-test")
                .build()
                .expect("client"),
            base_url,
            api_key: "test-key".into(),
            model: "gpt-3.5-turbo-16k".into(),
        }
    }

    #[test]
    fn stream_line_extracts_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_stream_line(line), StreamLine::Delta("Hel".into()));
    }

    #[test]
    fn stream_line_detects_done_marker() {
        assert_eq!(parse_stream_line("data: [DONE]"), StreamLine::Done);
    }

    #[test]
    fn stream_line_skips_blanks_and_empty_deltas() {
        assert_eq!(parse_stream_line(""), StreamLine::Skip);
        assert_eq!(parse_stream_line(": keep-alive"), StreamLine::Skip);
        let empty = r#"data: {"choices":[{"delta":{}}]}"#;
        assert_eq!(parse_stream_line(empty), StreamLine::Skip);
    }

    #[test]
    fn stream_line_skips_garbage_without_failing() {
        assert_eq!(parse_stream_line("data: {not json"), StreamLine::Skip);
    }

    #[tokio::test]
    async fn buffered_completion_returns_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .json_body_partial(r#"{"stream": false}"#);
                then.status(200).json_body(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "F = ma"}}]
                }));
            })
            .await;

        let answer = client(format!("{}/v1", server.base_url()))
            .complete(vec![ChatTurn::user("State Newton's second law.")])
            .await
            .expect("completion");

        mock.assert();
        assert_eq!(answer, "F = ma");
    }

    #[tokio::test]
    async fn streamed_completion_yields_deltas_in_order() {
        let server = MockServer::start_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"F = \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ma\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .json_body_partial(r#"{"stream": true}"#);
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(body);
            })
            .await;

        let mut stream = client(format!("{}/v1", server.base_url()))
            .stream_completion(vec![ChatTurn::user("State Newton's second law.")])
            .await
            .expect("stream start");

        let mut deltas = Vec::new();
        while let Some(delta) = stream.next().await {
            deltas.push(delta.expect("delta"));
        }
        assert_eq!(deltas, vec!["F = ".to_string(), "ma".to_string()]);
    }

    #[tokio::test]
    async fn provider_error_status_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let err = client(format!("{}/v1", server.base_url()))
            .complete(vec![ChatTurn::user("hello")])
            .await
            .expect_err("must fail");
        match err {
            LlmError::UnexpectedStatus { status, body } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transcription_returns_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/audio/transcriptions");
                then.status(200)
                    .json_body(serde_json::json!({"text": "what is inertia"}));
            })
            .await;

        let text = client(format!("{}/v1", server.base_url()))
            .transcribe(vec![1, 2, 3], "question.webm")
            .await
            .expect("transcription");

        mock.assert();
        assert_eq!(text, "what is inertia");
    }
}
