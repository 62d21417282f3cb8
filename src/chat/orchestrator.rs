//! The canonical retrieval/streaming path behind every chat endpoint.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;

use crate::chat::ChatError;
use crate::chat::citations::{resolve_citations, strip_sources_section};
use crate::chat::retrieval::Retriever;
use crate::chat::types::{ChatMessage, ChatRole, SourceEntry, StreamFrame, StreamItem};
use crate::llm::{ChatTurn, Generator, Transcriber};
use crate::prompts::{Persona, format_context, persona_system_prompt, rag_system_prompt};
use crate::registry::SessionRegistry;

/// Number of trailing history messages replayed into the model conversation.
const HISTORY_WINDOW: usize = 6;

/// Body shared by the streaming chat endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Collection to retrieve context from.
    pub collection: String,
    /// Text question; optional when audio is supplied.
    #[serde(default)]
    pub question: Option<String>,
    /// Audio payload: a base64 data URI, raw base64, or a fetchable URL.
    #[serde(default)]
    pub audio: Option<String>,
    /// Response language code; `de` selects German, anything else English.
    #[serde(default = "default_language")]
    pub language: String,
    /// Session to append the exchange to, when present.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Prior turns supplied by a stateless client, oldest first. Used only
    /// when the session carries no history of its own.
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    /// Persona identifier; only honored by the persona endpoint.
    #[serde(default)]
    pub persona: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// A validated request, ready to stream.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// The resolved question string.
    pub question: String,
    /// Transcription of the submitted audio, when audio was provided.
    pub transcribed: Option<String>,
    /// Parsed persona, when the endpoint runs in persona mode.
    pub persona: Option<Persona>,
}

/// Orchestrates retrieval, prompting, generation, and the SSE frame protocol.
#[derive(Clone)]
pub struct ChatOrchestrator {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    transcriber: Arc<dyn Transcriber>,
    sessions: SessionRegistry,
    http: reqwest::Client,
}

impl ChatOrchestrator {
    /// Compose an orchestrator from its collaborators.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        transcriber: Arc<dyn Transcriber>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            retriever,
            generator,
            transcriber,
            sessions,
            http: reqwest::Client::new(),
        }
    }

    /// Validate a request and resolve its question string.
    ///
    /// Runs entirely before any stream opens, so validation and transcription
    /// failures surface as plain HTTP errors rather than stream frames. When
    /// both a question and audio are supplied, the transcription is appended
    /// to the question.
    pub async fn prepare(
        &self,
        request: &ChatRequest,
        persona_mode: bool,
    ) -> Result<PreparedQuery, ChatError> {
        if request.collection.trim().is_empty() {
            return Err(ChatError::InvalidInput(
                "Collection name must not be empty".into(),
            ));
        }

        let persona = if persona_mode {
            let raw = request.persona.as_deref().unwrap_or("default");
            Some(raw.parse::<Persona>().map_err(ChatError::InvalidInput)?)
        } else {
            None
        };

        let transcribed = match request.audio.as_deref() {
            Some(audio) if !audio.trim().is_empty() => {
                let (bytes, filename) = self.resolve_audio_bytes(audio).await?;
                let text = self.transcriber.transcribe(bytes, &filename).await?;
                tracing::info!(chars = text.len(), "Transcribed audio question");
                Some(text)
            }
            _ => None,
        };

        let question = match (
            request
                .question
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty()),
            transcribed.as_deref(),
        ) {
            (Some(question), Some(transcription)) => format!("{question} {transcription}"),
            (Some(question), None) => question.to_string(),
            (None, Some(transcription)) => transcription.to_string(),
            (None, None) => {
                return Err(ChatError::InvalidInput(
                    "Either a question or an audio payload must be provided".into(),
                ));
            }
        };

        Ok(PreparedQuery {
            question,
            transcribed,
            persona,
        })
    }

    /// Produce the frame stream for a prepared request.
    ///
    /// Protocol: one `source` frame per retrieved chunk, then `content`
    /// deltas, then exactly one `complete` frame, then the `[DONE]` sentinel.
    /// Any failure mid-stream yields a terminal `error` frame instead; the
    /// stream never ends without one of the two terminals.
    pub fn stream_frames(
        self,
        request: ChatRequest,
        prepared: PreparedQuery,
        top_k: usize,
    ) -> impl Stream<Item = StreamItem> + Send {
        async_stream::stream! {
            let collection = request.collection.clone();

            let chunks = match self
                .retriever
                .search(&collection, &prepared.question, top_k)
                .await
            {
                Ok(chunks) => chunks,
                Err(err) => {
                    tracing::error!(collection = %collection, error = %err, "Retrieval failed");
                    yield StreamItem::Frame(StreamFrame::Error { error: err.to_string() });
                    return;
                }
            };

            let announced: Vec<SourceEntry> =
                chunks.iter().map(|chunk| chunk.source_entry()).collect();
            for entry in &announced {
                yield StreamItem::Frame(StreamFrame::Source { entry: entry.clone() });
            }

            let context = format_context(&chunks);
            let system = match prepared.persona {
                Some(persona) => persona_system_prompt(persona, &request.language, &context),
                None => rag_system_prompt(&request.language, &context),
            };

            let mut turns = vec![ChatTurn::system(system)];
            let history = request
                .session_id
                .as_deref()
                .and_then(|id| self.sessions.get(id))
                .map(|session| session.chat_history)
                .filter(|history| !history.is_empty())
                .unwrap_or_else(|| request.chat_history.clone());
            let skip = history.len().saturating_sub(HISTORY_WINDOW);
            for message in history.into_iter().skip(skip) {
                turns.push(ChatTurn {
                    role: message.role,
                    content: message.content,
                });
            }
            turns.push(ChatTurn::user(prepared.question.clone()));

            let mut deltas = match self.generator.stream_completion(turns).await {
                Ok(deltas) => deltas,
                Err(err) => {
                    tracing::error!(collection = %collection, error = %err, "Generation failed to start");
                    yield StreamItem::Frame(StreamFrame::Error { error: err.to_string() });
                    return;
                }
            };

            let mut full_text = String::new();
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(delta) => {
                        full_text.push_str(&delta);
                        yield StreamItem::Frame(StreamFrame::Content {
                            content: delta,
                            role: ChatRole::Assistant,
                            collection: collection.clone(),
                        });
                    }
                    Err(err) => {
                        tracing::error!(collection = %collection, error = %err, "Generation failed mid-stream");
                        yield StreamItem::Frame(StreamFrame::Error { error: err.to_string() });
                        return;
                    }
                }
            }

            let (content, sources) = match prepared.persona {
                Some(_) => {
                    let (answer, lines) = strip_sources_section(&full_text);
                    let resolved = if lines.is_empty() {
                        announced.clone()
                    } else {
                        resolve_citations(&lines, &chunks)
                    };
                    (answer, resolved)
                }
                None => (full_text.clone(), announced.clone()),
            };
            let sources: Vec<SourceEntry> =
                sources.into_iter().map(SourceEntry::tagged).collect();

            if let Some(session_id) = request.session_id.as_deref() {
                self.record_exchange(session_id, &prepared.question, &content, &sources);
            }

            tracing::info!(
                collection = %collection,
                sources = sources.len(),
                chars = content.len(),
                "Chat exchange complete"
            );
            yield StreamItem::Frame(StreamFrame::Complete {
                content,
                sources,
                collection,
                persona: prepared.persona.map(|p| p.as_str().to_string()),
                transcribed_text: prepared.transcribed.clone(),
            });
            yield StreamItem::Done;
        }
    }

    /// Best-effort history append; a missing session never fails the stream.
    fn record_exchange(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        sources: &[SourceEntry],
    ) {
        let appended = self.sessions.append_message(
            session_id,
            ChatMessage {
                role: ChatRole::User,
                content: question.to_string(),
                sources: None,
            },
        ) && self.sessions.append_message(
            session_id,
            ChatMessage {
                role: ChatRole::Assistant,
                content: answer.to_string(),
                sources: Some(sources.to_vec()),
            },
        );
        if !appended {
            tracing::warn!(session_id, "Session not found, exchange not recorded");
        }
    }

    async fn resolve_audio_bytes(&self, audio: &str) -> Result<(Vec<u8>, String), ChatError> {
        let audio = audio.trim();
        if audio.starts_with("http://") || audio.starts_with("https://") {
            let filename = audio
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .unwrap_or("audio.webm")
                .to_string();
            let response = self
                .http
                .get(audio)
                .send()
                .await
                .map_err(|err| ChatError::Audio(err.to_string()))?;
            if !response.status().is_success() {
                return Err(ChatError::Audio(format!(
                    "audio fetch returned {}",
                    response.status()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|err| ChatError::Audio(err.to_string()))?;
            return Ok((bytes.to_vec(), filename));
        }

        // base64 payload, possibly wrapped in a data URI
        let encoded = match audio.split_once(";base64,") {
            Some((_, encoded)) => encoded,
            None => audio,
        };
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|err| ChatError::Audio(format!("invalid base64 audio payload: {err}")))?;
        Ok((bytes, "audio.webm".to_string()))
    }
}
