//! Wire types shared by the chat orchestrator, the streaming endpoints, and
//! the session registry.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions injected by the server.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

impl ChatRole {
    /// Stable identifier used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One entry in a session's chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
    /// Citations attached to assistant messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceEntry>>,
}

/// A cited document location surfaced to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Wire discriminator carried by history and completion payloads. Absent
    /// on streamed source frames, where the frame's own tag plays this role.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Originating file name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// One-based page number, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Display string, e.g. `[Source: physics.pdf, Page: 12]`.
    pub reference: String,
    /// Public URL of the stored document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
}

/// A scored chunk returned by vector retrieval.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Chunk text stored at indexing time.
    pub text: String,
    /// Originating file name.
    pub source: Option<String>,
    /// One-based page number.
    pub page: Option<u32>,
    /// Public URL of the stored document.
    pub storage_url: Option<String>,
    /// Similarity score reported by the store.
    pub score: f32,
}

impl RetrievedChunk {
    /// Render the `[Source: file, Page: n]` citation string for this chunk.
    pub fn reference(&self) -> String {
        match (&self.source, self.page) {
            (Some(source), Some(page)) => format!("[Source: {source}, Page: {page}]"),
            (Some(source), None) => format!("[Source: {source}]"),
            _ => "[Source: Unknown]".to_string(),
        }
    }

    /// Build the citation entry announced before streaming begins.
    pub fn source_entry(&self) -> SourceEntry {
        SourceEntry {
            kind: None,
            source: self.source.clone(),
            page: self.page,
            reference: self.reference(),
            storage_url: self.storage_url.clone(),
        }
    }
}

impl SourceEntry {
    /// Attach the `source` discriminator expected on history and completion
    /// payloads, leaving an existing discriminator untouched.
    pub fn tagged(mut self) -> Self {
        self.kind.get_or_insert_with(|| "source".to_string());
        self
    }
}

/// One protocol frame emitted on the SSE stream.
///
/// The `type` tag mirrors the event vocabulary clients dispatch on.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    /// A citation announced before any generated text.
    Source {
        /// The cited location.
        #[serde(flatten)]
        entry: SourceEntry,
    },
    /// An incremental slice of generated text.
    Content {
        /// Text delta.
        content: String,
        /// Always `assistant`.
        role: ChatRole,
        /// Collection the answer was grounded in.
        collection: String,
    },
    /// Final frame carrying the assembled answer.
    Complete {
        /// Full answer text.
        content: String,
        /// All citations for the answer.
        sources: Vec<SourceEntry>,
        /// Collection the answer was grounded in.
        collection: String,
        /// Persona the answer was shaped for, on persona endpoints.
        #[serde(skip_serializing_if = "Option::is_none")]
        persona: Option<String>,
        /// Transcription of the submitted audio, when audio was provided.
        #[serde(skip_serializing_if = "Option::is_none")]
        transcribed_text: Option<String>,
    },
    /// Terminal error frame; nothing follows it.
    Error {
        /// Human-readable failure description.
        error: String,
    },
}

/// Items produced by the orchestrator's frame stream.
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// A JSON protocol frame.
    Frame(StreamFrame),
    /// The literal `[DONE]` sentinel closing a successful stream.
    Done,
}
