//! Prompt templates, personas, and context formatting.

use std::str::FromStr;

use crate::chat::types::RetrievedChunk;

/// Audience the persona endpoint shapes its answers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// UX designers and researchers.
    Ux,
    /// Sales and customer-facing staff.
    Sales,
    /// Engineers wanting depth and precision.
    Technical,
    /// Managers wanting outcomes and trade-offs.
    Management,
    /// No audience shaping.
    Default,
}

impl Persona {
    /// All accepted persona identifiers, used in validation errors.
    pub const ACCEPTED: [&'static str; 5] = ["ux", "sales", "technical", "management", "default"];

    /// Stable identifier used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Ux => "ux",
            Persona::Sales => "sales",
            Persona::Technical => "technical",
            Persona::Management => "management",
            Persona::Default => "default",
        }
    }

    fn audience_instruction(self) -> &'static str {
        match self {
            Persona::Ux => {
                "Answer for a UX practitioner: focus on user impact, workflows, and concrete examples."
            }
            Persona::Sales => {
                "Answer for a sales audience: focus on benefits and plain-language value, avoid jargon."
            }
            Persona::Technical => {
                "Answer for a technical audience: be precise, include definitions, formulas, and caveats."
            }
            Persona::Management => {
                "Answer for a management audience: lead with outcomes, risks, and trade-offs, keep it brief."
            }
            Persona::Default => "Answer clearly for a general audience.",
        }
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ux" => Ok(Persona::Ux),
            "sales" => Ok(Persona::Sales),
            "technical" => Ok(Persona::Technical),
            "management" => Ok(Persona::Management),
            "default" | "" => Ok(Persona::Default),
            other => Err(format!(
                "Unknown persona '{other}'. Accepted values: {}",
                Persona::ACCEPTED.join(", ")
            )),
        }
    }
}

/// Requested length of a collection summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLength {
    /// 2–3 sentences.
    Short,
    /// One paragraph.
    Medium,
    /// Several paragraphs with section detail.
    Detailed,
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "short" => Ok(SummaryLength::Short),
            "medium" | "" => Ok(SummaryLength::Medium),
            "detailed" => Ok(SummaryLength::Detailed),
            other => Err(format!(
                "Unknown summary length '{other}'. Accepted values: short, medium, detailed"
            )),
        }
    }
}

impl SummaryLength {
    fn instruction(self) -> &'static str {
        match self {
            SummaryLength::Short => "Write a short summary of two to three sentences.",
            SummaryLength::Medium => "Write a one-paragraph summary covering the main topics.",
            SummaryLength::Detailed => {
                "Write a detailed summary of several paragraphs, covering each major topic in turn."
            }
        }
    }
}

fn language_instruction(language: &str) -> &'static str {
    if language.trim().eq_ignore_ascii_case("de") {
        "Antworte ausschließlich auf Deutsch."
    } else {
        "Answer in English."
    }
}

/// Join retrieved chunks into numbered `Document excerpt N:` blocks.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!("Document excerpt {}:\n{}\n\n", index + 1, chunk.text));
    }
    context
}

/// System prompt for the plain retrieval-augmented tutoring path.
pub fn rag_system_prompt(language: &str, context: &str) -> String {
    format!(
        "You are a helpful tutor answering questions about textbook material. \
         Use only the document excerpts below to answer. If the excerpts do not \
         contain the answer, say so instead of guessing. {}\n\n\
         Document excerpts:\n{context}",
        language_instruction(language)
    )
}

/// System prompt for the persona-shaped path.
///
/// Asks the model to close with a `SOURCES:` section of bracketed citations;
/// the orchestrator strips that section and matches its lines against the
/// retrieved chunks.
pub fn persona_system_prompt(persona: Persona, language: &str, context: &str) -> String {
    format!(
        "You are a helpful tutor answering questions about textbook material. \
         {} Use only the document excerpts below. {}\n\
         End your answer with a line reading SOURCES: followed by one citation \
         per line in the form [Source: <file>, Page: <page>].\n\n\
         Document excerpts:\n{context}",
        persona.audience_instruction(),
        language_instruction(language)
    )
}

/// Prompt asking for a 3–4 word session name from recent history.
pub fn session_name_prompt(history_excerpt: &str) -> String {
    format!(
        "Suggest a short name of three to four words for the following chat \
         session. Reply with the name only, no quotes, no punctuation.\n\n\
         Conversation:\n{history_excerpt}"
    )
}

/// Prompt for a buffered collection summary of the requested length.
pub fn collection_summary_prompt(length: SummaryLength, context: &str) -> String {
    format!(
        "You are summarizing the contents of a textbook collection. {}\n\n\
         Collection excerpts:\n{context}",
        length.instruction()
    )
}

/// Prompt for the ingestion-time 3–5 sentence document summary.
pub fn document_summary_prompt(context: &str) -> String {
    format!(
        "Summarize the following document excerpts in three to five sentences. \
         Focus on the subject matter and intended audience.\n\n{context}"
    )
}

/// Prompt for the ingestion-time FAQ, requesting strict JSON output.
pub fn faq_prompt(context: &str) -> String {
    format!(
        "Generate between five and twelve frequently asked questions with \
         answers about the following document excerpts. Respond with a JSON \
         array only, where each element is an object with the keys \
         \"question\" and \"answer\".\n\n{context}"
    )
}
