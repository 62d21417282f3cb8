//! Best-effort summary and FAQ generation for freshly ingested collections.
//!
//! Insight generation never fails an ingestion job: each prompt gets one
//! budget-reduced retry, FAQ parsing falls back to a line heuristic when the
//! model ignores the JSON instruction, and total failure degrades to
//! placeholder output.

use serde::{Deserialize, Serialize};

use crate::llm::Generator;
use crate::prompts::{document_summary_prompt, faq_prompt};

/// Character budgets applied to one insight attempt.
#[derive(Debug, Clone, Copy)]
struct InsightBudget {
    context_chars: usize,
    summary_chars: usize,
    answer_chars: usize,
}

const PRIMARY_BUDGET: InsightBudget = InsightBudget {
    context_chars: 14_000,
    summary_chars: 350,
    answer_chars: 120,
};

const REDUCED_BUDGET: InsightBudget = InsightBudget {
    context_chars: 4_000,
    summary_chars: 200,
    answer_chars: 60,
};

/// One generated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    /// The question.
    pub question: String,
    /// The answer.
    pub answer: String,
}

/// Outcome of parsing a FAQ response.
#[derive(Debug, PartialEq)]
pub enum FaqParse {
    /// The model produced valid JSON.
    Json(Vec<FaqItem>),
    /// JSON parsing failed; items were recovered by line splitting.
    Heuristic(Vec<FaqItem>),
}

impl FaqParse {
    /// The recovered items, however they were parsed.
    pub fn into_items(self) -> Vec<FaqItem> {
        match self {
            FaqParse::Json(items) | FaqParse::Heuristic(items) => items,
        }
    }
}

/// Summary and FAQ attached to a completed ingestion task.
#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    /// 3–5 sentence collection summary.
    pub summary: String,
    /// Generated FAQ items, possibly empty.
    pub faq: Vec<FaqItem>,
}

/// Generate insights from the chunks of one ingestion job.
pub async fn generate_insights(generator: &dyn Generator, chunks: &[String]) -> Insights {
    let summary = match complete_with_retry(generator, |budget| {
        let context = truncate_chars(&chunks.join("\n\n"), budget.context_chars);
        format!(
            "{} Keep the summary under {} characters.",
            document_summary_prompt(&context),
            budget.summary_chars
        )
    })
    .await
    {
        Some(text) => text.trim().to_string(),
        None => {
            tracing::warn!("Summary generation failed on both budgets, using placeholder");
            "Summary unavailable.".to_string()
        }
    };

    let faq = match complete_with_retry(generator, |budget| {
        let context = truncate_chars(&chunks.join("\n\n"), budget.context_chars);
        format!(
            "{} Keep each answer under {} characters.",
            faq_prompt(&context),
            budget.answer_chars
        )
    })
    .await
    {
        Some(raw) => {
            let parse = parse_faq(&raw);
            if let FaqParse::Heuristic(items) = &parse {
                tracing::warn!(items = items.len(), "FAQ response was not JSON, used line fallback");
            }
            parse.into_items()
        }
        None => {
            tracing::warn!("FAQ generation failed on both budgets");
            Vec::new()
        }
    };

    Insights { summary, faq }
}

async fn complete_with_retry<F>(generator: &dyn Generator, build_prompt: F) -> Option<String>
where
    F: Fn(InsightBudget) -> String,
{
    let prompt = build_prompt(PRIMARY_BUDGET);
    match generator
        .complete(vec![crate::llm::ChatTurn::user(prompt)])
        .await
    {
        Ok(text) => return Some(text),
        Err(err) => {
            tracing::warn!(error = %err, "Insight prompt failed, retrying with reduced budget");
        }
    }

    let prompt = build_prompt(REDUCED_BUDGET);
    match generator
        .complete(vec![crate::llm::ChatTurn::user(prompt)])
        .await
    {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!(error = %err, "Reduced-budget insight prompt failed");
            None
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Parse a FAQ response, falling back to line splitting on invalid JSON.
pub fn parse_faq(raw: &str) -> FaqParse {
    let cleaned = strip_code_fences(raw);
    if let Ok(items) = serde_json::from_str::<Vec<FaqItem>>(cleaned) {
        let items = items
            .into_iter()
            .filter(|item| !item.question.trim().is_empty())
            .take(12)
            .collect();
        return FaqParse::Json(items);
    }
    FaqParse::Heuristic(heuristic_faq(cleaned))
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string on the opening fence, then the closing fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Recover question/answer pairs from free-form text.
///
/// A line containing `?` starts a new question; following lines up to the
/// next question form its answer. Items without an answer are dropped.
fn heuristic_faq(text: &str) -> Vec<FaqItem> {
    let mut items: Vec<FaqItem> = Vec::new();
    let mut current: Option<FaqItem> = None;

    for line in text.lines() {
        let line = line
            .trim()
            .trim_start_matches(['-', '*'])
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
            .trim();
        if line.is_empty() {
            continue;
        }
        if line.contains('?') {
            if let Some(item) = current.take()
                && !item.answer.is_empty()
            {
                items.push(item);
            }
            current = Some(FaqItem {
                question: strip_label(line, "Q:").to_string(),
                answer: String::new(),
            });
        } else if let Some(item) = current.as_mut() {
            let answer_line = strip_label(line, "A:");
            if !item.answer.is_empty() {
                item.answer.push(' ');
            }
            item.answer.push_str(answer_line);
        }
    }
    if let Some(item) = current
        && !item.answer.is_empty()
    {
        items.push(item);
    }
    items.truncate(12);
    items
}

fn strip_label<'a>(line: &'a str, label: &str) -> &'a str {
    line.strip_prefix(label).map(str::trim).unwrap_or(line)
}
