//! Post-hoc citation extraction for persona answers.
//!
//! Persona prompts ask the model to close with a `SOURCES:` section of
//! bracketed `[Source: file, Page: n]` lines. The helpers here strip that
//! section off the answer and resolve each line against the chunks that were
//! actually retrieved.

use regex::Regex;
use std::sync::OnceLock;

use crate::chat::types::{RetrievedChunk, SourceEntry};

static CITATION_RE: OnceLock<Regex> = OnceLock::new();

fn citation_re() -> &'static Regex {
    CITATION_RE.get_or_init(|| {
        Regex::new(r"\[Source:\s*([^,\]]+?)\s*(?:,\s*Page:\s*(\d+)\s*)?\]")
            .expect("citation pattern compiles")
    })
}

/// Split a generated answer into body text and trailing citation lines.
///
/// The section starts at the last line beginning with `SOURCES:` or
/// `REFERENCES:` (case-insensitive). When no marker is present the whole
/// text is the answer and the line list is empty.
pub fn strip_sources_section(text: &str) -> (String, Vec<String>) {
    let mut marker_start = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let upper = trimmed.to_uppercase();
        if upper.starts_with("SOURCES:") || upper.starts_with("REFERENCES:") {
            marker_start = Some(offset);
        }
        offset += line.len();
    }

    let Some(start) = marker_start else {
        return (text.trim_end().to_string(), Vec::new());
    };

    let answer = text[..start].trim_end().to_string();
    let section = &text[start..];
    let lines = section
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    (answer, lines)
}

/// Parse a single citation line into `(file, page)`.
pub fn parse_citation(line: &str) -> Option<(String, Option<u32>)> {
    let captures = citation_re().captures(line)?;
    let file = captures.get(1)?.as_str().trim().to_string();
    let page = captures.get(2).and_then(|m| m.as_str().parse().ok());
    Some((file, page))
}

/// Resolve citation lines against retrieved chunks.
///
/// A line that names a retrieved file yields that chunk's metadata (the page
/// from the citation when present). A line that matches nothing is still
/// surfaced, marked unresolved, so the client sees everything the model cited.
pub fn resolve_citations(lines: &[String], chunks: &[RetrievedChunk]) -> Vec<SourceEntry> {
    let mut entries: Vec<SourceEntry> = Vec::new();
    for line in lines {
        let entry = match parse_citation(line) {
            Some((file, page)) => {
                let matched = chunks
                    .iter()
                    .find(|chunk| chunk.source.as_deref() == Some(file.as_str()));
                match matched {
                    Some(chunk) => {
                        let page = page.or(chunk.page);
                        SourceEntry {
                            kind: None,
                            source: Some(file.clone()),
                            page,
                            reference: match page {
                                Some(page) => format!("[Source: {file}, Page: {page}]"),
                                None => format!("[Source: {file}]"),
                            },
                            storage_url: chunk.storage_url.clone(),
                        }
                    }
                    None => unresolved(line),
                }
            }
            None => unresolved(line),
        };
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    entries
}

fn unresolved(line: &str) -> SourceEntry {
    SourceEntry {
        kind: None,
        source: Some("Unknown".into()),
        page: Some(1),
        reference: line.to_string(),
        storage_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, page: u32) -> RetrievedChunk {
        RetrievedChunk {
            text: "excerpt".into(),
            source: Some(source.into()),
            page: Some(page),
            storage_url: Some(format!("https://storage.example/{source}")),
            score: 0.7,
        }
    }

    #[test]
    fn answer_without_marker_is_unchanged() {
        let (answer, lines) = strip_sources_section("Just an answer.\nNo citations.");
        assert_eq!(answer, "Just an answer.\nNo citations.");
        assert!(lines.is_empty());
    }

    #[test]
    fn sources_section_is_stripped() {
        let text = "Inertia resists change.\n\nSOURCES:\n[Source: physics.pdf, Page: 12]\n[Source: mechanics.pdf, Page: 3]\n";
        let (answer, lines) = strip_sources_section(text);
        assert_eq!(answer, "Inertia resists change.");
        assert_eq!(
            lines,
            vec![
                "[Source: physics.pdf, Page: 12]".to_string(),
                "[Source: mechanics.pdf, Page: 3]".to_string()
            ]
        );
    }

    #[test]
    fn references_marker_is_also_recognized() {
        let text = "Answer.\nREFERENCES:\n[Source: physics.pdf, Page: 1]";
        let (answer, lines) = strip_sources_section(text);
        assert_eq!(answer, "Answer.");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn citation_parses_file_and_page() {
        let (file, page) = parse_citation("[Source: physics.pdf, Page: 12]").expect("parses");
        assert_eq!(file, "physics.pdf");
        assert_eq!(page, Some(12));
    }

    #[test]
    fn citation_page_is_optional() {
        let (file, page) = parse_citation("[Source: physics.pdf]").expect("parses");
        assert_eq!(file, "physics.pdf");
        assert_eq!(page, None);
    }

    #[test]
    fn matched_citation_inherits_chunk_metadata() {
        let chunks = vec![chunk("physics.pdf", 12)];
        let entries = resolve_citations(
            &["[Source: physics.pdf, Page: 14]".to_string()],
            &chunks,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source.as_deref(), Some("physics.pdf"));
        assert_eq!(entries[0].page, Some(14));
        assert_eq!(
            entries[0].storage_url.as_deref(),
            Some("https://storage.example/physics.pdf")
        );
    }

    #[test]
    fn unmatched_citation_is_surfaced_as_unresolved() {
        let entries = resolve_citations(&["[Source: ghost.pdf, Page: 2]".to_string()], &[]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source.as_deref(), Some("Unknown"));
        assert_eq!(entries[0].page, Some(1));
        assert_eq!(entries[0].reference, "[Source: ghost.pdf, Page: 2]");
    }

    #[test]
    fn unparseable_line_is_surfaced_as_unresolved() {
        let entries = resolve_citations(&["- see chapter three".to_string()], &[]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source.as_deref(), Some("Unknown"));
    }

    #[test]
    fn duplicate_citations_are_collapsed() {
        let chunks = vec![chunk("physics.pdf", 12)];
        let line = "[Source: physics.pdf, Page: 12]".to_string();
        let entries = resolve_citations(&[line.clone(), line], &chunks);
        assert_eq!(entries.len(), 1);
    }
}
