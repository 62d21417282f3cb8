//! PDF discovery and page-level text extraction.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::ingest::IngestError;

/// Text of a single PDF page, 1-indexed, with its provenance.
#[derive(Debug, Clone)]
pub struct PageDocument {
    /// Extracted page text.
    pub text: String,
    /// Source file name (no directory components).
    pub source: String,
    /// One-based page number within the source file.
    pub page: u32,
    /// Absolute path of the source file.
    pub path: PathBuf,
}

/// Load every `*.pdf` under `dir` into page-level documents.
///
/// Files are visited in path order so repeated runs see the same sequence.
/// Pages containing only whitespace are dropped.
pub fn load_pdf_documents(dir: &Path) -> Result<Vec<PageDocument>, IngestError> {
    let mut documents = Vec::new();

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    paths.sort();

    for path in paths {
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        let pages = pdf_extract::extract_text_by_pages(&path)
            .map_err(|err| IngestError::Pdf(format!("{}: {err}", source)))?;
        tracing::debug!(file = %source, pages = pages.len(), "Extracted PDF text");

        for (index, text) in pages.into_iter().enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            documents.push(PageDocument {
                text,
                source: source.clone(),
                page: (index + 1) as u32,
                path: path.clone(),
            });
        }
    }

    Ok(documents)
}
