//! PDF ingestion pipeline: load, upload, chunk, embed, index, insights.
//!
//! Jobs run as spawned background tasks and report only through the task
//! registry. The pipeline is synchronous stage-to-stage and aborts on the
//! first failure; there is no rollback of partially indexed points.

pub mod chunking;
pub mod insights;
pub mod loader;

use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::get_config;
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::ingest::chunking::split_text;
use crate::ingest::insights::generate_insights;
use crate::ingest::loader::{PageDocument, load_pdf_documents};
use crate::llm::Generator;
use crate::registry::TaskRegistry;
use crate::storage::{ObjectStore, StorageError};
use crate::vector::{PointInsert, VectorService, VectorStoreError, compute_chunk_hash};

/// Embedding batch size per provider call.
const EMBED_BATCH: usize = 64;

/// Errors raised by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No PDF produced any text.
    #[error("No readable PDF documents were found in the upload")]
    NoDocuments,
    /// PDF text extraction failed.
    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Object upload failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store failed.
    #[error(transparent)]
    Vector(#[from] VectorStoreError),
}

/// One chunk ready for embedding and indexing.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    /// Chunk text.
    pub text: String,
    /// Source file name.
    pub source: String,
    /// One-based page number.
    pub page: u32,
    /// Public or local URL of the source document.
    pub storage_url: String,
}

/// A submitted ingestion job.
#[derive(Debug, Clone)]
pub struct IngestJob {
    /// Task registry identifier for progress reporting.
    pub task_id: String,
    /// Target vector collection.
    pub collection: String,
    /// Project name recorded as chunk metadata.
    pub project_name: String,
    /// Directory holding the uploaded files; removed when the job ends.
    pub work_dir: PathBuf,
}

/// Runs ingestion jobs against the configured collaborators.
#[derive(Clone)]
pub struct Ingestor {
    vectors: Arc<VectorService>,
    embeddings: Arc<dyn EmbeddingClient + Send + Sync>,
    generator: Arc<dyn Generator>,
    store: Option<Arc<dyn ObjectStore>>,
    tasks: TaskRegistry,
}

impl Ingestor {
    /// Compose an ingestor from its collaborators.
    pub fn new(
        vectors: Arc<VectorService>,
        embeddings: Arc<dyn EmbeddingClient + Send + Sync>,
        generator: Arc<dyn Generator>,
        store: Option<Arc<dyn ObjectStore>>,
        tasks: TaskRegistry,
    ) -> Self {
        Self {
            vectors,
            embeddings,
            generator,
            store,
            tasks,
        }
    }

    /// Run a job to completion, routing the outcome into the task registry.
    ///
    /// Every error after submission lands in the task's `failed` state; the
    /// job's working directory is removed on success and failure alike.
    pub async fn run(&self, job: IngestJob) {
        self.tasks
            .begin(&job.task_id, "Processing uploaded documents");

        match self.execute(&job).await {
            Ok(result) => {
                self.tasks
                    .complete(&job.task_id, "Ingestion complete", result);
            }
            Err(err) => {
                tracing::error!(task_id = %job.task_id, error = %err, "Ingestion job failed");
                self.tasks.fail(&job.task_id, &err.to_string());
            }
        }

        if let Err(err) = tokio::fs::remove_dir_all(&job.work_dir).await {
            tracing::warn!(
                task_id = %job.task_id,
                dir = %job.work_dir.display(),
                error = %err,
                "Failed to remove job working directory"
            );
        }
    }

    async fn execute(&self, job: &IngestJob) -> Result<Value, IngestError> {
        let config = get_config();

        // stage 1: page-level text extraction
        let work_dir = job.work_dir.clone();
        let documents = tokio::task::spawn_blocking(move || load_pdf_documents(&work_dir))
            .await
            .map_err(|err| IngestError::Pdf(err.to_string()))??;
        if documents.is_empty() {
            return Err(IngestError::NoDocuments);
        }
        let file_count = documents
            .iter()
            .map(|doc| doc.source.as_str())
            .collect::<HashSet<_>>()
            .len();
        self.tasks.advance(
            &job.task_id,
            10,
            &format!("Loaded {} pages from {} documents", documents.len(), file_count),
        );

        // stage 2: per-file storage URLs
        let urls = self.resolve_storage_urls(&documents).await?;
        self.tasks
            .advance(&job.task_id, 50, "Resolved document storage locations");

        // stage 3: overlapping character windows
        let mut chunks = Vec::new();
        for doc in &documents {
            let storage_url = urls
                .get(doc.source.as_str())
                .cloned()
                .unwrap_or_else(|| doc.path.display().to_string());
            for text in split_text(&doc.text, config.chunk_size, config.chunk_overlap) {
                chunks.push(DocumentChunk {
                    text,
                    source: doc.source.clone(),
                    page: doc.page,
                    storage_url: storage_url.clone(),
                });
            }
        }
        self.tasks.advance(
            &job.task_id,
            75,
            &format!("Split into {} chunks", chunks.len()),
        );

        // stages 4–5: embed and index
        let indexed = self.index_chunks(job, &chunks).await?;
        self.tasks
            .advance(&job.task_id, 85, &format!("Indexed {indexed} chunks"));

        // stage 6: best-effort insights
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let insights = generate_insights(self.generator.as_ref(), &texts).await;

        tracing::info!(
            task_id = %job.task_id,
            collection = %job.collection,
            documents = file_count,
            pages = documents.len(),
            chunks = indexed,
            "Ingestion pipeline finished"
        );
        Ok(json!({
            "collection": job.collection,
            "documents": file_count,
            "pages": documents.len(),
            "chunks_indexed": indexed,
            "summary": insights.summary,
            "faq": insights.faq,
        }))
    }

    async fn resolve_storage_urls(
        &self,
        documents: &[PageDocument],
    ) -> Result<BTreeMap<String, String>, IngestError> {
        let mut urls = BTreeMap::new();
        for doc in documents {
            if urls.contains_key(doc.source.as_str()) {
                continue;
            }
            let url = match &self.store {
                Some(store) => {
                    let bytes = tokio::fs::read(&doc.path).await?;
                    store.upload(&doc.source, bytes).await?
                }
                None => doc.path.display().to_string(),
            };
            urls.insert(doc.source.clone(), url);
        }
        Ok(urls)
    }

    async fn index_chunks(
        &self,
        job: &IngestJob,
        chunks: &[DocumentChunk],
    ) -> Result<usize, IngestError> {
        let config = get_config();
        self.vectors
            .ensure_collection(&job.collection, config.embedding_dimension as u64)
            .await?;

        // duplicate chunk text within one job is indexed once
        let mut seen = HashSet::new();
        let unique: Vec<&DocumentChunk> = chunks
            .iter()
            .filter(|chunk| seen.insert(compute_chunk_hash(&chunk.text)))
            .collect();
        let skipped = chunks.len() - unique.len();
        if skipped > 0 {
            tracing::debug!(skipped, "Skipped duplicate chunks");
        }

        let mut indexed = 0;
        for batch in unique.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embeddings.generate_embeddings(texts).await?;

            let points: Vec<PointInsert> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| {
                    let mut metadata = Map::new();
                    metadata.insert("source".into(), json!(chunk.source));
                    metadata.insert("filename".into(), json!(chunk.source));
                    metadata.insert("page".into(), json!(chunk.page));
                    metadata.insert("project_id".into(), json!(job.project_name));
                    metadata.insert("collection_name".into(), json!(job.collection));
                    metadata.insert("storage_url".into(), json!(chunk.storage_url));
                    PointInsert {
                        text: chunk.text.clone(),
                        metadata,
                        chunk_hash: compute_chunk_hash(&chunk.text),
                        vector,
                    }
                })
                .collect();

            indexed += self.vectors.upsert_points(&job.collection, points).await?;
        }
        Ok(indexed)
    }
}
