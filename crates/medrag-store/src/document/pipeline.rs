use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use medrag_llm::Embedder;
use medrag_llm::embed::check_dimensions;
use serde_json::json;
use uuid::Uuid;

use super::{Chunk, DirectoryLoader, Document, DocumentError, TextSplitter, reduce_metadata};
use crate::vector_store::{VectorPoint, VectorStore, wait_until_ready};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub index_name: String,
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            index_name: "medical-chatbot".to_owned(),
            poll_interval: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub created_index: bool,
}

/// Stable point id for a chunk: re-ingesting an unchanged corpus overwrites.
#[must_use]
pub fn point_id(source: &str, chunk_index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("{source}#{chunk_index}").as_bytes(),
    )
    .to_string()
}

/// load -> reduce -> split -> embed -> ensure index -> upsert.
pub struct IngestionPipeline<E> {
    loader: DirectoryLoader,
    splitter: TextSplitter,
    embedder: E,
    store: Arc<dyn VectorStore>,
    options: IngestOptions,
}

impl<E: Embedder> IngestionPipeline<E> {
    pub fn new(
        loader: DirectoryLoader,
        splitter: TextSplitter,
        embedder: E,
        store: Arc<dyn VectorStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            loader,
            splitter,
            embedder,
            store,
            options,
        }
    }

    /// Ingest every matching file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, embedding, index setup or upsert fails.
    /// Nothing is rolled back: points upserted before a failure stay in the index.
    pub async fn run(&self, dir: &Path) -> Result<IngestReport, DocumentError> {
        tracing::info!(dir = %dir.display(), "loading documents");
        let documents = self.loader.load(dir).await?;
        self.ingest_documents(documents).await
    }

    /// # Errors
    ///
    /// Returns an error if embedding, index setup or upsert fails.
    pub async fn ingest_documents(
        &self,
        documents: Vec<Document>,
    ) -> Result<IngestReport, DocumentError> {
        let documents = reduce_metadata(documents);
        let chunks = self.splitter.split_all(&documents);
        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "split documents into chunks"
        );

        let vectors = self.embed(&chunks).await?;

        let index = self.options.index_name.as_str();
        let dimension = self.embedder.dimensions() as u64;
        let created_index = self.store.ensure_collection(index, dimension).await?;
        if created_index {
            tracing::info!(index, dimension, "created index, waiting until ready");
        } else {
            tracing::info!(index, "using existing index");
        }
        wait_until_ready(
            self.store.as_ref(),
            index,
            self.options.poll_interval,
            self.options.ready_timeout,
        )
        .await?;

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| to_point(chunk, vector))
            .collect();
        if !points.is_empty() {
            self.store.upsert(index, points).await?;
        }
        tracing::info!(index, chunks = chunks.len(), "ingestion complete");

        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            created_index,
        })
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, DocumentError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        tracing::info!(
            model = self.embedder.model_id(),
            count = texts.len(),
            "embedding chunks"
        );
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(DocumentError::Embedding(medrag_llm::LlmError::Inference(
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            )));
        }
        check_dimensions(&vectors, self.embedder.dimensions())?;
        Ok(vectors)
    }
}

fn to_point(chunk: &Chunk, vector: Vec<f32>) -> VectorPoint {
    VectorPoint {
        id: point_id(&chunk.source, chunk.chunk_index),
        vector,
        payload: HashMap::from([
            ("content".to_owned(), json!(chunk.content)),
            ("source".to_owned(), json!(chunk.source)),
            ("chunk_index".to_owned(), json!(chunk.chunk_index)),
        ]),
    }
}
