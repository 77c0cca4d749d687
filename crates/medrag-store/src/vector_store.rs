use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("collection {0} not found")]
    NotFound(String),
    #[error("collection {collection} not ready after {waited:?}")]
    NotReady {
        collection: String,
        waited: Duration,
    },
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

impl ScoredVectorPoint {
    /// String payload field, if present.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(serde_json::Value::as_str)
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Similarity index over fixed-dimension vectors, cosine metric.
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent. Returns `true` when it was created by this call.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    /// Whether the collection accepts reads and writes.
    fn is_ready(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Insert or overwrite points by id.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Top `limit` points by non-increasing similarity.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;
}

/// Poll [`VectorStore::is_ready`] every `poll_interval` until it reports ready.
///
/// # Errors
///
/// Returns [`VectorStoreError::NotReady`] once `timeout` elapses, or the first
/// error reported by the store.
pub async fn wait_until_ready(
    store: &dyn VectorStore,
    collection: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<(), VectorStoreError> {
    let started = tokio::time::Instant::now();
    loop {
        if store.is_ready(collection).await? {
            tracing::debug!(collection, elapsed = ?started.elapsed(), "collection ready");
            return Ok(());
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(VectorStoreError::NotReady {
                collection: collection.to_owned(),
                waited,
            });
        }
        tracing::info!(collection, "waiting for collection to become ready");
        tokio::time::sleep(poll_interval.min(timeout - waited)).await;
    }
}
