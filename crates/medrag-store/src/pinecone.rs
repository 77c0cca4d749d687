//! Pinecone serverless index backend over the REST API.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

pub const PINECONE_API_URL: &str = "https://api.pinecone.io";
pub const PINECONE_API_VERSION: &str = "2024-07";

/// Maximum vectors per upsert request.
const UPSERT_BATCH: usize = 100;

#[derive(Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub api_url: String,
    pub cloud: String,
    pub region: String,
}

impl PineconeConfig {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: PINECONE_API_URL.to_owned(),
            cloud: "aws".to_owned(),
            region: "us-east-1".to_owned(),
        }
    }
}

impl fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("cloud", &self.cloud)
            .field("region", &self.region)
            .finish()
    }
}

pub struct PineconeStore {
    client: reqwest::Client,
    config: PineconeConfig,
    // index name -> data plane base URL
    hosts: RwLock<HashMap<String, String>>,
}

impl fmt::Debug for PineconeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: u64,
    metric: &'static str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: u64,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: u64,
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    }
}

fn connection_error(e: &reqwest::Error) -> VectorStoreError {
    VectorStoreError::Connection(e.to_string())
}

impl PineconeStore {
    #[must_use]
    pub fn new(client: reqwest::Client, mut config: PineconeConfig) -> Self {
        while config.api_url.ends_with('/') {
            config.api_url.pop();
        }
        Self {
            client,
            config,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    fn control(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.config.api_url))
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    fn data(&self, host: &str, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{host}{path}"))
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    async fn describe(&self, index: &str) -> Result<Option<IndexDescription>, VectorStoreError> {
        let response = self
            .control(reqwest::Method::GET, &format!("/indexes/{index}"))
            .send()
            .await
            .map_err(|e| connection_error(&e))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().await.map_err(|e| connection_error(&e))?;
        if !status.is_success() {
            tracing::error!(index, "pinecone describe_index failed {status}: {text}");
            return Err(VectorStoreError::Collection(format!(
                "describe index {index}: status {status}"
            )));
        }
        let description: IndexDescription = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        if let Ok(mut hosts) = self.hosts.write() {
            hosts.insert(index.to_owned(), normalize_host(&description.host));
        }
        Ok(Some(description))
    }

    async fn host(&self, index: &str) -> Result<String, VectorStoreError> {
        let cached = self
            .hosts
            .read()
            .ok()
            .and_then(|hosts| hosts.get(index).cloned());
        if let Some(host) = cached {
            return Ok(host);
        }
        match self.describe(index).await? {
            Some(description) => Ok(normalize_host(&description.host)),
            None => Err(VectorStoreError::NotFound(index.to_owned())),
        }
    }

    async fn create(&self, index: &str, dimension: u64) -> Result<bool, VectorStoreError> {
        let body = CreateIndexRequest {
            name: index,
            dimension,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.config.cloud,
                    region: &self.config.region,
                },
            },
        };
        let response = self
            .control(reqwest::Method::POST, "/indexes")
            .json(&body)
            .send()
            .await
            .map_err(|e| connection_error(&e))?;
        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            tracing::info!(index, "index already exists");
            return Ok(false);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(index, "pinecone create_index failed {status}: {text}");
            return Err(VectorStoreError::Collection(format!(
                "create index {index}: status {status}"
            )));
        }
        tracing::info!(index, dimension, "created pinecone index");
        Ok(true)
    }

    async fn upsert_batch(
        &self,
        host: &str,
        points: &[VectorPoint],
    ) -> Result<(), VectorStoreError> {
        let body = UpsertRequest {
            vectors: points
                .iter()
                .map(|p| PineconeVector {
                    id: &p.id,
                    values: &p.vector,
                    metadata: &p.payload,
                })
                .collect(),
        };
        let response = self
            .data(host, "/vectors/upsert")
            .json(&body)
            .send()
            .await
            .map_err(|e| connection_error(&e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("pinecone upsert failed {status}: {text}");
            return Err(VectorStoreError::Upsert(format!("status {status}")));
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredVectorPoint>, VectorStoreError> {
        let host = self.host(index).await?;
        let body = QueryRequest {
            vector,
            top_k: limit,
            include_metadata: true,
            include_values: false,
        };
        let response = self
            .data(&host, "/query")
            .json(&body)
            .send()
            .await
            .map_err(|e| connection_error(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| connection_error(&e))?;
        if !status.is_success() {
            tracing::error!(index, "pinecone query failed {status}: {text}");
            return Err(VectorStoreError::Search(format!("status {status}")));
        }
        let parsed: QueryResponse = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

        let mut results: Vec<ScoredVectorPoint> = parsed
            .matches
            .into_iter()
            .map(|m| ScoredVectorPoint {
                id: m.id,
                score: m.score,
                payload: m.metadata,
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(results)
    }

    async fn stats(&self, index: &str) -> Result<u64, VectorStoreError> {
        let host = self.host(index).await?;
        let response = self
            .data(&host, "/describe_index_stats")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| connection_error(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| connection_error(&e))?;
        if !status.is_success() {
            tracing::error!(index, "pinecone describe_index_stats failed {status}: {text}");
            return Err(VectorStoreError::Search(format!("status {status}")));
        }
        let stats: IndexStats = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        Ok(stats.total_vector_count)
    }

    async fn delete(&self, index: &str) -> Result<(), VectorStoreError> {
        let response = self
            .control(reqwest::Method::DELETE, &format!("/indexes/{index}"))
            .send()
            .await
            .map_err(|e| connection_error(&e))?;
        if let Ok(mut hosts) = self.hosts.write() {
            hosts.remove(index);
        }
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(VectorStoreError::Delete(format!(
            "delete index {index}: status {status}"
        )))
    }
}

impl VectorStore for PineconeStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if self.describe(&collection).await?.is_some() {
                tracing::info!(index = %collection, "using existing index");
                return Ok(false);
            }
            self.create(&collection, vector_size).await
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { Ok(self.describe(&collection).await?.is_some()) })
    }

    fn is_ready(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            Ok(self
                .describe(&collection)
                .await?
                .is_some_and(|d| d.status.ready))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.delete(&collection).await })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if points.is_empty() {
                return Ok(());
            }
            let host = self.host(&collection).await?;
            for batch in points.chunks(UPSERT_BATCH) {
                self.upsert_batch(&host, batch).await?;
                tracing::debug!(index = %collection, count = batch.len(), "upserted batch");
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.query(&collection, vector, limit).await })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.stats(&collection).await })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn store_for(server: &MockServer) -> PineconeStore {
        let mut config = PineconeConfig::new("pc-test-key".into());
        config.api_url = format!("{}/", server.uri());
        PineconeStore::new(reqwest::Client::new(), config)
    }

    async fn mount_describe(server: &MockServer, ready: bool) {
        Mock::given(method("GET"))
            .and(path("/indexes/medical-chatbot"))
            .and(header("Api-Key", "pc-test-key"))
            .and(header("X-Pinecone-API-Version", PINECONE_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "medical-chatbot",
                "dimension": 384,
                "metric": "cosine",
                "host": server.uri(),
                "status": {"ready": ready, "state": if ready { "Ready" } else { "Initializing" }}
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn normalize_host_adds_scheme() {
        assert_eq!(
            normalize_host("medical-chatbot-abc.svc.pinecone.io"),
            "https://medical-chatbot-abc.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://127.0.0.1:9/"), "http://127.0.0.1:9");
    }

    #[test]
    fn debug_redacts_key() {
        let store = PineconeStore::new(
            reqwest::Client::new(),
            PineconeConfig::new("pc-secret".into()),
        );
        let dbg = format!("{store:?}");
        assert!(!dbg.contains("pc-secret"));
        assert!(dbg.contains("us-east-1"));
    }

    #[tokio::test]
    async fn ensure_reuses_existing_index() {
        let server = MockServer::start().await;
        mount_describe(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let created = store_for(&server)
            .ensure_collection("medical-chatbot", 384)
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn ensure_creates_serverless_cosine_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/medical-chatbot"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(body_partial_json(serde_json::json!({
                "name": "medical-chatbot",
                "dimension": 384,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let created = store_for(&server)
            .ensure_collection("medical-chatbot", 384)
            .await
            .unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn create_conflict_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/medical-chatbot"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let created = store_for(&server)
            .ensure_collection("medical-chatbot", 384)
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn readiness_follows_status() {
        let server = MockServer::start().await;
        mount_describe(&server, false).await;
        let store = store_for(&server);
        assert!(store.collection_exists("medical-chatbot").await.unwrap());
        assert!(!store.is_ready("medical-chatbot").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_batches_by_hundred() {
        let server = MockServer::start().await;
        mount_describe(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc-test-key"))
            .respond_with(|req: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let n = body["vectors"].as_array().map_or(0, Vec::len);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"upsertedCount": n}))
            })
            .expect(3)
            .mount(&server)
            .await;

        let points: Vec<VectorPoint> = (0..250)
            .map(|i| VectorPoint {
                id: format!("id-{i}"),
                vector: vec![0.1, 0.2],
                payload: HashMap::from([("content".into(), serde_json::json!("text"))]),
            })
            .collect();
        store_for(&server)
            .upsert("medical-chatbot", points)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upsert_failure_is_error() {
        let server = MockServer::start().await;
        mount_describe(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad dimension"))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .upsert(
                "medical-chatbot",
                vec![VectorPoint {
                    id: "a".into(),
                    vector: vec![0.1],
                    payload: HashMap::new(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn query_returns_ranked_matches() {
        let server = MockServer::start().await;
        mount_describe(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({
                "topK": 3,
                "includeMetadata": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [
                    {"id": "b", "score": 0.4, "metadata": {"content": "second"}},
                    {"id": "a", "score": 0.9, "metadata": {"content": "first", "source": "data/a.pdf"}}
                ],
                "namespace": ""
            })))
            .mount(&server)
            .await;

        let results = store_for(&server)
            .search("medical-chatbot", vec![0.1, 0.2], 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].text("source"), Some("data/a.pdf"));
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn query_missing_index_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .search("medical-chatbot", vec![0.1], 3)
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn count_reads_index_stats() {
        let server = MockServer::start().await;
        mount_describe(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/describe_index_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dimension": 384,
                "totalVectorCount": 42
            })))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).count("medical-chatbot").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn delete_missing_index_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/indexes/medical-chatbot"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        store_for(&server)
            .delete_collection("medical-chatbot")
            .await
            .unwrap();
    }
}
