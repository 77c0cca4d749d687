//! Hugging Face Inference API clients: chat completion and feature extraction.

use std::fmt;

use serde::Serialize;

use crate::embed::{Embedder, check_dimensions};
use crate::error::LlmError;
use crate::openai::OpenAiCompatibleProvider;
use crate::provider::{CompletionParams, CompletionProvider, Message};

/// OpenAI-compatible router for hosted chat models.
pub const HF_ROUTER_URL: &str = "https://router.huggingface.co/v1";
/// Base URL for `hf-inference` pipeline tasks.
pub const HF_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const HF_DEFAULT_CHAT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

/// Hosted chat completion through the Hugging Face router.
#[derive(Clone)]
pub struct HuggingFaceProvider {
    inner: OpenAiCompatibleProvider,
}

impl HuggingFaceProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, token: String, base_url: String, model: String) -> Self {
        Self {
            inner: OpenAiCompatibleProvider::new("huggingface", client, token, base_url, model),
        }
    }
}

impl fmt::Debug for HuggingFaceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceProvider")
            .field("inner", &self.inner)
            .finish()
    }
}

impl CompletionProvider for HuggingFaceProvider {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        self.inner.complete(messages, params).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

/// Sentence embeddings from the hosted `feature-extraction` pipeline.
#[derive(Clone)]
pub struct HfInferenceEmbedder {
    client: reqwest::Client,
    token: String,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl fmt::Debug for HfInferenceEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HfInferenceEmbedder")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl HfInferenceEmbedder {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        token: String,
        mut base_url: String,
        model: String,
        dimensions: usize,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            token,
            base_url,
            model,
            dimensions,
            batch_size: 32,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/pipeline/feature-extraction", self.base_url, self.model)
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = FeatureExtractionRequest {
            inputs,
            options: RequestOptions {
                wait_for_model: true,
            },
        };
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!(model = %self.model, "feature-extraction API error {status}: {text}");
            return Err(LlmError::Status {
                provider: "huggingface".into(),
                status: status.as_u16(),
            });
        }

        let vectors: Vec<Vec<f32>> = serde_json::from_str(&text)?;
        if vectors.len() != inputs.len() {
            return Err(LlmError::Inference(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        check_dimensions(&vectors, self.dimensions)?;
        Ok(vectors)
    }
}

impl Embedder for HfInferenceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.request(&[text.to_owned()]).await?;
        vectors.pop().ok_or_else(|| LlmError::EmptyResponse {
            provider: "huggingface".into(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::embed::DEFAULT_EMBEDDING_MODEL;

    fn embedder_for(server: &MockServer, dims: usize) -> HfInferenceEmbedder {
        HfInferenceEmbedder::new(
            reqwest::Client::new(),
            "hf_test".into(),
            format!("{}/models/", server.uri()),
            DEFAULT_EMBEDDING_MODEL.into(),
            dims,
        )
    }

    const EMBED_PATH: &str =
        "/models/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction";

    #[tokio::test]
    async fn embed_single_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_partial_json(serde_json::json!({"inputs": ["hello"]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([[0.1, 0.2, 0.3]])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let v = embedder_for(&server, 3).embed("hello").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_batch_splits_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .and(body_partial_json(serde_json::json!({"inputs": ["a", "b"]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([[1.0, 0.0], [0.0, 1.0]])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .and(body_partial_json(serde_json::json!({"inputs": ["c"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[0.5, 0.5]])))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = embedder_for(&server, 2).with_batch_size(2);
        let texts = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let out = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn wrong_dimension_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[0.1, 0.2]])))
            .mount(&server)
            .await;

        let err = embedder_for(&server, 384).embed("x").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::DimensionMismatch {
                expected: 384,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn unavailable_model_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let err = embedder_for(&server, 3).embed("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn count_mismatch_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = embedder_for(&server, 3).embed("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Inference(_)));
    }

    #[test]
    fn embedder_metadata() {
        let e = HfInferenceEmbedder::new(
            reqwest::Client::new(),
            "hf_secret".into(),
            HF_INFERENCE_URL.into(),
            DEFAULT_EMBEDDING_MODEL.into(),
            384,
        );
        assert_eq!(e.dimensions(), 384);
        assert_eq!(e.model_id(), DEFAULT_EMBEDDING_MODEL);
        assert!(!format!("{e:?}").contains("hf_secret"));
    }

    #[test]
    fn batch_size_never_zero() {
        let e = HfInferenceEmbedder::new(
            reqwest::Client::new(),
            "t".into(),
            HF_INFERENCE_URL.into(),
            "m".into(),
            3,
        )
        .with_batch_size(0);
        assert_eq!(e.batch_size, 1);
    }

    #[tokio::test]
    async fn chat_provider_uses_router_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(
                serde_json::json!({"model": HF_DEFAULT_CHAT_MODEL}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "answer"}}]
            })))
            .mount(&server)
            .await;

        let p = HuggingFaceProvider::new(
            reqwest::Client::new(),
            "hf".into(),
            format!("{}/v1", server.uri()),
            HF_DEFAULT_CHAT_MODEL.into(),
        );
        assert_eq!(p.name(), "huggingface");
        let text = p
            .complete(&[Message::user("q")], &CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(text, "answer");
    }
}
