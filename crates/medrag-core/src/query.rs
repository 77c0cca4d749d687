use std::sync::Arc;
use std::time::Duration;

use medrag_llm::{CompletionParams, CompletionProvider, Embedder, LlmError};
use medrag_store::{VectorStore, VectorStoreError};
use serde::Serialize;

use crate::prompt::{build_context, build_messages, collect_sources};

/// Returned to the end user whenever a question cannot be answered.
pub const FALLBACK_ANSWER: &str =
    "I apologize, but I'm having trouble processing your question. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("failed to embed question: {0}")]
    Embedding(#[source] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    #[error("no indexed context matched the question")]
    NoContext,

    #[error("completion failed: {0}")]
    Completion(#[source] LlmError),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider returned an empty answer")]
    EmptyAnswer,
}

/// A grounded answer with the context it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub context: String,
    pub sources: Vec<String>,
}

/// Retrieval-augmented question answering over one index.
pub struct QueryHandler<P, E> {
    provider: P,
    embedder: E,
    store: Arc<dyn VectorStore>,
    index_name: String,
    top_k: u64,
    params: CompletionParams,
    timeout: Duration,
}

impl<P: CompletionProvider, E: Embedder> QueryHandler<P, E> {
    pub fn new(
        provider: P,
        embedder: E,
        store: Arc<dyn VectorStore>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            embedder,
            store,
            index_name: index_name.into(),
            top_k: 3,
            params: CompletionParams::default(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: u64) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Answer `question`, mapping every failure to [`FALLBACK_ANSWER`].
    pub async fn answer(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(answer) => answer.text,
            Err(QueryError::EmptyQuestion) => {
                tracing::warn!("rejected empty question");
                FALLBACK_ANSWER.to_owned()
            }
            Err(e) => {
                tracing::error!(
                    provider = self.provider.name(),
                    index = %self.index_name,
                    "query failed: {e:#}"
                );
                FALLBACK_ANSWER.to_owned()
            }
        }
    }

    /// Retrieve context for `question` and ask the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the question is blank, no context is found, or any
    /// embedding, retrieval or completion step fails or times out.
    pub async fn ask(&self, question: &str) -> Result<Answer, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(QueryError::Embedding)?;
        let hits = self
            .store
            .search(&self.index_name, vector, self.top_k)
            .await?;
        if hits.is_empty() {
            return Err(QueryError::NoContext);
        }
        tracing::debug!(hits = hits.len(), "retrieved context");

        let context = build_context(&hits);
        let sources = collect_sources(&hits);
        let messages = build_messages(&context, question);

        let text = tokio::time::timeout(
            self.timeout,
            self.provider.complete(&messages, &self.params),
        )
        .await
        .map_err(|_| QueryError::Timeout(self.timeout))?
        .map_err(QueryError::Completion)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyAnswer);
        }
        tracing::info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            sources = sources.len(),
            "answered question"
        );

        Ok(Answer {
            text: text.to_owned(),
            context,
            sources,
        })
    }
}
