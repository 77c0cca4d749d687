//! Application bootstrap: config resolution and backend construction.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use medrag_llm::any::{AnyEmbedder, AnyProvider};
use medrag_llm::huggingface::{HfInferenceEmbedder, HuggingFaceProvider};
use medrag_llm::openai::OpenAiCompatibleProvider;
use medrag_llm::{CompletionParams, CompletionProvider, Embedder, LlmError, Message};
use medrag_store::document::{
    DirectoryLoader, IngestOptions, IngestionPipeline, SplitterConfig, TextSplitter,
};
use medrag_store::{InMemoryVectorStore, PineconeConfig, PineconeStore, QdrantOps, VectorStore};

use crate::config::{Config, EmbeddingBackend, ProviderKind, VectorBackend, resolve_config_path};
use crate::query::QueryHandler;
use crate::vault::EnvVaultProvider;

/// Prompt used by the provider smoke test.
pub const CHECK_PROMPT: &str = "What is 2+2? Answer in one sentence.";

pub type MedicalQueryHandler = QueryHandler<AnyProvider, AnyEmbedder>;

/// Everything a command needs, built once before any request is served.
pub struct AppContext {
    pub config: Config,
    pub query: Arc<MedicalQueryHandler>,
    pub store: Arc<dyn VectorStore>,
    pub embedder: AnyEmbedder,
}

impl AppContext {
    /// Construct every backend named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required credential is missing, a backend cannot be
    /// initialised, or the embedder dimension disagrees with the configuration.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let (store, embedder) = create_ingest_backends(&config).await?;
        let provider = create_provider(&config)?;
        Self::from_parts(config, provider, embedder, store)
    }

    /// Assemble a context from already constructed backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedder dimension disagrees with the configuration.
    pub fn from_parts(
        config: Config,
        provider: AnyProvider,
        embedder: AnyEmbedder,
        store: Arc<dyn VectorStore>,
    ) -> anyhow::Result<Self> {
        check_embedder_dimensions(&config, &embedder)?;
        tracing::info!(
            provider = provider.name(),
            model = provider.model(),
            embedder = embedder.model_id(),
            index = %config.vector_store.index_name,
            "application context ready"
        );
        let query = QueryHandler::new(
            provider,
            embedder.clone(),
            Arc::clone(&store),
            config.vector_store.index_name.clone(),
        )
        .with_top_k(config.query.top_k)
        .with_params(completion_params(&config))
        .with_timeout(Duration::from_secs(config.llm.timeout_secs));

        Ok(Self {
            config,
            query: Arc::new(query),
            store,
            embedder,
        })
    }

    /// # Errors
    ///
    /// Returns an error if `ingest.glob` is not a valid pattern.
    pub fn ingestion_pipeline(&self) -> anyhow::Result<IngestionPipeline<AnyEmbedder>> {
        build_ingestion_pipeline(&self.config, self.embedder.clone(), Arc::clone(&self.store))
    }
}

/// Load, override, validate and resolve secrets for the active configuration.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, validation fails, or the
/// vault cannot be read.
pub async fn load_config(cli_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = resolve_config_path(cli_path);
    let mut config = Config::load(&path)?;
    config.validate()?;
    config.resolve_secrets(&EnvVaultProvider).await?;
    Ok(config)
}

#[must_use]
pub fn completion_params(config: &Config) -> CompletionParams {
    CompletionParams {
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
    }
}

/// # Errors
///
/// Returns an error if the provider credential is missing.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let kind = config.llm.provider;
    let key = config
        .provider_key()
        .ok_or(LlmError::MissingCredential(kind.credential_env()))
        .with_context(|| {
        format!(
            "{} is not set; the {} provider cannot answer questions",
            kind.credential_env(),
            kind.as_str()
        )
    })?;
    let client = medrag_llm::http::build_client(Duration::from_secs(config.llm.timeout_secs))?;
    let base_url = config.llm.effective_base_url().to_owned();
    let model = config.llm.effective_model().to_owned();

    let provider = match kind {
        ProviderKind::Groq => AnyProvider::Groq(OpenAiCompatibleProvider::new(
            kind.as_str().to_owned(),
            client,
            key.expose().to_owned(),
            base_url,
            model,
        )),
        ProviderKind::HuggingFace => AnyProvider::HuggingFace(HuggingFaceProvider::new(
            client,
            key.expose().to_owned(),
            base_url,
            model,
        )),
    };
    Ok(provider)
}

/// # Errors
///
/// Returns an error if the hosted backend has no token or the local model
/// cannot be loaded.
pub async fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let cfg = &config.embedding;
    match cfg.backend {
        EmbeddingBackend::HuggingFace => {
            let token = config
                .secrets
                .hf_api_token
                .as_ref()
                .ok_or(LlmError::MissingCredential("HF_API_TOKEN"))
                .context("HF_API_TOKEN is not set; required by the huggingface embedding backend")?;
            let client = medrag_llm::http::default_client()?;
            Ok(AnyEmbedder::HfInference(
                HfInferenceEmbedder::new(
                    client,
                    token.expose().to_owned(),
                    cfg.base_url.clone(),
                    cfg.model.clone(),
                    cfg.dimensions,
                )
                .with_batch_size(cfg.batch_size),
            ))
        }
        #[cfg(feature = "candle")]
        EmbeddingBackend::Candle => {
            let device = select_device(&cfg.device)?;
            let model = cfg.model.clone();
            tracing::info!(model = %model, "loading local embedding model");
            let embedder = tokio::task::spawn_blocking(move || {
                medrag_llm::candle_embed::CandleEmbedder::load(&model, &device)
            })
            .await
            .context("embedding model loader panicked")??;
            Ok(AnyEmbedder::Candle(embedder))
        }
        #[cfg(not(feature = "candle"))]
        EmbeddingBackend::Candle => {
            bail!("embedding backend \"candle\" requires building with the `candle` feature")
        }
    }
}

#[cfg(feature = "candle")]
pub fn select_device(preference: &str) -> anyhow::Result<medrag_llm::candle_embed::CandleDevice> {
    use medrag_llm::candle_embed::CandleDevice;

    match preference {
        "metal" => {
            #[cfg(feature = "metal")]
            return Ok(CandleDevice::new_metal(0)?);
            #[cfg(not(feature = "metal"))]
            bail!("candle compiled without metal feature");
        }
        "cuda" => {
            #[cfg(feature = "cuda")]
            return Ok(CandleDevice::new_cuda(0)?);
            #[cfg(not(feature = "cuda"))]
            bail!("candle compiled without cuda feature");
        }
        "auto" => {
            #[cfg(feature = "metal")]
            if let Ok(device) = CandleDevice::new_metal(0) {
                return Ok(device);
            }
            #[cfg(feature = "cuda")]
            if let Ok(device) = CandleDevice::new_cuda(0) {
                return Ok(device);
            }
            Ok(CandleDevice::Cpu)
        }
        _ => Ok(CandleDevice::Cpu),
    }
}

/// # Errors
///
/// Returns an error if the Pinecone key is missing or the Qdrant client cannot
/// be created.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let cfg = &config.vector_store;
    let store: Arc<dyn VectorStore> = match cfg.backend {
        VectorBackend::Pinecone => {
            let key = config
                .secrets
                .pinecone_api_key
                .as_ref()
                .context("PINECONE_API_KEY is not set; required by the pinecone vector backend")?;
            let mut pinecone = PineconeConfig::new(key.expose().to_owned());
            pinecone.api_url.clone_from(&cfg.pinecone_api_url);
            pinecone.cloud.clone_from(&cfg.cloud);
            pinecone.region.clone_from(&cfg.region);
            Arc::new(PineconeStore::new(medrag_llm::http::default_client()?, pinecone))
        }
        VectorBackend::Qdrant => {
            let api_key = config
                .secrets
                .qdrant_api_key
                .as_ref()
                .map(|s| s.expose().to_owned());
            Arc::new(
                QdrantOps::new(&cfg.qdrant_url, api_key)
                    .with_context(|| format!("failed to connect to qdrant at {}", cfg.qdrant_url))?,
            )
        }
        VectorBackend::Memory => {
            tracing::warn!("using in-memory vector store; indexed chunks are lost on exit");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    Ok(store)
}

/// Vector store and embedder for ingestion. The store is created first so a
/// missing Pinecone key is reported before any embedding model is loaded.
///
/// # Errors
///
/// Returns an error if either backend cannot be created.
pub async fn create_ingest_backends(
    config: &Config,
) -> anyhow::Result<(Arc<dyn VectorStore>, AnyEmbedder)> {
    let store = create_vector_store(config)?;
    let embedder = create_embedder(config).await?;
    Ok((store, embedder))
}

/// # Errors
///
/// Returns an error if `ingest.glob` is not a valid pattern.
pub fn build_ingestion_pipeline<E: Embedder>(
    config: &Config,
    embedder: E,
    store: Arc<dyn VectorStore>,
) -> anyhow::Result<IngestionPipeline<E>> {
    let ingest = &config.ingest;
    let mut loader = DirectoryLoader::new(ingest.extensions.clone())
        .recursive(ingest.recursive)
        .with_max_file_size(ingest.max_file_size);
    if let Some(pattern) = &ingest.glob {
        loader = loader
            .with_glob(pattern)
            .with_context(|| format!("invalid ingest.glob {pattern:?}"))?;
    }
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: ingest.chunk_size,
        chunk_overlap: ingest.chunk_overlap,
        ..SplitterConfig::default()
    });
    let options = IngestOptions {
        index_name: config.vector_store.index_name.clone(),
        poll_interval: Duration::from_secs(config.vector_store.poll_interval_secs),
        ready_timeout: Duration::from_secs(config.vector_store.ready_timeout_secs),
    };
    Ok(IngestionPipeline::new(loader, splitter, embedder, store, options))
}

/// # Errors
///
/// Returns an error if the embedder produces vectors of a different size than
/// the configured index dimension.
pub fn check_embedder_dimensions(config: &Config, embedder: &impl Embedder) -> anyhow::Result<()> {
    let actual = embedder.dimensions();
    let expected = config.embedding.dimensions;
    if actual != expected {
        bail!(
            "embedder {} produces {actual}-dimensional vectors but embedding.dimensions is {expected}",
            embedder.model_id()
        );
    }
    Ok(())
}

/// Send [`CHECK_PROMPT`] to `provider` and return its reply.
///
/// # Errors
///
/// Returns an error if the provider call fails.
pub async fn check_provider(
    provider: &impl CompletionProvider,
    params: &CompletionParams,
) -> anyhow::Result<String> {
    let reply = provider
        .complete(&[Message::user(CHECK_PROMPT)], params)
        .await
        .with_context(|| format!("{} provider check failed", provider.name()))?;
    Ok(reply.trim().to_owned())
}
