use std::path::PathBuf;

use medrag_llm::embed::{DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL};
use medrag_llm::huggingface::{HF_DEFAULT_CHAT_MODEL, HF_INFERENCE_URL, HF_ROUTER_URL};
use medrag_llm::openai::{GROQ_BASE_URL, GROQ_DEFAULT_MODEL};
use medrag_store::document::DEFAULT_MAX_FILE_SIZE;
use medrag_store::pinecone::PINECONE_API_URL;
use serde::{Deserialize, Serialize};

use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Hosted `feature-extraction` pipeline.
    #[default]
    HuggingFace,
    /// Local BERT inference, requires the `candle` feature.
    Candle,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    /// `cpu`, `cuda`, `metal` or `auto`; only read by the candle backend.
    #[serde(default = "default_embedding_device")]
    pub device: String,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.into()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_embedding_base_url() -> String {
    HF_INFERENCE_URL.into()
}

fn default_embedding_batch_size() -> usize {
    32
}

fn default_embedding_device() -> String {
    "auto".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: default_embedding_base_url(),
            batch_size: default_embedding_batch_size(),
            device: default_embedding_device(),
        }
    }
}

/// Vector index backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Pinecone,
    Qdrant,
    /// Process-local; contents are lost on exit.
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_pinecone_api_url")]
    pub pinecone_api_url: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_index_name() -> String {
    "medical-chatbot".into()
}

fn default_pinecone_api_url() -> String {
    PINECONE_API_URL.into()
}

fn default_cloud() -> String {
    "aws".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_ready_timeout_secs() -> u64 {
    120
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            index_name: default_index_name(),
            pinecone_api_url: default_pinecone_api_url(),
            cloud: default_cloud(),
            region: default_region(),
            qdrant_url: default_qdrant_url(),
            poll_interval_secs: default_poll_interval_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

/// Chat-completion backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Groq,
    HuggingFace,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::HuggingFace => "huggingface",
        }
    }

    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => GROQ_BASE_URL,
            Self::HuggingFace => HF_ROUTER_URL,
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Groq => GROQ_DEFAULT_MODEL,
            Self::HuggingFace => HF_DEFAULT_CHAT_MODEL,
        }
    }

    /// Environment variable holding this provider's credential.
    #[must_use]
    pub fn credential_env(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::HuggingFace => "HF_API_TOKEN",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Overrides the provider's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Overrides the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

fn default_llm_timeout_secs() -> u64 {
    30
}

impl LlmConfig {
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    #[must_use]
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Optional file pattern relative to `data_dir`, e.g. `*.pdf`.
    #[serde(default)]
    pub glob: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".into()]
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    20
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            extensions: default_extensions(),
            glob: None,
            recursive: false,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u64,
}

fn default_top_k() -> u64 {
    3
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_size() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub pinecone_api_key: Option<Secret>,
    pub groq_api_key: Option<Secret>,
    pub hf_api_token: Option<Secret>,
    pub qdrant_api_key: Option<Secret>,
}
