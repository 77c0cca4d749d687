use std::io::Write;
use std::path::Path;

use serial_test::serial;

use super::*;
use crate::vault::MockVaultProvider;

const ENV_KEYS: [&str; 21] = [
    "MEDRAG_CONFIG",
    "MEDRAG_LLM_PROVIDER",
    "MEDRAG_LLM_BASE_URL",
    "MEDRAG_LLM_MODEL",
    "MEDRAG_LLM_TEMPERATURE",
    "MEDRAG_LLM_MAX_TOKENS",
    "MEDRAG_LLM_TIMEOUT",
    "MEDRAG_EMBEDDING_BACKEND",
    "MEDRAG_EMBEDDING_MODEL",
    "MEDRAG_EMBEDDING_BASE_URL",
    "MEDRAG_EMBEDDING_DIMENSIONS",
    "MEDRAG_VECTOR_BACKEND",
    "MEDRAG_INDEX_NAME",
    "MEDRAG_PINECONE_API_URL",
    "MEDRAG_QDRANT_URL",
    "MEDRAG_DATA_DIR",
    "MEDRAG_INGEST_GLOB",
    "MEDRAG_CHUNK_SIZE",
    "MEDRAG_CHUNK_OVERLAP",
    "MEDRAG_TOP_K",
    "MEDRAG_HOST",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
    unsafe { std::env::remove_var("PORT") };
}

#[test]
#[serial]
fn defaults_when_file_missing() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/medrag.toml")).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Groq);
    assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.llm.max_tokens, 500);
    assert_eq!(config.llm.timeout_secs, 30);
    assert_eq!(config.embedding.dimensions, 384);
    assert_eq!(
        config.embedding.model,
        "sentence-transformers/all-MiniLM-L6-v2"
    );
    assert_eq!(config.vector_store.backend, VectorBackend::Pinecone);
    assert_eq!(config.vector_store.index_name, "medical-chatbot");
    assert_eq!(config.ingest.chunk_size, 500);
    assert_eq!(config.ingest.chunk_overlap, 20);
    assert!(config.ingest.glob.is_none());
    assert_eq!(config.query.top_k, 3);
    assert_eq!(config.server.port, 8080);
    config.validate().unwrap();
}

#[test]
#[serial]
fn parses_toml_with_partial_sections() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "huggingface"
model = "meta-llama/Llama-3.1-8B-Instruct"
temperature = 0.5

[vector_store]
backend = "memory"
index_name = "clinic"

[ingest]
data_dir = "corpus"
glob = "*.pdf"
chunk_size = 200
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::HuggingFace);
    assert_eq!(
        config.llm.effective_model(),
        "meta-llama/Llama-3.1-8B-Instruct"
    );
    assert_eq!(
        config.llm.effective_base_url(),
        ProviderKind::HuggingFace.default_base_url()
    );
    assert_eq!(config.llm.max_tokens, 500);
    assert_eq!(config.vector_store.backend, VectorBackend::Memory);
    assert_eq!(config.vector_store.index_name, "clinic");
    assert_eq!(config.ingest.data_dir, Path::new("corpus"));
    assert_eq!(config.ingest.glob.as_deref(), Some("*.pdf"));
    assert_eq!(config.ingest.chunk_size, 200);
    assert_eq!(config.ingest.chunk_overlap, 20);
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[llm\nprovider = ").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_apply() {
    clear_env();
    unsafe {
        std::env::set_var("MEDRAG_LLM_PROVIDER", "HuggingFace");
        std::env::set_var("MEDRAG_LLM_TEMPERATURE", "0.1");
        std::env::set_var("MEDRAG_LLM_TIMEOUT", "5");
        std::env::set_var("MEDRAG_VECTOR_BACKEND", "qdrant");
        std::env::set_var("MEDRAG_INDEX_NAME", "override-index");
        std::env::set_var("MEDRAG_CHUNK_SIZE", "300");
        std::env::set_var("MEDRAG_INGEST_GLOB", "notes/*.pdf");
        std::env::set_var("MEDRAG_TOP_K", "5");
        std::env::set_var("PORT", "9090");
    }
    let config = Config::load(Path::new("/nonexistent/medrag.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::HuggingFace);
    assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
    assert_eq!(config.llm.timeout_secs, 5);
    assert_eq!(config.vector_store.backend, VectorBackend::Qdrant);
    assert_eq!(config.vector_store.index_name, "override-index");
    assert_eq!(config.ingest.chunk_size, 300);
    assert_eq!(config.ingest.glob.as_deref(), Some("notes/*.pdf"));
    assert_eq!(config.query.top_k, 5);
    assert_eq!(config.server.port, 9090);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("MEDRAG_LLM_PROVIDER", "openai");
        std::env::set_var("MEDRAG_TOP_K", "many");
        std::env::set_var("PORT", "99999");
    }
    let config = Config::load(Path::new("/nonexistent/medrag.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Groq);
    assert_eq!(config.query.top_k, 3);
    assert_eq!(config.server.port, 8080);
}

#[test]
fn validate_rejects_overlap_not_smaller_than_size() {
    let mut config = Config::default();
    config.ingest.chunk_size = 20;
    config.ingest.chunk_overlap = 20;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("chunk_overlap"));
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = Config::default();
    config.query.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ingest.chunk_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.llm.timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_out_of_range_temperature() {
    let mut config = Config::default();
    config.llm.temperature = 3.5;
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn resolve_secrets_fills_known_keys() {
    let vault = MockVaultProvider::new()
        .with_secret("PINECONE_API_KEY", "pc-secret")
        .with_secret("GROQ_API_KEY", "gsk-secret");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();

    assert_eq!(
        config.secrets.pinecone_api_key.as_ref().map(|s| s.expose()),
        Some("pc-secret")
    );
    assert_eq!(
        config.provider_key().map(|s| s.expose()),
        Some("gsk-secret")
    );
    assert!(config.secrets.hf_api_token.is_none());
    assert!(config.secrets.qdrant_api_key.is_none());
}

#[tokio::test]
async fn provider_key_follows_provider_kind() {
    let vault = MockVaultProvider::new().with_secret("HF_API_TOKEN", "hf-secret");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert!(config.provider_key().is_none());

    config.llm.provider = ProviderKind::HuggingFace;
    assert_eq!(config.provider_key().map(|s| s.expose()), Some("hf-secret"));
}

#[test]
#[serial]
fn config_path_resolution_order() {
    clear_env();
    assert_eq!(
        resolve_config_path(None),
        Path::new(DEFAULT_CONFIG_PATH)
    );

    unsafe { std::env::set_var("MEDRAG_CONFIG", "/etc/medrag.toml") };
    assert_eq!(resolve_config_path(None), Path::new("/etc/medrag.toml"));
    assert_eq!(
        resolve_config_path(Some(Path::new("cli.toml"))),
        Path::new("cli.toml")
    );
    clear_env();
}
