use super::Config;

fn parse_enum<T: serde::de::DeserializeOwned>(var: &str, value: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(value.to_lowercase())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {var} value: {value}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_store();
        self.apply_env_overrides_server();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("MEDRAG_LLM_PROVIDER")
            && let Some(kind) = parse_enum("MEDRAG_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("MEDRAG_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("MEDRAG_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("MEDRAG_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("MEDRAG_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("MEDRAG_LLM_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("MEDRAG_EMBEDDING_BACKEND")
            && let Some(backend) = parse_enum("MEDRAG_EMBEDDING_BACKEND", &v)
        {
            self.embedding.backend = backend;
        }
        if let Ok(v) = std::env::var("MEDRAG_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("MEDRAG_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("MEDRAG_EMBEDDING_DIMENSIONS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.embedding.dimensions = n;
        }
    }

    fn apply_env_overrides_store(&mut self) {
        if let Ok(v) = std::env::var("MEDRAG_VECTOR_BACKEND")
            && let Some(backend) = parse_enum("MEDRAG_VECTOR_BACKEND", &v)
        {
            self.vector_store.backend = backend;
        }
        if let Ok(v) = std::env::var("MEDRAG_INDEX_NAME") {
            self.vector_store.index_name = v;
        }
        if let Ok(v) = std::env::var("MEDRAG_PINECONE_API_URL") {
            self.vector_store.pinecone_api_url = v;
        }
        if let Ok(v) = std::env::var("MEDRAG_QDRANT_URL") {
            self.vector_store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("MEDRAG_DATA_DIR") {
            self.ingest.data_dir = v.into();
        }
        if let Ok(v) = std::env::var("MEDRAG_INGEST_GLOB") {
            self.ingest.glob = Some(v).filter(|g| !g.trim().is_empty());
        }
        if let Ok(v) = std::env::var("MEDRAG_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.chunk_size = n;
        }
        if let Ok(v) = std::env::var("MEDRAG_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("MEDRAG_TOP_K")
            && let Ok(k) = v.parse::<u64>()
        {
            self.query.top_k = k;
        }
    }

    fn apply_env_overrides_server(&mut self) {
        if let Ok(v) = std::env::var("MEDRAG_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT value: {v}"),
            }
        }
    }
}
