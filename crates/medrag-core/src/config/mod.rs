mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be greater than zero");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.query.top_k == 0 {
            bail!("query.top_k must be greater than zero");
        }
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than zero");
        }
        if self.vector_store.index_name.trim().is_empty() {
            bail!("vector_store.index_name must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be within 0.0..=2.0");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be greater than zero");
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Resolve API keys through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret("PINECONE_API_KEY").await? {
            self.secrets.pinecone_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("GROQ_API_KEY").await? {
            self.secrets.groq_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("HF_API_TOKEN").await? {
            self.secrets.hf_api_token = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("QDRANT_API_KEY").await? {
            self.secrets.qdrant_api_key = Some(Secret::new(val));
        }
        Ok(())
    }

    /// Credential of the configured chat provider.
    #[must_use]
    pub fn provider_key(&self) -> Option<&Secret> {
        match self.llm.provider {
            ProviderKind::Groq => self.secrets.groq_api_key.as_ref(),
            ProviderKind::HuggingFace => self.secrets.hf_api_token.as_ref(),
        }
    }
}

/// Config path from the command line, then `MEDRAG_CONFIG`, then [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var("MEDRAG_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
