#[cfg(feature = "candle")]
use crate::candle_embed::CandleEmbedder;
use crate::embed::Embedder;
use crate::error::LlmError;
use crate::huggingface::{HfInferenceEmbedder, HuggingFaceProvider};
#[cfg(feature = "mock")]
use crate::mock::{MockEmbedder, MockProvider};
use crate::openai::OpenAiCompatibleProvider;
use crate::provider::{CompletionParams, CompletionProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Groq($p) => $expr,
            AnyProvider::HuggingFace($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

macro_rules! delegate_embedder {
    ($self:expr, |$e:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::HfInference($e) => $expr,
            #[cfg(feature = "candle")]
            AnyEmbedder::Candle($e) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($e) => $expr,
        }
    };
}

/// Completion backend selected by configuration at startup.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Groq(OpenAiCompatibleProvider),
    HuggingFace(HuggingFaceProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl CompletionProvider for AnyProvider {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.complete(messages, params).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }

    fn model(&self) -> &str {
        delegate_provider!(self, |p| p.model())
    }
}

/// Embedding backend selected by configuration at startup.
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    HfInference(HfInferenceEmbedder),
    #[cfg(feature = "candle")]
    Candle(CandleEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl Embedder for AnyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |e| e.embed(text).await)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_embedder!(self, |e| e.embed_batch(texts).await)
    }

    fn dimensions(&self) -> usize {
        delegate_embedder!(self, |e| e.dimensions())
    }

    fn model_id(&self) -> &str {
        delegate_embedder!(self, |e| e.model_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_variant_delegates_name() {
        let p = AnyProvider::Groq(OpenAiCompatibleProvider::new(
            "groq",
            reqwest::Client::new(),
            "k".into(),
            "http://localhost".into(),
            "llama".into(),
        ));
        assert_eq!(p.name(), "groq");
        assert_eq!(p.model(), "llama");
    }

    #[test]
    fn hf_embedder_variant_delegates_dimensions() {
        let e = AnyEmbedder::HfInference(HfInferenceEmbedder::new(
            reqwest::Client::new(),
            "t".into(),
            "http://localhost".into(),
            "m".into(),
            384,
        ));
        assert_eq!(e.dimensions(), 384);
        assert_eq!(e.model_id(), "m");
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn mock_variants_delegate() {
        let p = AnyProvider::Mock(MockProvider::with_responses(vec!["ok".into()]));
        let out = p
            .complete(&[Message::user("q")], &CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(out, "ok");

        let e = AnyEmbedder::Mock(MockEmbedder::new(8));
        assert_eq!(e.embed("q").await.unwrap().len(), 8);
    }
}
