//! Chat-completion providers and sentence-embedding backends.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle_embed;
pub mod embed;
pub mod error;
pub mod http;
pub mod huggingface;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use any::{AnyEmbedder, AnyProvider};
pub use embed::Embedder;
pub use error::LlmError;
pub use provider::{CompletionParams, CompletionProvider, Message, Role};
