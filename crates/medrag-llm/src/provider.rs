use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

pub trait CompletionProvider: Send + Sync {
    /// Send messages to the remote model and return the assistant text.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or a response
    /// without any completion choice.
    fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;

    fn model(&self) -> &str;
}
