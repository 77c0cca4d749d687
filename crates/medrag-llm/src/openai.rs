use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{CompletionParams, CompletionProvider, Message, Role};

/// Groq's OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Raw REST client for any `/chat/completions` endpoint speaking the OpenAI wire format.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    provider_name: String,
}

impl fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

impl OpenAiCompatibleProvider {
    #[must_use]
    pub fn new(
        provider_name: impl Into<String>,
        client: reqwest::Client,
        api_key: String,
        mut base_url: String,
        model: String,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            api_key,
            base_url,
            model,
            provider_name: provider_name.into(),
        }
    }

    async fn send_request(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!(
                provider = %self.provider_name,
                "chat completion API error {status}: {text}"
            );
            return Err(LlmError::Status {
                provider: self.provider_name.clone(),
                status: status.as_u16(),
            });
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;

        if let Some(ref usage) = resp.usage {
            tracing::debug!(
                provider = %self.provider_name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })
    }
}

impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        self.send_request(messages, params).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            ApiMessage {
                role,
                content: &msg.content,
            }
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider_for(server: &MockServer) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            "groq",
            reqwest::Client::new(),
            "gsk-test".into(),
            format!("{}/openai/v1/", server.uri()),
            GROQ_DEFAULT_MODEL.into(),
        )
    }

    fn messages() -> Vec<Message> {
        vec![Message::system("be helpful"), Message::user("hello")]
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let p = OpenAiCompatibleProvider::new(
            "x",
            reqwest::Client::new(),
            "k".into(),
            "http://host/v1///".into(),
            "m".into(),
        );
        assert!(format!("{p:?}").contains("base_url: \"http://host/v1\""));
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = OpenAiCompatibleProvider::new(
            "groq",
            reqwest::Client::new(),
            "gsk-super-secret".into(),
            GROQ_BASE_URL.into(),
            "m".into(),
        );
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("gsk-super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn convert_messages_maps_roles() {
        let msgs = messages();
        let api = convert_messages(&msgs);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[1].content, "hello");
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": GROQ_DEFAULT_MODEL,
                "max_tokens": 500,
                "temperature": 0.3,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  hi there  "}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider_for(&server)
            .complete(&messages(), &CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(text, "  hi there  ");
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&messages(), &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json {{"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&messages(), &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Json(_)));
    }

    #[tokio::test]
    async fn empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&messages(), &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn null_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&messages(), &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn request_timeout_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = crate::http::build_client(std::time::Duration::from_millis(50)).unwrap();
        let provider = OpenAiCompatibleProvider::new(
            "groq",
            client,
            "k".into(),
            server.uri(),
            "m".into(),
        );
        let err = provider
            .complete(&messages(), &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Http(ref e) if e.is_timeout()));
    }
}
