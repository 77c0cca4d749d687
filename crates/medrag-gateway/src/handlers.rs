use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::{Form, Json};
use medrag_core::FALLBACK_ANSWER;

use super::server::AppState;

const CHAT_PAGE: &str = include_str!("../assets/chat.html");

#[derive(serde::Deserialize)]
pub(crate) struct ChatForm {
    pub msg: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct AskRequest {
    pub question: String,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct AskResponse {
    pub answer: String,
    pub context: String,
    pub sources: Vec<String>,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn index_handler() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// Form endpoint used by the chat page; always answers in plain text.
pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    Form(form): Form<ChatForm>,
) -> String {
    tracing::info!(chars = form.msg.chars().count(), "chat question received");
    state.query.answer(&form.msg).await
}

pub(crate) async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> impl IntoResponse {
    let response = match state.query.ask(&request.question).await {
        Ok(answer) => AskResponse {
            answer: answer.text,
            context: answer.context,
            sources: answer.sources,
        },
        Err(e) => {
            tracing::error!("ask request failed: {e:#}");
            AskResponse {
                answer: FALLBACK_ANSWER.to_owned(),
                context: String::new(),
                sources: Vec::new(),
            }
        }
    };
    Json(response)
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn ask_request_deserializes() {
        let req: AskRequest = serde_json::from_str(r#"{"question":"What is gout?"}"#).unwrap();
        assert_eq!(req.question, "What is gout?");
    }

    #[test]
    fn chat_page_posts_to_get() {
        assert!(CHAT_PAGE.contains("/get"));
        assert!(CHAT_PAGE.contains("name=\"msg\""));
    }
}
