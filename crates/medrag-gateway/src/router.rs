use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{ask_handler, chat_handler, health_handler, index_handler};
use super::server::AppState;

pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    let questions = Router::new()
        .route("/get", post(chat_handler))
        .route("/api/ask", post(ask_handler))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .merge(questions)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
