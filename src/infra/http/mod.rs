//! HTTP surface: a small JSON API over the snippet service.

mod error;
mod snippets;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};

use crate::application::snippets::SnippetService;

#[derive(Clone)]
pub struct HttpState {
    pub snippets: Arc<SnippetService>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/snippets", post(snippets::create).get(snippets::list))
        .route(
            "/snippets/{id}",
            get(snippets::fetch).put(snippets::update),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
