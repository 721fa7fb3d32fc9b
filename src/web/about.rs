//! Static pages

use axum::{extract::State, response::Html};

use super::error::WebError;
use super::middleware::Viewer;
use super::state::AppState;

pub async fn author(State(state): State<AppState>, viewer: Viewer) -> Result<Html<String>, WebError> {
    let context = state.page_context(viewer.user());
    Ok(Html(state.render("about/author.html", &context)?))
}

pub async fn tech(State(state): State<AppState>, viewer: Viewer) -> Result<Html<String>, WebError> {
    let context = state.page_context(viewer.user());
    Ok(Html(state.render("about/tech.html", &context)?))
}

pub async fn not_found() -> WebError {
    WebError::NotFound
}
