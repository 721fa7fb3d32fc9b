//! HTML error responses

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Datelike;
use once_cell::sync::Lazy;
use tera::Context as TeraContext;

use crate::services::{CommentServiceError, FollowServiceError, PostServiceError, UserServiceError};
use crate::templates::{TemplateEngine, TemplateError};

/// Engine for error pages, which render without access to the app state
static ERROR_TEMPLATES: Lazy<Option<TemplateEngine>> = Lazy::new(|| match TemplateEngine::embedded() {
    Ok(engine) => Some(engine),
    Err(e) => {
        tracing::error!("Failed to load error templates: {}", e);
        None
    }
});

/// Errors a page handler can end with
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Page not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::NotFound => StatusCode::NOT_FOUND,
            WebError::Forbidden => StatusCode::FORBIDDEN,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            WebError::NotFound => "Страница не найдена.",
            WebError::Forbidden => "Доступ запрещён.",
            WebError::BadRequest(_) => "Некорректный запрос.",
            WebError::Internal(_) => "Что-то пошло не так. Попробуйте позже.",
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            WebError::Internal(e) => tracing::error!("Internal error: {:#}", e),
            WebError::BadRequest(reason) => tracing::debug!("Bad request: {}", reason),
            _ => {}
        }

        let title = status.canonical_reason().unwrap_or("Error");
        let mut context = TeraContext::new();
        context.insert("current_user", &Option::<()>::None);
        context.insert("year", &chrono::Utc::now().year());
        context.insert("status", &status.as_u16());
        context.insert("title", title);
        context.insert("message", self.message());

        let body = ERROR_TEMPLATES
            .as_ref()
            .and_then(|engine| engine.render("core/error.html", &context).ok())
            .unwrap_or_else(|| TemplateEngine::simple_error_page(status.as_u16(), title));

        (status, Html(body)).into_response()
    }
}

impl From<TemplateError> for WebError {
    fn from(e: TemplateError) -> Self {
        WebError::Internal(e.into())
    }
}

impl From<PostServiceError> for WebError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound => WebError::NotFound,
            PostServiceError::Forbidden => WebError::Forbidden,
            PostServiceError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            PostServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for WebError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound => WebError::NotFound,
            CommentServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<FollowServiceError> for WebError {
    fn from(e: FollowServiceError) -> Self {
        match e {
            FollowServiceError::NotFound => WebError::NotFound,
            FollowServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<UserServiceError> for WebError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            UserServiceError::InvalidCredentials => WebError::BadRequest("invalid credentials".to_string()),
            UserServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_renders_error_page() {
        let response = WebError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("404"));
        assert!(html.contains("Страница не найдена."));
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = WebError::Internal(anyhow::anyhow!("database exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(!html.contains("database exploded"));
    }

    #[test]
    fn test_service_errors_map_to_status() {
        assert_eq!(WebError::from(PostServiceError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(WebError::from(PostServiceError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(WebError::from(FollowServiceError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            WebError::from(CommentServiceError::InternalError(anyhow::anyhow!("x"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
